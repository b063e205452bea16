use std::future::Future;
use std::sync::Arc;

use cosmic::app::Task;
use notifeed::core::view::{announce_unread, fresh_unread};

use super::{AppModel, Feed, Message};

impl AppModel {
    /// Run a controller operation as a task. Changes made while it runs reach
    /// the model through the panel-changes subscription; the panel is re-read
    /// once more when it ends.
    fn run_feed<F, Fut>(&self, op: F) -> Task<Message>
    where
        F: FnOnce(Arc<Feed>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(feed) = self.feed.clone() else {
            return Task::none();
        };
        cosmic::task::future(async move {
            op(feed).await;
            Message::FeedUpdated
        })
    }

    pub(super) fn handle_feed(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ToggleMenu => {
                if !self.model.open {
                    self.expanded.clear();
                }
                return self.run_feed(|feed| async move {
                    let _ = feed.toggle().await;
                });
            }

            Message::CloseMenu => {
                if let Some(feed) = &self.feed {
                    feed.close();
                    self.model = self.panel.snapshot();
                }
            }

            Message::ToggleMode => {
                return self.run_feed(|feed| async move {
                    let _ = feed.toggle_mode().await;
                });
            }

            Message::MarkAllRead => {
                return self.run_feed(|feed| async move {
                    if feed.mark_all_as_read().await.is_ok() {
                        log::debug!("Mark all read confirmed");
                    }
                });
            }

            Message::Scrolled(metrics) => {
                let at_bottom = self
                    .feed
                    .as_ref()
                    .is_some_and(|feed| metrics.is_near_bottom(feed.options().scroll_threshold));
                if !at_bottom {
                    return Task::none();
                }
                return self.run_feed(move |feed| async move {
                    let _ = feed.on_scroll_near_bottom(metrics).await;
                });
            }

            Message::ToggleExpanded(id) => {
                if !self.expanded.remove(&id) {
                    self.expanded.insert(id);
                }
            }

            Message::OpenLink(url) => {
                if let Err(e) = open::that(&url) {
                    log::warn!("Failed to open {}: {}", url, e);
                    self.status_message = format!("Could not open link: {e}");
                }
            }

            Message::FeedUpdated => {
                self.model = self.panel.snapshot();
            }

            Message::RefreshCount => {
                if let Some(feed) = self.feed.clone() {
                    return cosmic::task::future(async move {
                        Message::CountRefreshed(
                            feed.refresh_unread_count().await.map_err(|e| e.to_string()),
                        )
                    });
                }
            }

            Message::CountRefreshed(Ok(count)) => {
                if self.desktop_alerts {
                    if let Some(fresh) = fresh_unread(self.last_unread, count) {
                        announce_unread(fresh);
                    }
                }
                self.last_unread = Some(count);
                self.model = self.panel.snapshot();
            }
            Message::CountRefreshed(Err(e)) => {
                log::warn!("Unread count refresh failed: {}", e);
                self.model = self.panel.snapshot();
            }
        }
        Task::none()
    }
}
