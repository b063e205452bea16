mod feed;
pub mod panel;

use std::collections::HashSet;
use std::sync::Arc;

use cosmic::app::{Core, Task};
use cosmic::iced::keyboard;
use cosmic::iced::{Event, Subscription};
use cosmic::Element;

use notifeed::config::{Config, Source};
use notifeed::core::ajax::AjaxRepository;
use notifeed::core::feed::{FeedOptions, NotificationFeedController};
use notifeed::core::models::ScrollMetrics;
use notifeed::core::render::{MenuItemRenderer, RenderFormat};
use notifeed::core::repository::Backend;
use notifeed::core::store::LocalStore;

use self::panel::{PanelModel, PanelView};

const APP_ID: &str = "com.notifeed.menu";

pub type Feed = NotificationFeedController<Backend, MenuItemRenderer>;

pub struct AppModel {
    core: Core,
    pub(super) feed: Option<Arc<Feed>>,
    pub(super) panel: Arc<PanelView>,

    /// Copy of `panel` taken after the last feed task finished.
    pub(super) model: PanelModel,
    /// Items showing their full body.
    pub(super) expanded: HashSet<i64>,

    /// Last unread count seen; `None` until the first refresh.
    pub(super) last_unread: Option<u32>,
    pub(super) desktop_alerts: bool,
    pub(super) count_refresh_secs: u64,
    pub(super) status_message: String,
}

#[derive(Debug, Clone)]
pub enum Message {
    ToggleMenu,
    CloseMenu,
    ToggleMode,
    MarkAllRead,
    Scrolled(ScrollMetrics),

    ToggleExpanded(i64),
    OpenLink(String),

    /// A feed operation finished; re-read the panel.
    FeedUpdated,
    RefreshCount,
    CountRefreshed(Result<u32, String>),
}

fn open_backend(config: &Config) -> Result<Backend, String> {
    match &config.source {
        Source::Remote {
            base_url,
            session_key,
        } => {
            log::info!("Using notification service at {}", base_url);
            Ok(Backend::Remote(AjaxRepository::new(
                base_url.clone(),
                session_key.clone(),
            )))
        }
        Source::Local { path } => {
            let store = match path {
                Some(path) => LocalStore::open_at(path),
                None => LocalStore::open(),
            };
            store.map(Backend::Local).map_err(|e| e.to_string())
        }
    }
}

impl cosmic::Application for AppModel {
    type Executor = cosmic::executor::Default;
    type Flags = ();
    type Message = Message;

    const APP_ID: &'static str = APP_ID;

    fn core(&self) -> &Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    fn init(core: Core, _flags: Self::Flags) -> (Self, Task<Self::Message>) {
        let (config, config_error) = match Config::resolve() {
            Ok(config) => (config, None),
            Err(e) => {
                log::warn!("Config error, falling back to local store: {}", e);
                (Config::local_default(), Some(e))
            }
        };

        let panel = Arc::new(PanelView::new(config.desktop_alerts));

        let feed = match open_backend(&config) {
            Ok(backend) => {
                let options: FeedOptions = config.feed_options();
                Some(Arc::new(NotificationFeedController::new(
                    backend,
                    MenuItemRenderer::new(RenderFormat::Text),
                    panel.clone(),
                    panel.clone(),
                    options,
                )))
            }
            Err(e) => {
                log::error!("Failed to open notification source: {}", e);
                None
            }
        };

        let status_message = match (&feed, config_error) {
            (None, _) => "Notification source unavailable".to_string(),
            (Some(_), Some(e)) => format!("Config error: {e}"),
            (Some(_), None) => String::new(),
        };

        let mut app = AppModel {
            core,
            feed,
            panel,
            model: PanelModel::default(),
            expanded: HashSet::new(),
            last_unread: None,
            desktop_alerts: config.desktop_alerts,
            count_refresh_secs: config.count_refresh_secs.max(30),
            status_message,
        };

        let title_task = app.set_window_title("Notifications".into());
        let count_task = app.dispatch(Message::RefreshCount);

        (app, cosmic::task::batch(vec![title_task, count_task]))
    }

    fn subscription(&self) -> Subscription<Self::Message> {
        let mut subs = Vec::new();

        // Escape closes the menu like a click outside of it.
        subs.push(cosmic::iced_futures::event::listen_raw(|event, status, _| {
            if cosmic::iced_core::event::Status::Ignored != status {
                return None;
            }
            match event {
                Event::Keyboard(keyboard::Event::KeyPressed {
                    key: keyboard::Key::Named(keyboard::key::Named::Escape),
                    ..
                }) => Some(Message::CloseMenu),
                _ => None,
            }
        }));

        // Redraw whenever the controller touches the panel, including
        // mid-fetch changes such as the loading indicator.
        let panel = self.panel.clone();
        subs.push(Subscription::run_with_id(
            "panel-changes",
            cosmic::iced_futures::stream::channel(1, move |mut output| async move {
                use futures::SinkExt;
                loop {
                    panel.changed().await;
                    if output.send(Message::FeedUpdated).await.is_err() {
                        break;
                    }
                }
            }),
        ));

        if self.feed.is_some() {
            let secs = self.count_refresh_secs;
            subs.push(Subscription::run_with_id(
                "unread-count-refresh",
                cosmic::iced_futures::stream::channel(1, move |mut output| async move {
                    use futures::SinkExt;
                    let mut interval = tokio::time::interval(std::time::Duration::from_secs(secs));
                    interval.tick().await; // skip immediate first tick
                    loop {
                        interval.tick().await;
                        let _ = output.send(Message::RefreshCount).await;
                    }
                }),
            ));
        }

        Subscription::batch(subs)
    }

    fn view(&self) -> Element<'_, Self::Message> {
        crate::ui::notification_menu::view(&self.model, &self.expanded, &self.status_message)
    }

    fn update(&mut self, message: Self::Message) -> Task<Self::Message> {
        self.handle_feed(message)
    }
}

impl AppModel {
    fn set_window_title(&self, title: String) -> cosmic::app::Task<Message> {
        self.core.set_title(self.core.main_window_id(), title)
    }

    /// Dispatch a message through the update loop (for recursive calls from handlers).
    pub(super) fn dispatch(&mut self, message: Message) -> Task<Message> {
        <Self as cosmic::Application>::update(self, message)
    }
}
