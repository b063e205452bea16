use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use indexmap::IndexMap;

use notifeed::core::error::FeedError;
use notifeed::core::models::{RenderedNotification, ViewMode};
use notifeed::core::view::{DesktopNotifier, ErrorReporter, MenuView};

/// Everything the menu widget draws. The feed controller writes into it
/// through `PanelView`; the app copies it out after each feed task.
#[derive(Debug, Clone)]
pub struct PanelModel {
    pub open: bool,
    pub loading: bool,
    pub badge: Option<u32>,
    pub mode: ViewMode,
    pub items: IndexMap<ViewMode, Vec<RenderedNotification>>,
    pub status: Option<String>,
}

impl Default for PanelModel {
    fn default() -> Self {
        let mut items = IndexMap::new();
        items.insert(ViewMode::All, Vec::new());
        items.insert(ViewMode::Unread, Vec::new());
        PanelModel {
            open: false,
            loading: false,
            badge: None,
            mode: ViewMode::All,
            items,
            status: None,
        }
    }
}

impl PanelModel {
    pub fn visible_items(&self) -> &[RenderedNotification] {
        self.items.get(&self.mode).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct PanelView {
    model: Mutex<PanelModel>,
    changed: Notify,
    desktop: Option<DesktopNotifier>,
}

impl PanelView {
    pub fn new(desktop_alerts: bool) -> Self {
        PanelView {
            model: Mutex::new(PanelModel::default()),
            changed: Notify::new(),
            desktop: desktop_alerts.then_some(DesktopNotifier),
        }
    }

    fn model(&self) -> MutexGuard<'_, PanelModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` and wake whoever waits in `changed`.
    fn update(&self, f: impl FnOnce(&mut PanelModel)) {
        f(&mut self.model());
        self.changed.notify_one();
    }

    pub fn snapshot(&self) -> PanelModel {
        self.model().clone()
    }

    /// Resolves after the next change, or at once if one happened since the
    /// last call. Bursts of changes collapse into one wakeup.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    pub fn set_status(&self, status: Option<String>) {
        self.update(|m| m.status = status);
    }
}

impl MenuView for PanelView {
    fn set_open(&self, open: bool) {
        self.update(|m| {
            m.open = open;
            if open {
                m.status = None;
            }
        });
    }

    fn set_loading(&self, loading: bool) {
        self.update(|m| m.loading = loading);
    }

    fn show_unread_count(&self, count: Option<u32>) {
        self.update(|m| m.badge = count);
    }

    fn show_mode(&self, mode: ViewMode) {
        self.update(|m| m.mode = mode);
    }

    fn append(&self, mode: ViewMode, item: RenderedNotification) {
        self.update(|m| m.items.entry(mode).or_default().push(item));
    }

    fn clear(&self, mode: ViewMode) {
        self.update(|m| m.items.entry(mode).or_default().clear());
    }
}

impl ErrorReporter for PanelView {
    fn report(&self, error: &FeedError) {
        self.set_status(Some(error.summary().to_string()));
        if let Some(desktop) = &self.desktop {
            desktop.report(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loading_state_is_visible_before_the_fetch_ends() {
        let panel = PanelView::new(false);
        panel.set_open(true);
        panel.set_loading(true);

        tokio::time::timeout(std::time::Duration::from_secs(1), panel.changed())
            .await
            .unwrap();
        let model = panel.snapshot();
        assert!(model.open);
        assert!(model.loading);

        panel.set_loading(false);
        panel.changed().await;
        assert!(!panel.snapshot().loading);
    }

    #[test]
    fn visible_items_follow_mode() {
        let panel = PanelView::new(false);
        panel.append(
            ViewMode::Unread,
            RenderedNotification {
                id: 4,
                unread: true,
                markup: "Graded".into(),
                behavior: None,
            },
        );
        assert!(panel.snapshot().visible_items().is_empty());
        panel.show_mode(ViewMode::Unread);
        assert_eq!(panel.snapshot().visible_items()[0].id, 4);
    }
}
