use crate::core::error::FeedError;
use crate::core::models::{RenderedNotification, ViewMode};

/// Handles the view layer gives the feed controller. Each view mode owns
/// its own item container, addressed by mode.
pub trait MenuView: Send + Sync {
    fn set_open(&self, open: bool);

    fn set_loading(&self, loading: bool);

    /// `None` hides the badge.
    fn show_unread_count(&self, count: Option<u32>);

    fn show_mode(&self, mode: ViewMode);

    fn append(&self, mode: ViewMode, item: RenderedNotification);

    fn clear(&self, mode: ViewMode);
}

/// User-visible error channel.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &FeedError);
}

/// Reports errors as desktop notifications.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier;

impl ErrorReporter for DesktopNotifier {
    fn report(&self, error: &FeedError) {
        if let Err(e) = notify_rust::Notification::new()
            .appname("Notifications")
            .summary(error.summary())
            .body(&error.to_string())
            .show()
        {
            log::warn!("Failed to show desktop notification: {}", e);
        }
    }
}

/// Number of unread notifications that arrived since `previous`. The first
/// count (`previous` is `None`) only seeds the baseline.
pub fn fresh_unread(previous: Option<u32>, current: u32) -> Option<u32> {
    let previous = previous?;
    (current > previous).then(|| current - previous)
}

/// Announce `fresh` newly arrived unread notifications on the desktop.
pub fn announce_unread(fresh: u32) {
    let summary = if fresh == 1 {
        "1 new notification".to_string()
    } else {
        format!("{fresh} new notifications")
    };
    if let Err(e) = notify_rust::Notification::new()
        .appname("Notifications")
        .summary(&summary)
        .show()
    {
        log::warn!("Failed to show desktop notification: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_count_is_not_announced() {
        assert_eq!(fresh_unread(None, 42), None);
        assert_eq!(fresh_unread(Some(3), 5), Some(2));
        assert_eq!(fresh_unread(Some(5), 5), None);
        assert_eq!(fresh_unread(Some(0), 1), Some(1));
        assert_eq!(fresh_unread(Some(9), 2), None);
    }
}
