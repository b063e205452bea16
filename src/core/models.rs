use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of notifications requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Minimal profile of a sender or recipient, present when embedding was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    #[serde(rename = "fullname")]
    pub full_name: String,
    #[serde(rename = "profileimageurl", default)]
    pub profile_image_url: Option<String>,
}

/// A single notification as the server sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "useridfrom")]
    pub user_id_from: i64,
    #[serde(rename = "useridto")]
    pub user_id_to: i64,
    pub subject: String,
    #[serde(rename = "fullmessage", default)]
    pub full_message: String,
    #[serde(rename = "fullmessagehtml", default)]
    pub full_message_html: Option<String>,
    #[serde(rename = "smallmessage", default)]
    pub small_message: String,
    #[serde(rename = "contexturl", default)]
    pub context_url: Option<String>,
    pub read: bool,
    #[serde(rename = "timecreated")]
    pub time_created: i64,
    #[serde(rename = "userfrom", default)]
    pub user_from: Option<UserSummary>,
    #[serde(rename = "userto", default)]
    pub user_to: Option<UserSummary>,
}

/// Which slice of the feed the menu is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    All,
    Unread,
}

impl ViewMode {
    pub fn other(self) -> Self {
        match self {
            ViewMode::All => ViewMode::Unread,
            ViewMode::Unread => ViewMode::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::All => "all",
            ViewMode::Unread => "unread",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pagination state for one view mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingCursor {
    pub limit: u32,
    pub offset: u32,
    /// Set once a page shorter than `limit` came back.
    pub loaded_all: bool,
    /// Set once the first fetch for this mode completed.
    pub initial_load: bool,
}

impl PagingCursor {
    /// A zero `limit` is raised to 1; an empty page size could never end the feed.
    pub fn new(limit: u32) -> Self {
        PagingCursor {
            limit: limit.max(1),
            offset: 0,
            loaded_all: false,
            initial_load: false,
        }
    }

    pub fn reset(&mut self) {
        *self = PagingCursor::new(self.limit);
    }

    /// Record a completed page of `received` items fetched in `mode`.
    ///
    /// The offset only moves in `All` mode. Unread fetches mark their
    /// results read on the server, so the unread result set shrinks by
    /// itself and offset zero always addresses the next page. This relies
    /// on the server honouring `markasread`.
    pub fn advance(&mut self, mode: ViewMode, received: usize) {
        if received == 0 || received < self.limit as usize {
            self.loaded_all = true;
        }
        self.initial_load = true;
        if mode == ViewMode::All {
            self.offset += self.limit;
        }
    }
}

/// Open/closed state, active mode and the server-computed unread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuState {
    pub open: bool,
    pub mode: ViewMode,
    pub unread_count: u32,
}

impl Default for MenuState {
    fn default() -> Self {
        MenuState {
            open: false,
            mode: ViewMode::All,
            unread_count: 0,
        }
    }
}

/// One page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    pub limit: u32,
    pub offset: u32,
    pub recipient_id: i64,
    pub mark_as_read: bool,
    pub mode: ViewMode,
    pub embed_user_from: bool,
    pub embed_user_to: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FetchResponse {
    pub notifications: Vec<Notification>,
    #[serde(rename = "unreadcount")]
    pub unread_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkAllReadRequest {
    pub recipient_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MarkAllReadResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountUnreadRequest {
    pub recipient_id: i64,
}

/// What happens when a rendered item is activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    OpenUrl(String),
}

/// Output of the template renderer for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub id: i64,
    pub unread: bool,
    pub markup: String,
    pub behavior: Option<ItemAction>,
}

/// Geometry of the scrollable feed region, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f32,
    pub inner_height: f32,
    pub scroll_height: f32,
}

impl ScrollMetrics {
    pub fn is_near_bottom(&self, threshold: f32) -> bool {
        self.scroll_top + self.inner_height >= self.scroll_height - threshold
    }
}
