use async_trait::async_trait;

use crate::core::ajax::AjaxRepository;
use crate::core::error::FeedResult;
use crate::core::models::{
    CountUnreadRequest, FetchRequest, FetchResponse, MarkAllReadRequest, MarkAllReadResponse,
};
use crate::core::store::LocalStore;

/// Source of notifications. The server is the only source of truth;
/// implementations never cache.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Fetch one page of notifications for the recipient.
    async fn query(&self, request: &FetchRequest) -> FeedResult<FetchResponse>;

    /// Mark every notification of the recipient as read.
    async fn mark_all_read(&self, request: &MarkAllReadRequest) -> FeedResult<MarkAllReadResponse>;

    /// Number of unread notifications for the recipient.
    async fn count_unread(&self, request: &CountUnreadRequest) -> FeedResult<u32>;
}

/// Repository selected at startup from the config.
#[derive(Clone)]
pub enum Backend {
    Remote(AjaxRepository),
    Local(LocalStore),
}

#[async_trait]
impl NotificationRepository for Backend {
    async fn query(&self, request: &FetchRequest) -> FeedResult<FetchResponse> {
        match self {
            Backend::Remote(r) => r.query(request).await,
            Backend::Local(s) => s.query(request).await,
        }
    }

    async fn mark_all_read(&self, request: &MarkAllReadRequest) -> FeedResult<MarkAllReadResponse> {
        match self {
            Backend::Remote(r) => r.mark_all_read(request).await,
            Backend::Local(s) => s.mark_all_read(request).await,
        }
    }

    async fn count_unread(&self, request: &CountUnreadRequest) -> FeedResult<u32> {
        match self {
            Backend::Remote(r) => r.count_unread(request).await,
            Backend::Local(s) => s.count_unread(request).await,
        }
    }
}
