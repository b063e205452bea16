use thiserror::Error;

/// Everything that can go wrong while talking to the notification source
/// or rendering its results. None of these are fatal to the feed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("server error ({code}): {message}")]
    Server { code: String, message: String },

    #[error("could not render notification {id}: {reason}")]
    Render { id: i64, reason: String },

    #[error("request was not accepted by the server")]
    Rejected,

    #[error("local store error: {0}")]
    Store(String),
}

impl FeedError {
    /// Short text for a status line or desktop notification.
    pub fn summary(&self) -> &'static str {
        match self {
            FeedError::Transport(_) => "Could not reach the notification service",
            FeedError::MalformedResponse(_) => "Unexpected response from the notification service",
            FeedError::Server { .. } => "The notification service reported an error",
            FeedError::Render { .. } => "A notification could not be displayed",
            FeedError::Rejected => "The request was rejected",
            FeedError::Store(_) => "Local notification store failed",
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
