//! Error taxonomy shared by the pipeline, the scheduler, and the control plane.
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Type,
    FetchUrl,
    ParseUrl,
    Db,
    ItemSave,
    PermanentFailure,
    Internal,
    Redis,
    DbConnect,
}

impl ErrorKind {
    /// Stable string tag used in the error store and outbound envelopes.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::Type => "type_error",
            ErrorKind::FetchUrl => "fetch_url_error",
            ErrorKind::ParseUrl => "parse_url_error",
            ErrorKind::Db => "db_error",
            ErrorKind::ItemSave => "item_save_error",
            ErrorKind::PermanentFailure => "permanent_failure",
            ErrorKind::Internal => "internal_error",
            ErrorKind::Redis => "redis_error",
            ErrorKind::DbConnect => "db_connect_error",
        }
    }

    /// Critical kinds abort the worker instead of being retried.
    pub fn is_critical(self) -> bool {
        matches!(self, ErrorKind::Redis | ErrorKind::DbConnect)
    }
}

/// A failure from any core component, with enough context to route backoff
/// and build the outbound error envelope.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {}", .kind.tag(), .message)]
pub struct WorkerError {
    pub kind: ErrorKind,
    pub message: String,
    pub feed_url: Option<String>,
    pub feed_id: Option<i32>,
}

impl WorkerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            feed_url: None,
            feed_id: None,
        }
    }

    pub fn for_feed(
        kind: ErrorKind,
        message: impl Into<String>,
        feed_url: &str,
        feed_id: i32,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            feed_url: Some(feed_url.to_string()),
            feed_id: Some(feed_id),
        }
    }
}

/// Row shape for the error store.
#[derive(Debug, Clone)]
pub struct NewErrorRecord {
    pub kind: ErrorKind,
    pub feed_id: Option<i32>,
    pub message: String,
}
