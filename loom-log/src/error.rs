//! Error types for the event log.

/// Error type for event log operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An append targeted a `(session_id, offset)` pair that already exists.
    #[error("offset {offset} already stored for session {session_id}")]
    DuplicateOffset { session_id: String, offset: i64 },

    /// The durable backend failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for event log operations.
pub type Result<T> = std::result::Result<T, Error>;
