//! The Event Log contract: append-only, durable persistence of offset-tagged
//! events keyed by session.
//!
//! Unlike a consumer-group log, there is exactly one dense offset sequence
//! per session; there is no independent consumer position to track here —
//! that's the Subscription Composer's job, built on top of `read_from`.

use async_trait::async_trait;

use crate::error::Result;

/// A session's monotonically increasing position in its own event log.
pub type Offset = i64;

/// One durably stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub session_id: String,
    pub offset: Offset,
    /// Tag identifying the `StreamEvent` variant (`"session"`, `"patches"`,
    /// `"full"`, `"stats"`, `"done"`), stored alongside the serialized event
    /// so `last_full_or_done` can filter without deserializing every row.
    pub event_type: String,
    pub payload: Vec<u8>,
    pub created_at_millis: i64,
}

/// An event type that knows its own `LogRow::event_type` tag, so the log
/// can answer `last_full_or_done` without deserializing every row.
pub trait TaggedEvent {
    fn type_tag(&self) -> &'static str;
}

/// Append-only, durable storage for per-session offset-tagged events.
///
/// `E` is the event type serialized into each row's payload.
#[async_trait]
pub trait EventLog<E>: Send + Sync
where
    E: TaggedEvent + Send + Sync + 'static,
{
    /// Durably write one row at `offset`. Re-appending an existing
    /// `(session_id, offset)` key is a programmer error and must fail with
    /// `Error::DuplicateOffset`.
    async fn append(&self, session_id: &str, offset: Offset, event: &E) -> Result<()>;

    /// Ordered ascending by offset; every returned row has
    /// `offset > from_offset_exclusive`.
    async fn read_from(&self, session_id: &str, from_offset_exclusive: Offset)
    -> Result<Vec<LogRow>>;

    /// Greatest stored offset for the session, or `-1` if none.
    async fn latest_offset(&self, session_id: &str) -> Result<Offset>;

    /// Most recent row whose event type is `full` or `done`, used to
    /// reconstruct current HTML on restart.
    async fn last_full_or_done(&self, session_id: &str) -> Result<Option<LogRow>>;

    /// Remove rows older than `older_than_millis`. Safe to call concurrently
    /// with appends and reads. Returns the number of rows removed.
    async fn cleanup(&self, older_than_millis: i64) -> Result<u64>;
}

/// Decodes the event type tag used to identify `Full`/`Done` rows without a
/// dependency on `loom-core`'s concrete `StreamEvent` type.
pub fn is_snapshot_type(event_type: &str) -> bool {
    matches!(event_type, "full" | "done")
}
