//! Subscription Composer (spec §4.7): for a session and a resumption offset,
//! splice a durable replay in front of a de-duplicated live tail.
//!
//! Structured as an eager bus subscribe, then a `select!` loop forwarding
//! broadcast events while watching for client close, extended with the
//! replay-then-live splice and a forced-reconnect-on-overflow policy in
//! place of resuming a lagged subscriber in place.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use loom_core::bus::RecvOutcome;
use loom_core::{EventWithOffset, StreamEvent};
use loom_log::LogRow;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Resume from this offset, exclusive. `-1` (the default) means "from
    /// the beginning".
    #[serde(default = "default_from_offset_exclusive")]
    pub from_offset_exclusive: i64,
}

fn default_from_offset_exclusive() -> i64 {
    -1
}

/// Wire framing of one outgoing message: the replayed or live event plus its
/// offset, the subscriber's resumption cursor (spec §6.4).
#[derive(Debug, Serialize)]
struct WireEvent<'a> {
    event: &'a StreamEvent,
    offset: i64,
}

pub async fn subscribe_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<SubscribeQuery>,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_subscribe(socket, state, session_id, query.from_offset_exclusive)
    })
}

fn row_to_event(row: &LogRow) -> Option<StreamEvent> {
    match serde_json::from_slice(&row.payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(session_id = %row.session_id, offset = row.offset, error = %e, "failed to deserialize log row during replay");
            None
        }
    }
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &StreamEvent,
    offset: i64,
) -> bool {
    let Ok(json) = serde_json::to_string(&WireEvent { event, offset }) else {
        return true;
    };
    sender.send(Message::Text(json)).await.is_ok()
}

async fn handle_subscribe(
    socket: WebSocket,
    state: Arc<AppState>,
    session_id: String,
    from_offset_exclusive: i64,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: get-or-create and touch.
    let processor = state.registry.get_or_create(&session_id).await;
    state.registry.touch(&session_id).await;

    // Step 2: eager subscription, strictly before reading the log, so no
    // publish in between is missed (spec §4.7's load-bearing ordering).
    let mut sub = processor.bus.subscribe();

    // Step 3-4: replay the durable gap, and compute dbMax.
    let rows = match state.event_log.read_from(&session_id, from_offset_exclusive).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "failed to read replay rows");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    let db_max = rows.last().map(|r| r.offset).unwrap_or(from_offset_exclusive);

    debug!(session_id = %session_id, from_offset_exclusive, replayed = rows.len(), db_max, "subscription composer starting");

    for row in &rows {
        let Some(event) = row_to_event(row) else { continue };
        if !send_event(&mut sender, &event, row.offset).await {
            return;
        }
    }

    // Step 5b: the live tail, filtered to exclude anything already replayed.
    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // This is a read-only stream; any other client frame
                    // (ping/pong/binary) is simply ignored.
                    _ => {}
                }
            }
            outcome = sub.recv() => {
                match outcome {
                    RecvOutcome::Event(EventWithOffset { event, offset }) => {
                        if offset <= db_max {
                            continue;
                        }
                        if !send_event(&mut sender, &event, offset).await {
                            break;
                        }
                    }
                    RecvOutcome::Closed => {
                        debug!(session_id = %session_id, "event bus closed, ending subscription");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                    RecvOutcome::Overflow => {
                        // Per spec §4.2: a lagged subscriber is not resumed
                        // in place. Force a disconnect; the client must
                        // reconnect with its last-seen offset.
                        warn!(session_id = %session_id, "subscriber overflowed, forcing reconnect");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
}
