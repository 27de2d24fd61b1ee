//! Per-session Event Bus: in-memory multi-subscriber broadcast of live
//! events with per-subscriber buffering (spec §4.2).
//!
//! Delivery policy: a subscriber whose buffer overflows is not resumed in
//! place — it observes [`RecvOutcome::Overflow`] and must reconnect through
//! the Subscription Composer with its last-seen offset. This differs from
//! `tokio::sync::broadcast`'s default "skip the lagged messages and keep
//! going" behavior, which would silently create a gap.

use tokio::sync::broadcast;

use crate::model::EventWithOffset;

/// Outcome of a single `recv` on a bus subscription.
#[derive(Debug)]
pub enum RecvOutcome {
    Event(EventWithOffset),
    /// The bus was closed (the Processor that owns it was evicted).
    Closed,
    /// This subscriber's buffer overflowed; it must reconnect.
    Overflow,
}

/// A broadcast channel of `EventWithOffset`, scoped to one session's
/// Processor. Created with the Processor, closed when it's evicted.
pub struct EventBus {
    sender: broadcast::Sender<EventWithOffset>,
}

impl EventBus {
    #[must_use]
    pub fn new(subscriber_buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(subscriber_buffer);
        Self { sender }
    }

    /// Deliver `event` to every current subscriber. Does not block: a
    /// subscriber with a full buffer will discover it via `Overflow` on its
    /// own `recv`, not by stalling this call.
    pub fn publish(&self, event: EventWithOffset) {
        // No subscribers is not an error: a live-only bus with nobody
        // listening yet is the common case right after a session is created.
        let _ = self.sender.send(event);
    }

    /// Eager subscription: from this moment every new publish is buffered
    /// for the returned handle.
    #[must_use]
    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct BusSubscription {
    receiver: broadcast::Receiver<EventWithOffset>,
}

impl BusSubscription {
    pub async fn recv(&mut self) -> RecvOutcome {
        match self.receiver.recv().await {
            Ok(event) => RecvOutcome::Event(event),
            Err(broadcast::error::RecvError::Closed) => RecvOutcome::Closed,
            Err(broadcast::error::RecvError::Lagged(_)) => RecvOutcome::Overflow,
        }
    }
}
