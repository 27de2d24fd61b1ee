//! Action Queue: an unbounded FIFO of [`Action`](crate::model::Action)
//! (spec §4.3). Backpressure is handled upstream by rate-limiting inputs,
//! not here.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::model::Action;

pub struct ActionQueue {
    sender: mpsc::UnboundedSender<Action>,
    receiver: Mutex<mpsc::UnboundedReceiver<Action>>,
    pending: AtomicUsize,
}

impl ActionQueue {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
        }
    }

    /// Non-blocking enqueue. Fails only if every receiver (the Processor's
    /// main loop) has already been dropped.
    pub fn offer(&self, action: Action) -> Result<(), Action> {
        self.sender.send(action).map_err(|e| e.0)?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Actions enqueued but not yet handed to a `take_batch` caller. Used by
    /// the Registry sweeper to avoid evicting a session with queued work.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Blocks until at least one action is available, then returns up to
    /// `max` actions in enqueue order. `min` is always 1 in this
    /// implementation: a single blocking consumer has no way to usefully
    /// wait for more than one item without also bounding how long it waits,
    /// which spec §4.3 leaves unspecified.
    ///
    /// Returns `None` once the queue is closed (every sender dropped) and
    /// empty — the Processor's signal to stop.
    pub async fn take_batch(&self, min: usize, max: usize) -> Option<Vec<Action>> {
        debug_assert!(min >= 1, "take_batch requires min >= 1");
        debug_assert!(max >= min, "take_batch requires max >= min");

        let mut receiver = self.receiver.lock().await;
        let first = receiver.recv().await?;
        let mut batch = vec![first];

        while batch.len() < max {
            match receiver.try_recv() {
                Ok(action) => batch.push(action),
                Err(_) => break,
            }
        }
        self.pending.fetch_sub(batch.len(), Ordering::SeqCst);
        Some(batch)
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new()
    }
}
