//! Processor (spec §4.4): the per-session actor that drains the Action
//! Queue in batches, drives a generator invocation through the Retry Stream,
//! and dual-writes each resulting event — publish to the bus, then append
//! to the log, in that order (§4.4 step 5, §9).
//!
//! Structured as a `select!` over a shutdown token and the next unit of
//! work, logging and continuing on failure rather than tearing down the
//! task, with the unit of work being a batch drained from this session's
//! own `ActionQueue` rather than a shared log consumer group.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use loom_log::EventLog;

use crate::bus::EventBus;
use crate::config::LoomConfig;
use crate::error::RetryError;
use crate::generator::Generator;
use crate::model::{Action, EventWithOffset, StreamEvent};
use crate::queue::ActionQueue;
use crate::retry;
use crate::validator::ScratchDocument;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Everything the Registry needs to hold onto, touch, and evict.
pub struct ProcessorHandle {
    pub session_id: String,
    pub queue: Arc<ActionQueue>,
    pub bus: Arc<EventBus>,
    last_accessed_millis: AtomicI64,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessorHandle {
    /// Update `lastAccessed` to now. Never fails (spec §4.6).
    pub fn touch(&self) {
        self.last_accessed_millis.store(now_millis(), Ordering::Relaxed);
    }

    pub fn idle_for_millis(&self) -> i64 {
        now_millis() - self.last_accessed_millis.load(Ordering::Relaxed)
    }

    /// Stop the processing task and release queue/bus (spec's eviction
    /// contract). The registry entry removal itself is the caller's job.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

/// Derive the effective model id: the `model` field of the most recent
/// action in `batch` that specifies one, else `None` (the generator falls
/// back to its own default).
fn effective_model(batch: &[Action]) -> Option<String> {
    batch.iter().rev().find_map(|a| a.model().map(str::to_string))
}

async fn reconstruct_current_html(
    event_log: &dyn EventLog<StreamEvent>,
    session_id: &str,
) -> Option<String> {
    let row = match event_log.last_full_or_done(session_id).await {
        Ok(row) => row?,
        Err(e) => {
            warn!(session_id, error = %e, "failed to read last full/done row on restart");
            return None;
        }
    };
    match serde_json::from_slice::<StreamEvent>(&row.payload) {
        Ok(StreamEvent::Full { html } | StreamEvent::Done { html }) => Some(html),
        Ok(_) => None,
        Err(e) => {
            warn!(session_id, error = %e, "failed to deserialize last full/done row");
            None
        }
    }
}

/// Construct a Processor for `session_id`: restore its offset counter and
/// current HTML from the log, spawn its processing task, and return a
/// handle the Registry can hold, touch, and later shut down.
pub async fn spawn(
    session_id: String,
    generator: Arc<dyn Generator>,
    event_log: Arc<dyn EventLog<StreamEvent>>,
    config: &LoomConfig,
) -> Arc<ProcessorHandle> {
    let starting_offset = event_log
        .latest_offset(&session_id)
        .await
        .unwrap_or_else(|e| {
            warn!(session_id = %session_id, error = %e, "failed to read latest offset, starting from -1");
            -1
        });
    let initial_html = reconstruct_current_html(event_log.as_ref(), &session_id).await;

    let queue = Arc::new(ActionQueue::new());
    let bus = Arc::new(EventBus::new(config.subscriber_buffer));
    let cancel = CancellationToken::new();

    let handle = Arc::new(ProcessorHandle {
        session_id: session_id.clone(),
        queue: queue.clone(),
        bus: bus.clone(),
        last_accessed_millis: AtomicI64::new(now_millis()),
        cancel: cancel.clone(),
        task: Mutex::new(None),
    });

    let max_batch_size = config.max_batch_size;
    let max_attempts = config.max_attempts;
    let task = tokio::spawn(run_loop(
        session_id,
        queue,
        bus,
        generator,
        event_log,
        starting_offset,
        initial_html,
        max_batch_size,
        max_attempts,
        cancel,
    ));
    *handle.task.lock().await = Some(task);
    handle
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    session_id: String,
    queue: Arc<ActionQueue>,
    bus: Arc<EventBus>,
    generator: Arc<dyn Generator>,
    event_log: Arc<dyn EventLog<StreamEvent>>,
    starting_offset: i64,
    mut current_html: Option<String>,
    max_batch_size: usize,
    max_attempts: u32,
    cancel: CancellationToken,
) {
    let mut offset = starting_offset;
    let mut scratch = ScratchDocument::new();
    if let Some(html) = &current_html {
        scratch.seed("root", html.clone());
    }
    info!(session_id = %session_id, offset, "processor started");

    loop {
        let batch = tokio::select! {
            () = cancel.cancelled() => {
                info!(session_id = %session_id, "processor cancelled");
                break;
            }
            batch = queue.take_batch(1, max_batch_size) => batch,
        };

        let Some(batch) = batch else {
            info!(session_id = %session_id, "action queue closed, processor stopping");
            break;
        };
        debug!(session_id = %session_id, batch_len = batch.len(), "processing batch");

        let model = effective_model(&batch);
        let result = retry::run_with_scratch(
            generator.as_ref(),
            &session_id,
            &batch,
            model.as_deref(),
            current_html.clone(),
            &mut scratch,
            max_attempts,
        )
        .await;

        let events = match result {
            Ok(events) => events,
            Err(RetryError::MaxAttemptsExceeded { attempts }) => {
                error!(session_id = %session_id, attempts, "retry stream exhausted, skipping batch");
                continue;
            }
        };

        for event in events {
            if let StreamEvent::Full { html } | StreamEvent::Done { html } = &event {
                current_html = Some(html.clone());
            }

            offset += 1;
            bus.publish(EventWithOffset {
                event: event.clone(),
                offset,
            });
            if let Err(e) = event_log.append(&session_id, offset, &event).await {
                error!(session_id = %session_id, offset, error = %e, "failed to persist event, offset will not be reused");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::generator::MockGenerator;
    use loom_log::InMemoryEventLog;

    fn prompt(text: &str, model: Option<&str>) -> Action {
        Action::Prompt {
            text: text.to_string(),
            model: model.map(str::to_string),
            context: None,
        }
    }

    #[test]
    fn effective_model_picks_most_recent_specified() {
        let batch = vec![
            prompt("a", Some("model-a")),
            Action::UiAction {
                name: "click".into(),
                data: HashMap::new(),
                model: None,
            },
            prompt("c", Some("model-c")),
        ];
        assert_eq!(effective_model(&batch), Some("model-c".to_string()));
    }

    #[test]
    fn effective_model_is_none_when_nothing_specifies_one() {
        let batch = vec![prompt("a", None)];
        assert_eq!(effective_model(&batch), None);
    }

    #[tokio::test]
    async fn s1_single_action_happy_path_assigns_contiguous_offsets_and_persists() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_lines(vec![
            r#"{"type":"full","html":"<div>hello</div>"}"#,
        ]);
        let event_log: Arc<dyn EventLog<StreamEvent>> =
            Arc::new(InMemoryEventLog::new());
        let config = LoomConfig::default();

        let handle = spawn(
            "s1".to_string(),
            generator.clone(),
            event_log.clone(),
            &config,
        )
        .await;

        let mut sub = handle.bus.subscribe();
        handle
            .queue
            .offer(prompt("build a dashboard", None))
            .unwrap();

        let mut offsets = Vec::new();
        for _ in 0..3 {
            match sub.recv().await {
                crate::bus::RecvOutcome::Event(e) => offsets.push(e.offset),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(offsets, vec![0, 1, 2]);

        handle.shutdown().await;
        let rows = event_log.read_from("s1", -1).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.offset).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn s3_offset_continuation_resumes_from_restored_offset() {
        let event_log: Arc<dyn EventLog<StreamEvent>> =
            Arc::new(InMemoryEventLog::new());
        for (offset, html) in [(0, "a"), (1, "b"), (2, "c")] {
            event_log
                .append(
                    "s3",
                    offset,
                    &StreamEvent::Done {
                        html: html.to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let generator = Arc::new(MockGenerator::new());
        generator.queue_lines(vec![r#"{"type":"full","html":"<p>d</p>"}"#]);
        let config = LoomConfig::default();

        let handle = spawn("s3".to_string(), generator, event_log.clone(), &config).await;
        let mut sub = handle.bus.subscribe();
        handle.queue.offer(prompt("continue", None)).unwrap();

        let crate::bus::RecvOutcome::Event(event) = sub.recv().await else {
            panic!("expected event");
        };
        assert_eq!(event.offset, 3);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn a_second_batchs_patches_validate_against_the_first_batchs_full() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_lines(vec![r#"{"type":"full","html":"<div>hello</div>"}"#]);
        generator
            .queue_lines(vec![r#"{"type":"patches","patches":[{"selector":"#root","text":"updated"}]}"#]);

        let event_log: Arc<dyn EventLog<StreamEvent>> = Arc::new(InMemoryEventLog::new());
        let config = LoomConfig::default();

        let handle = spawn(
            "s-cross-batch".to_string(),
            generator,
            event_log.clone(),
            &config,
        )
        .await;
        let mut sub = handle.bus.subscribe();

        handle.queue.offer(prompt("build a dashboard", None)).unwrap();
        for _ in 0..3 {
            sub.recv().await;
        }

        handle.queue.offer(prompt("make it say updated", None)).unwrap();
        let mut patched = false;
        for _ in 0..3 {
            if let crate::bus::RecvOutcome::Event(e) = sub.recv().await {
                if matches!(e.event, StreamEvent::Patches { .. }) {
                    patched = true;
                }
            }
        }
        assert!(patched, "patch against #root should validate against the prior Full");

        handle.shutdown().await;
    }
}
