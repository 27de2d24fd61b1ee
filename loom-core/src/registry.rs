//! Processor Registry (spec §4.6): process-wide lazy get-or-create,
//! liveness touching, and idle eviction of per-session Processors.
//!
//! A single-mutex map of session id to session state, extended with
//! `lastAccessed`/sweeper eviction logic: sessions are reaped after a
//! configurable idle period rather than living for the process's whole
//! lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use loom_log::EventLog;

use crate::config::LoomConfig;
use crate::generator::Generator;
use crate::model::StreamEvent;
use crate::processor::{self, ProcessorHandle};

/// The map from session id to Processor, covered by a single mutex so
/// get-or-create and evict cannot race (spec §4.6 invariant).
pub struct ProcessorRegistry {
    processors: Mutex<HashMap<String, Arc<ProcessorHandle>>>,
    generator: Arc<dyn Generator>,
    event_log: Arc<dyn EventLog<StreamEvent>>,
    config: LoomConfig,
}

impl ProcessorRegistry {
    #[must_use]
    pub fn new(
        generator: Arc<dyn Generator>,
        event_log: Arc<dyn EventLog<StreamEvent>>,
        config: LoomConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            processors: Mutex::new(HashMap::new()),
            generator,
            event_log,
            config,
        })
    }

    /// Returns the existing Processor for `session_id`, or atomically
    /// constructs one (action queue, event bus, offset restored from log,
    /// task spawned). Safe under concurrent callers: exactly one Processor
    /// is ever created per session id.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<ProcessorHandle> {
        let mut processors = self.processors.lock().await;
        if let Some(existing) = processors.get(session_id) {
            existing.touch();
            return existing.clone();
        }

        let handle = processor::spawn(
            session_id.to_string(),
            self.generator.clone(),
            self.event_log.clone(),
            &self.config,
        )
        .await;
        processors.insert(session_id.to_string(), handle.clone());
        handle
    }

    /// Update `lastAccessed` to now. Never fails; a touch for a session with
    /// no live Processor is simply a no-op.
    pub async fn touch(&self, session_id: &str) {
        if let Some(handle) = self.processors.lock().await.get(session_id) {
            handle.touch();
        }
    }

    pub async fn session_count(&self) -> usize {
        self.processors.lock().await.len()
    }

    /// Cancel the task, close the queue/bus, and remove the entry for one
    /// session. The durable log is unaffected.
    pub async fn evict(&self, session_id: &str) {
        let handle = self.processors.lock().await.remove(session_id);
        if let Some(handle) = handle {
            debug!(session_id, "evicting processor");
            handle.shutdown().await;
        }
    }

    async fn sweep_once(&self) -> Vec<String> {
        let idle_ttl_millis = self.config.idle_ttl.as_millis() as i64;
        let idle: Vec<String> = {
            let processors = self.processors.lock().await;
            processors
                .iter()
                .filter(|(_, handle)| {
                    handle.idle_for_millis() > idle_ttl_millis && handle.queue.pending_count() == 0
                })
                .map(|(id, _)| id.clone())
                .collect()
        };
        for session_id in &idle {
            self.evict(session_id).await;
        }
        idle
    }

    /// Spawn the background sweeper: every `sweep_interval`, evicts any
    /// processor idle longer than `idle_ttl` with no pending actions.
    /// Cancelled via `shutdown_token`.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown_token: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(registry.config.sweep_interval);
            loop {
                tokio::select! {
                    () = shutdown_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = registry.sweep_once().await;
                        if !evicted.is_empty() {
                            debug!(count = evicted.len(), "sweeper evicted idle processors");
                        }
                    }
                }
            }
        })
    }

    /// Graceful shutdown: cancel every live Processor and wait for in-flight
    /// log appends to drain before returning.
    pub async fn shutdown_all(&self) {
        let handles: Vec<Arc<ProcessorHandle>> =
            self.processors.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}
