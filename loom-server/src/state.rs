//! Shared application state for the loom server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use loom_core::{LoomConfig, ProcessorRegistry, StreamEvent};
use loom_log::EventLog;

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Per-session Processor lookup and eviction
    pub registry: Arc<ProcessorRegistry>,
    /// Durable event storage, shared with the Registry
    pub event_log: Arc<dyn EventLog<StreamEvent>>,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    #[must_use]
    pub fn new(generator: Arc<dyn loom_core::Generator>, event_log: Arc<dyn EventLog<StreamEvent>>, config: LoomConfig) -> Self {
        let registry = ProcessorRegistry::new(generator, event_log.clone(), config);
        Self {
            registry,
            event_log,
            started_at: Utc::now(),
        }
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    pub async fn session_count(&self) -> usize {
        self.registry.session_count().await
    }
}
