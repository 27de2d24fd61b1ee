//! The Generator contract (spec §6.1): the Processor's only effectful
//! dependency on the actual language-model invocation, which is itself out
//! of scope (spec §1).

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::RecoverableError;
use crate::model::Action;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One item yielded by an open generator stream.
#[derive(Debug, Clone)]
pub enum GeneratorToken {
    /// A chunk of text; the Retry Stream accumulates these into
    /// newline-delimited JSON records.
    Text(String),
    /// Forwarded to the (out-of-scope) Tool adapter; not interpreted here.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    FinishStep { usage: Usage },
    Finish,
}

pub type GeneratorStream =
    Pin<Box<dyn Stream<Item = Result<GeneratorToken, RecoverableError>> + Send>>;

/// The Processor consumes a generator through this single effectful
/// operation (spec §6.1).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn open_stream(
        &self,
        session_id: &str,
        batch: &[Action],
        model: Option<&str>,
        current_html: Option<&str>,
    ) -> GeneratorStream;
}

enum QueuedResponse {
    Lines(Vec<String>),
    Error(RecoverableError),
}

/// Scriptable generator for tests. Queue responses with
/// [`MockGenerator::queue_lines`] or [`MockGenerator::queue_error`] before
/// driving a Processor or Retry Stream; each `open_stream` call consumes one
/// queued response.
#[derive(Default)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<QueuedResponse>>,
    seen_batches: Arc<StdMutex<Vec<Vec<Action>>>>,
}

impl MockGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The `batch` argument of every `open_stream` call so far, in order.
    /// Lets a test assert what a Retry Stream actually sent on a corrective
    /// continuation, not just what it emitted.
    #[must_use]
    pub fn seen_batches(&self) -> Arc<StdMutex<Vec<Vec<Action>>>> {
        self.seen_batches.clone()
    }

    /// Queue a response that emits each line as a `Text` token (with a
    /// trailing newline) followed by `Finish`.
    pub fn queue_lines(&self, lines: Vec<impl Into<String>>) {
        self.responses
            .try_lock()
            .expect("MockGenerator is not shared across threads during setup")
            .push_back(QueuedResponse::Lines(
                lines.into_iter().map(Into::into).collect(),
            ));
    }

    /// Queue a transport error raised as soon as the stream is polled.
    pub fn queue_error(&self, error: RecoverableError) {
        self.responses
            .try_lock()
            .expect("MockGenerator is not shared across threads during setup")
            .push_back(QueuedResponse::Error(error));
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn open_stream(
        &self,
        _session_id: &str,
        batch: &[Action],
        _model: Option<&str>,
        _current_html: Option<&str>,
    ) -> GeneratorStream {
        self.seen_batches.lock().unwrap().push(batch.to_vec());
        let next = self.responses.lock().await.pop_front();
        match next {
            Some(QueuedResponse::Lines(lines)) => {
                let mut items: Vec<Result<GeneratorToken, RecoverableError>> = lines
                    .into_iter()
                    .map(|line| Ok(GeneratorToken::Text(format!("{line}\n"))))
                    .collect();
                items.push(Ok(GeneratorToken::Finish));
                Box::pin(stream::iter(items))
            }
            Some(QueuedResponse::Error(error)) => Box::pin(stream::iter(vec![Err(error)])),
            None => Box::pin(stream::empty()),
        }
    }
}

/// Wraps a [`MockGenerator`] with a fixed delay before the stream opens, for
/// exercising timeout and backpressure handling in the Processor and
/// Registry sweeper without a real generator backend.
pub struct SlowMockGenerator {
    inner: MockGenerator,
    delay: Duration,
}

impl SlowMockGenerator {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockGenerator::new(),
            delay,
        }
    }

    pub fn queue_lines(&self, lines: Vec<impl Into<String>>) {
        self.inner.queue_lines(lines);
    }

    pub fn queue_error(&self, error: RecoverableError) {
        self.inner.queue_error(error);
    }
}

#[async_trait]
impl Generator for SlowMockGenerator {
    async fn open_stream(
        &self,
        session_id: &str,
        batch: &[Action],
        model: Option<&str>,
        current_html: Option<&str>,
    ) -> GeneratorStream {
        tokio::time::sleep(self.delay).await;
        self.inner
            .open_stream(session_id, batch, model, current_html)
            .await
    }
}
