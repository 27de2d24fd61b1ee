//! The data model: actions in, stream events out, patches applied to a
//! scratch document in between.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use loom_log::TaggedEvent;

/// A single user intention submitted to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Prompt {
        text: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        context: Option<Value>,
    },
    UiAction {
        name: String,
        data: HashMap<String, Value>,
        #[serde(default)]
        model: Option<String>,
    },
}

impl Action {
    /// The `model` field this action specifies, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            Action::Prompt { model, .. } | Action::UiAction { model, .. } => model.as_deref(),
        }
    }
}

/// A selector-targeted mutation instruction for a DOM-like tree. Selectors
/// are id-based CSS fragments (e.g. `#root`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Patch {
    SetText {
        selector: String,
        text: String,
    },
    /// `null` values mean "remove this attribute".
    SetAttributes {
        selector: String,
        attr: HashMap<String, Option<String>>,
    },
    SetInnerHtml {
        selector: String,
        html: String,
    },
    AppendHtml {
        selector: String,
        html: String,
    },
    PrependHtml {
        selector: String,
        html: String,
    },
    Remove {
        selector: String,
    },
}

impl Patch {
    pub fn selector(&self) -> &str {
        match self {
            Patch::SetText { selector, .. }
            | Patch::SetAttributes { selector, .. }
            | Patch::SetInnerHtml { selector, .. }
            | Patch::AppendHtml { selector, .. }
            | Patch::PrependHtml { selector, .. }
            | Patch::Remove { selector } => selector,
        }
    }
}

/// Statistics delivered as a terminal event of a Retry Stream attempt chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Stats {
    pub cache_rate: f64,
    pub tokens_per_second: f64,
    pub mode: String,
    pub patch_count: u32,
}

/// One record produced by the generator and broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Session { session_id: String },
    Patches { patches: Vec<Patch> },
    Full { html: String },
    Stats(Stats),
    Done { html: String },
}

impl TaggedEvent for StreamEvent {
    fn type_tag(&self) -> &'static str {
        match self {
            StreamEvent::Session { .. } => "session",
            StreamEvent::Patches { .. } => "patches",
            StreamEvent::Full { .. } => "full",
            StreamEvent::Stats(_) => "stats",
            StreamEvent::Done { .. } => "done",
        }
    }
}

/// `(event, offset)`. Offsets form a dense per-session sequence starting at
/// 0 or at `latest_offset + 1` on restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventWithOffset {
    pub event: StreamEvent,
    pub offset: i64,
}
