//! loom-core: the streaming-session engine at the heart of loom.
//!
//! This crate provides the foundational components for a generative-UI
//! streaming backend:
//!
//! - **Event model** — [`model::Action`], [`model::Patch`], [`model::StreamEvent`]
//! - **Event Bus** — [`bus::EventBus`] for in-memory live fan-out to subscribers
//! - **Action Queue** — [`queue::ActionQueue`], the Processor's inbox
//! - **Validator** — [`validator::ScratchDocument`], the in-memory document a
//!   generator's patches are validated against before being accepted
//! - **Generator contract** — [`generator::Generator`] and [`generator::MockGenerator`]
//! - **Retry Stream** — [`retry::run`], the self-correcting generation loop
//! - **Processor** — [`processor::spawn`], the per-session actor tying the
//!   above together
//! - **Registry** — [`registry::ProcessorRegistry`], idle-eviction-aware
//!   lookup of per-session Processors

pub mod bus;
pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod validator;

pub use bus::{BusSubscription, EventBus, RecvOutcome};
pub use config::LoomConfig;
pub use error::{
    LoomError, ParseError, PatchValidationError, PatchValidationReason, ProcessorError,
    RecoverableError, RegistryError, RetryError,
};
pub use generator::{Generator, GeneratorStream, GeneratorToken, MockGenerator, SlowMockGenerator, Usage};
pub use model::{Action, EventWithOffset, Patch, Stats, StreamEvent};
pub use processor::ProcessorHandle;
pub use queue::ActionQueue;
pub use registry::ProcessorRegistry;
pub use validator::ScratchDocument;
