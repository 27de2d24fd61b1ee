//! Error types for loom-core, layered per subsystem and aggregated into
//! [`LoomError`].

use thiserror::Error;

/// Top-level error type for loom-core.
#[derive(Error, Debug)]
pub enum LoomError {
    #[error("retry stream error: {0}")]
    Retry(#[from] RetryError),

    #[error("processor registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Log(#[from] loom_log::Error),
}

/// A record from the generator did not conform to the response schema.
#[derive(Error, Debug, Clone)]
#[error("failed to parse generator record: {message} (raw: {raw_line})")]
pub struct ParseError {
    pub raw_line: String,
    pub message: String,
}

/// Why a patch failed validation against the scratch document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchValidationReason {
    #[error("selector not found")]
    SelectorNotFound,
    #[error("selector is empty")]
    EmptySelector,
    #[error("failed to apply patch")]
    ApplyFailure,
}

#[derive(Error, Debug, Clone)]
#[error("patch validation failed for selector {selector}: {reason} ({message})")]
pub struct PatchValidationError {
    pub selector: String,
    pub reason: PatchValidationReason,
    pub message: String,
}

/// Errors recognized by the Retry Stream, recoverable via a corrective
/// continuation unless attempts are exhausted.
#[derive(Error, Debug, Clone)]
pub enum RecoverableError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    PatchValidation(#[from] PatchValidationError),

    #[error("generator transport error: {0}")]
    GeneratorTransport(String),
}

/// Terminal failures of the Retry Stream.
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("exceeded {attempts} attempts without producing a valid stream")]
    MaxAttemptsExceeded { attempts: u32 },
}

/// Errors surfaced by the Processor Registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("session {0} not found")]
    NotFound(String),
}

/// Errors surfaced while a Processor runs its main loop. These are always
/// logged and swallowed by the loop itself (spec §4.4 step 5); the type
/// exists so the loop's `match` stays exhaustive and auditable.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Retry(#[from] RetryError),

    #[error("failed to persist event at offset {offset}: {source}")]
    StorePersist {
        offset: i64,
        #[source]
        source: loom_log::Error,
    },

    #[error("event bus was closed before publish")]
    BusPublishFailed,
}
