//! Error types for property-based testing.
//!
//! Three families live here:
//!
//! - [`ArbitraryError`]: usage errors raised while building or driving arbitraries.
//!   Construction-time problems are returned as `Result`s; problems detected in the
//!   middle of generation or shrinking are raised as panics carrying the error as
//!   payload (see [`ArbitraryError::raise`]) and converted back by the runner.
//! - [`PropertyError`]: what a predicate reports, and what the runner returns when a
//!   run cannot complete.
//! - [`ConfigError`](crate::config::ConfigError) lives next to the parameters it validates.

use std::any::Any;

use thiserror::Error;

use crate::config::ConfigError;

/// Misuse of the arbitrary API. Always fatal, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbitraryError {
    /// A weighted choice was built without any alternative
    #[error("frequency expects at least one weighted arbitrary")]
    EmptyFrequency,

    /// All weights of a weighted choice are zero
    #[error("frequency expects a total weight greater than zero")]
    ZeroTotalWeight,

    /// The prefix-summed table did not contain the drawn weight
    #[error("unable to generate from frequency: no entry matched weight {selected} of {total}")]
    NoMatchingWeight { selected: u64, total: u64 },

    /// Lower bound above upper bound
    #[error("invalid range: min ({min}) must be lower than or equal to max ({max})")]
    InvalidRange { min: String, max: String },

    /// A lazy arbitrary was used before `letrec` bound it
    #[error("Lazy arbitrary {name:?} not correctly initialized")]
    UnboundLazy { name: String },

    /// A filter rejected every candidate it was offered
    #[error("filter failed to produce a valid value after {attempts} attempts")]
    FilterExhausted { attempts: usize },

    /// The replay path says a command was skipped but it actually ran
    #[error("Mismatch between replayPath and real execution")]
    ReplayMismatch,

    /// A replay token could not be decoded
    #[error("invalid replay path {token:?}: {reason}")]
    InvalidReplayPath { token: String, reason: String },
}

impl ArbitraryError {
    /// Abort the current generation or shrink step with this error.
    ///
    /// The payload survives unwinding, so the runner can report the original error
    /// instead of an opaque panic message.
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }

    /// Recover an `ArbitraryError` from a panic payload, if that is what it carries.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Option<Self> {
        payload.downcast_ref::<ArbitraryError>().cloned()
    }
}

/// Error type shared by predicates and the runner
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// The property does not hold for the given input
    #[error("Property failed: {message}")]
    PropertyFailed { message: String },

    /// The input does not satisfy the predicate's preconditions; the trial is skipped
    #[error("Precondition failed")]
    PreconditionFailed,

    /// An arbitrary panicked while generating or shrinking a value
    #[error("Generation failed: {message}")]
    GenerationFailed { message: String },

    /// An asynchronous predicate did not settle in time
    #[error("Property timeout: exceeded limit of {millis} milliseconds")]
    Timeout { millis: u128 },

    /// An arbitrary was misused; the run was aborted
    #[error("Usage error: {0}")]
    Usage(#[from] ArbitraryError),

    /// The run parameters are invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PropertyError {
    /// Create a property failure with the given message
    pub fn property_failed(message: impl Into<String>) -> Self {
        Self::PropertyFailed {
            message: message.into(),
        }
    }

    /// Whether this error is the precondition skip signal
    pub fn is_precondition_failure(&self) -> bool {
        matches!(self, PropertyError::PreconditionFailed)
    }

    /// Convert a panic payload from a predicate or an arbitrary into an error.
    ///
    /// Usage errors keep their structure; any other payload becomes a property failure
    /// holding the panic message.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(usage) = ArbitraryError::from_panic(payload.as_ref()) {
            return PropertyError::Usage(usage);
        }
        PropertyError::property_failed(panic_message(payload.as_ref()))
    }

    /// Convert a panic payload raised by an arbitrary into an error
    pub(crate) fn from_generation_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(usage) = ArbitraryError::from_panic(payload.as_ref()) {
            return PropertyError::Usage(usage);
        }
        PropertyError::GenerationFailed {
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Skip the current trial unless `condition` holds.
///
/// ```rust
/// use prova::{pre, PropertyError};
///
/// fn halve(n: i64) -> Result<(), PropertyError> {
///     pre(n % 2 == 0)?;
///     assert_eq!((n / 2) * 2, n);
///     Ok(())
/// }
/// assert!(halve(3).unwrap_err().is_precondition_failure());
/// ```
pub fn pre(condition: bool) -> Result<(), PropertyError> {
    if condition {
        Ok(())
    } else {
        Err(PropertyError::PreconditionFailed)
    }
}

/// Best-effort extraction of a human readable panic message
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(error) = payload.downcast_ref::<ArbitraryError>() {
        error.to_string()
    } else {
        "predicate panicked".to_string()
    }
}
