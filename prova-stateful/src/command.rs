//! Commands applied to a model and to the real system under test

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use prova::PropertyError;

/// A single step of a model-based test.
///
/// `check` decides whether the command applies to the current model; `run` applies it
/// to both the model and the real system, and fails when they disagree.
pub trait Command: fmt::Debug + Clone + Send + Sync + 'static {
    /// Simplified representation of the system
    type Model;
    /// The system under test
    type Real;

    /// Whether the command can run against `model`
    fn check(&self, _model: &Self::Model) -> bool {
        true
    }

    /// Apply the command to the model and the real system
    fn run(&self, model: &mut Self::Model, real: &mut Self::Real) -> Result<(), PropertyError>;
}

/// Asynchronous counterpart of [`Command`]
pub trait AsyncCommand: fmt::Debug + Clone + Send + Sync + 'static {
    type Model: Send;
    type Real: Send;

    /// Whether the command can run against `model`
    fn check(&self, _model: &Self::Model) -> bool {
        true
    }

    /// Apply the command to the model and the real system
    fn run(
        &self,
        model: &mut Self::Model,
        real: &mut Self::Real,
    ) -> impl Future<Output = Result<(), PropertyError>> + Send;
}

/// A generated command together with whether it ran.
///
/// Clones share the flag, so the copy handed to a predicate reports back to the
/// shrinker. [`fresh`](CommandWrapper::fresh) gives an independent, not yet run copy.
pub struct CommandWrapper<C> {
    command: C,
    has_ran: Arc<AtomicBool>,
}

impl<C> CommandWrapper<C> {
    pub fn new(command: C) -> Self {
        Self {
            command,
            has_ran: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn has_ran(&self) -> bool {
        self.has_ran.load(Ordering::SeqCst)
    }

    /// Record that the command was executed
    pub fn mark_ran(&self) {
        self.has_ran.store(true, Ordering::SeqCst);
    }

    /// Copy of the command that has not run yet
    pub fn fresh(&self) -> Self
    where
        C: Clone,
    {
        Self::new(self.command.clone())
    }
}

impl<C: Clone> Clone for CommandWrapper<C> {
    fn clone(&self) -> Self {
        Self {
            command: self.command.clone(),
            has_ran: self.has_ran.clone(),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for CommandWrapper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.command.fmt(f)
    }
}

impl<C: PartialEq> PartialEq for CommandWrapper<C> {
    fn eq(&self, other: &Self) -> bool {
        self.command == other.command
    }
}
