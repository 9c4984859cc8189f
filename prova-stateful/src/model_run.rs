//! Execute generated commands against a model and the real system

use thiserror::Error;
use tracing::trace;

use prova::PropertyError;

use crate::command::{AsyncCommand, Command};
use crate::commands::CommandsIterable;

/// Failure of a command during a model run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelRunError {
    #[error("command #{position} {command} failed: {message}")]
    CommandFailed {
        /// 1-based position among the executed commands
        position: usize,
        command: String,
        message: String,
    },
}

impl From<ModelRunError> for PropertyError {
    fn from(error: ModelRunError) -> Self {
        PropertyError::property_failed(error.to_string())
    }
}

fn command_failed<C: std::fmt::Debug>(
    position: usize,
    command: &C,
    error: PropertyError,
) -> PropertyError {
    match error {
        // Skips raised by a command skip the whole run
        PropertyError::PreconditionFailed => error,
        PropertyError::PropertyFailed { message } => ModelRunError::CommandFailed {
            position,
            command: format!("{:?}", command),
            message,
        }
        .into(),
        other => ModelRunError::CommandFailed {
            position,
            command: format!("{:?}", command),
            message: other.to_string(),
        }
        .into(),
    }
}

/// Run `commands` in order against the model and real system built by `setup`.
///
/// Commands whose `check` rejects the current model are skipped and stay marked as not
/// run, so the shrinker drops them.
pub fn model_run<C, S>(setup: S, commands: &CommandsIterable<C>) -> Result<(), PropertyError>
where
    C: Command,
    S: FnOnce() -> (C::Model, C::Real),
{
    let (mut model, mut real) = setup();
    let mut position = 0;
    for wrapper in commands {
        let command = wrapper.command();
        if !command.check(&model) {
            trace!(command = ?command, "command skipped by its check");
            continue;
        }
        position += 1;
        wrapper.mark_ran();
        command
            .run(&mut model, &mut real)
            .map_err(|error| command_failed(position, command, error))?;
    }
    Ok(())
}

/// Asynchronous counterpart of [`model_run`]; commands are awaited one at a time
pub async fn async_model_run<C, S>(
    setup: S,
    commands: &CommandsIterable<C>,
) -> Result<(), PropertyError>
where
    C: AsyncCommand,
    S: FnOnce() -> (C::Model, C::Real),
{
    let (mut model, mut real) = setup();
    let mut position = 0;
    for wrapper in commands {
        let command = wrapper.command();
        if !command.check(&model) {
            trace!(command = ?command, "command skipped by its check");
            continue;
        }
        position += 1;
        wrapper.mark_ran();
        command
            .run(&mut model, &mut real)
            .await
            .map_err(|error| command_failed(position, command, error))?;
    }
    Ok(())
}
