#![allow(clippy::type_complexity)]

//! # Prova Stateful
//!
//! Model-based testing on top of prova: generate sequences of commands, run them
//! against a simplified model and the real system side by side, and shrink failing
//! sequences down to the commands that matter.
//!
//! Only commands that actually ran take part in shrinking. Which commands ran is kept
//! as a replay path, printed with the counterexample, so a failure can be reproduced
//! from its seed, its path and its replay token.
//!
//! ## Quick Example
//!
//! ```rust
//! use prova::{Arbitrary, Parameters, PropertyError, check_with_config, constant, property};
//! use prova_stateful::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! enum Op {
//!     Push,
//!     Pop,
//! }
//!
//! impl Command for Op {
//!     type Model = usize;
//!     type Real = Vec<u8>;
//!
//!     fn check(&self, model: &usize) -> bool {
//!         !matches!(self, Op::Pop) || *model > 0
//!     }
//!
//!     fn run(&self, model: &mut usize, real: &mut Vec<u8>) -> Result<(), PropertyError> {
//!         match self {
//!             Op::Push => {
//!                 *model += 1;
//!                 real.push(0);
//!             }
//!             Op::Pop => {
//!                 *model -= 1;
//!                 real.pop();
//!             }
//!         }
//!         if real.len() != *model {
//!             return Err(PropertyError::property_failed("size mismatch"));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let ops = commands(
//!     vec![constant(Op::Push).boxed(), constant(Op::Pop).boxed()],
//!     CommandsSettings::default(),
//! )
//! .unwrap();
//! let prop = property(ops, |cmds: CommandsIterable<Op>| {
//!     model_run(|| (0, Vec::new()), &cmds)
//! });
//! let details = check_with_config(&prop, Parameters::default().with_seed(7)).unwrap();
//! assert!(!details.failed);
//! ```

pub mod command;
pub mod commands;
pub mod model_run;
pub mod replay_path;

pub use command::{AsyncCommand, Command, CommandWrapper};
pub use commands::{CommandsArbitrary, CommandsIterable, CommandsSettings, commands};
pub use model_run::{ModelRunError, async_model_run, model_run};

/// Re-exports for convenient imports
pub mod prelude {
    pub use crate::command::{AsyncCommand, Command};
    pub use crate::commands::{CommandsIterable, CommandsSettings, commands};
    pub use crate::model_run::{async_model_run, model_run};
}
