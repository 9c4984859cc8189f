#![allow(clippy::type_complexity)]

//! # Prova - Property-Based Testing for Rust
//!
//! Prova generates random inputs for a predicate, and when the predicate fails it
//! shrinks the failing input to a simpler one that still fails. Every run is driven by
//! a seed, and every counterexample comes with a path that replays it directly.
//!
//! ## Quick Start
//!
//! ```rust
//! use prova::{check_with_config, nat, property, Parameters};
//!
//! let prop = property(nat(10_000), |n: u64| n < 1000);
//! let details = check_with_config(&prop, Parameters::default().with_seed(42)).unwrap();
//!
//! assert!(details.failed);
//! assert_eq!(details.counterexample, Some(1000));
//!
//! // Replay the counterexample without searching for it again
//! let replay = Parameters::default()
//!     .with_seed(details.seed)
//!     .with_path(details.counterexample_path.clone().unwrap());
//! let replayed = check_with_config(&prop, replay).unwrap();
//! assert_eq!(replayed.counterexample, Some(1000));
//! ```
//!
//! ## Arbitraries
//!
//! An [`Arbitrary`] produces [`Shrinkable`] values: a value together with a lazy,
//! restartable sequence of simpler candidates. Arbitraries compose through
//! [`map`](Arbitrary::map), [`filter`](Arbitrary::filter), [`chain`](Arbitrary::chain)
//! and [`zip`](Arbitrary::zip); [`frequency`] picks between alternatives by weight and
//! [`letrec`] ties recursive definitions together.
//!
//! ## Failure reports
//!
//! [`check`] returns [`RunDetails`]; [`default_report_message`] renders them and
//! [`assert_property`] panics with that rendering.

pub mod arbitrary;
pub mod config;
pub mod decorators;
pub mod error;
pub mod execution;
pub mod formatter;
pub mod frequency;
pub mod letrec;
pub mod primitives;
pub mod property;
pub mod random;
pub mod report;
pub mod shrinkable;

pub use arbitrary::{Arbitrary, BoxedArbitrary};
pub use config::{
    ConfigError, Parameters, VerbosityLevel, configure_global, read_global, reset_global,
};
pub use error::{ArbitraryError, PropertyError, pre};
pub use execution::{
    assert_async_property, assert_async_property_with_config, assert_property,
    assert_property_with_config, check, check_async, check_async_with_config, check_with_config,
};
pub use formatter::{async_default_report_message, default_report_message};
pub use frequency::{FrequencyArbitrary, WeightedArbitrary, frequency, one_of, weighted};
pub use letrec::{LazyArbitrary, Tie, letrec};
pub use primitives::{
    ArrayArbitrary, BooleanArbitrary, Constant, Integer, IntegerArbitrary, array, boolean,
    constant, integer, nat,
};
pub use property::{
    AsyncProperty, IntoOutcome, Outcome, Property, async_property, property,
};
pub use random::Random;
pub use report::{ExecutionStatus, ExecutionTree, RunDetails, RunStatus};
pub use shrinkable::{Shrinkable, Shrinks};
