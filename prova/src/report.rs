//! Structured outcome of a property run.

use crate::config::VerbosityLevel;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every requested run passed
    Success,
    /// A counterexample was found
    Failure,
    /// More values were rejected than the skip budget allows
    TooManySkips,
    /// The run was stopped before reaching its number of runs
    Interrupted,
}

/// Status of a single execution of the predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure,
    Skipped,
}

/// One execution of the predicate. Shrink attempts of a failing value are its children
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTree<T> {
    pub status: ExecutionStatus,
    pub value: T,
    pub children: Vec<ExecutionTree<T>>,
}

impl<T> ExecutionTree<T> {
    pub fn new(status: ExecutionStatus, value: T) -> Self {
        Self {
            status,
            value,
            children: Vec::new(),
        }
    }
}

/// Report of a property run
#[derive(Debug, Clone)]
pub struct RunDetails<T> {
    pub status: RunStatus,
    /// Whether the run should be reported as a failure
    pub failed: bool,
    /// Whether the run stopped early because of an interrupt signal
    pub interrupted: bool,
    /// Seed to pass back to reproduce the run
    pub seed: u64,
    /// Executed runs that were not skipped, the failing one included
    pub num_runs: usize,
    /// Rejected values before the first failure
    pub num_skips: usize,
    /// Successful shrink steps
    pub num_shrinks: usize,
    /// Smallest failing value found
    pub counterexample: Option<T>,
    /// Path to pass back to replay the counterexample: `run:shrink:shrink...`
    pub counterexample_path: Option<String>,
    /// Error raised by the counterexample
    pub error: Option<String>,
    /// Every failing value met, from the first one to the counterexample (verbose only)
    pub failures: Vec<T>,
    /// Every execution of the predicate (very verbose only)
    pub execution_summary: Vec<ExecutionTree<T>>,
    pub verbose: VerbosityLevel,
}

impl<T> RunDetails<T> {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
