//! Run parameters, their validation, and global defaults.

use std::cell::RefCell;
use std::time::Duration;

use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid number of runs (must be > 0)
    #[error("Invalid number of runs: {0} (must be > 0)")]
    InvalidNumRuns(usize),
    /// Invalid timeout (must be > 0)
    #[error("Invalid timeout (must be > 0)")]
    InvalidTimeout,
    /// Invalid time limit (must be > 0)
    #[error("Invalid time limit for {0} (must be > 0)")]
    InvalidTimeLimit(&'static str),
    /// Replay path is not a `:`-separated list of indices
    #[error("Invalid replay path {0:?} (expected indices separated by ':')")]
    InvalidPath(String),
}

/// How much detail a failure report carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VerbosityLevel {
    /// Counterexample only
    #[default]
    None,
    /// Also list every failing value met during shrinking
    Verbose,
    /// Also render the full execution tree
    VeryVerbose,
}

/// Parameters of a single property run
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Seed of the run; a random seed is drawn (and reported) when absent
    pub seed: Option<u64>,
    /// Number of successful trials required
    pub num_runs: usize,
    /// Tolerated skips per requested run
    pub max_skips_per_run: usize,
    /// Time budget of a single asynchronous predicate execution
    pub timeout: Option<Duration>,
    /// Generate without bias toward edge values
    pub unbiased: bool,
    /// Skip every trial once this much time has elapsed
    pub skip_all_after_time_limit: Option<Duration>,
    /// Stop the run altogether once this much time has elapsed
    pub interrupt_after_time_limit: Option<Duration>,
    /// Do not re-run the predicate on values already seen
    pub ignore_equal_values: bool,
    /// Report verbosity
    pub verbose: VerbosityLevel,
    /// Replay a previous failure: `run:shrink:shrink...`
    pub path: Option<String>,
    /// Report the first failure without shrinking it
    pub end_on_failure: bool,
    /// Treat an interrupted run as failed even when no failure was found
    pub mark_interrupt_as_failure: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            seed: None,
            num_runs: 100,
            max_skips_per_run: 100,
            timeout: None,
            unbiased: false,
            skip_all_after_time_limit: None,
            interrupt_after_time_limit: None,
            ignore_equal_values: false,
            verbose: VerbosityLevel::None,
            path: None,
            end_on_failure: false,
            mark_interrupt_as_failure: false,
        }
    }
}

impl Parameters {
    /// Start from the current global defaults
    pub fn from_global() -> Self {
        read_global()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_num_runs(mut self, num_runs: usize) -> Self {
        self.num_runs = num_runs;
        self
    }

    pub fn with_max_skips_per_run(mut self, max_skips_per_run: usize) -> Self {
        self.max_skips_per_run = max_skips_per_run;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn unbiased(mut self) -> Self {
        self.unbiased = true;
        self
    }

    pub fn with_skip_all_after_time_limit(mut self, limit: Duration) -> Self {
        self.skip_all_after_time_limit = Some(limit);
        self
    }

    pub fn with_interrupt_after_time_limit(mut self, limit: Duration) -> Self {
        self.interrupt_after_time_limit = Some(limit);
        self
    }

    pub fn ignore_equal_values(mut self) -> Self {
        self.ignore_equal_values = true;
        self
    }

    pub fn with_verbose(mut self, verbose: VerbosityLevel) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn end_on_failure(mut self) -> Self {
        self.end_on_failure = true;
        self
    }

    pub fn mark_interrupt_as_failure(mut self) -> Self {
        self.mark_interrupt_as_failure = true;
        self
    }

    /// Total number of skips tolerated before the run aborts
    pub fn max_skips(&self) -> usize {
        self.max_skips_per_run.saturating_mul(self.num_runs)
    }

    /// Validate the parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_runs == 0 {
            return Err(ConfigError::InvalidNumRuns(self.num_runs));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.skip_all_after_time_limit.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeLimit("skip_all_after_time_limit"));
        }
        if self.interrupt_after_time_limit.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeLimit("interrupt_after_time_limit"));
        }
        if let Some(path) = &self.path {
            parse_path(path)?;
        }
        Ok(())
    }

    /// Fill unset optional fields from the global defaults, this config taking precedence
    pub fn merged_with_global(self) -> Self {
        let global = read_global();
        Self {
            seed: self.seed.or(global.seed),
            timeout: self.timeout.or(global.timeout),
            skip_all_after_time_limit: self
                .skip_all_after_time_limit
                .or(global.skip_all_after_time_limit),
            interrupt_after_time_limit: self
                .interrupt_after_time_limit
                .or(global.interrupt_after_time_limit),
            unbiased: self.unbiased || global.unbiased,
            ignore_equal_values: self.ignore_equal_values || global.ignore_equal_values,
            end_on_failure: self.end_on_failure || global.end_on_failure,
            mark_interrupt_as_failure: self.mark_interrupt_as_failure
                || global.mark_interrupt_as_failure,
            verbose: self.verbose.max(global.verbose),
            ..self
        }
    }
}

/// Split a replay path into its run index and successive shrink indices
pub fn parse_path(path: &str) -> Result<Vec<usize>, ConfigError> {
    path.split(':')
        .map(|segment| {
            segment
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidPath(path.to_string()))
        })
        .collect()
}

// Thread-local global parameters (doc comment not allowed on thread_local!)
thread_local! {
    static GLOBAL_PARAMETERS: RefCell<Parameters> = RefCell::new(Parameters::default());
}

/// Replace the global default parameters for the current thread
pub fn configure_global(parameters: Parameters) -> Result<(), ConfigError> {
    parameters.validate()?;
    GLOBAL_PARAMETERS.with(|global| *global.borrow_mut() = parameters);
    Ok(())
}

/// Current global default parameters
pub fn read_global() -> Parameters {
    GLOBAL_PARAMETERS.with(|global| global.borrow().clone())
}

/// Restore the built-in defaults
pub fn reset_global() {
    GLOBAL_PARAMETERS.with(|global| *global.borrow_mut() = Parameters::default());
}
