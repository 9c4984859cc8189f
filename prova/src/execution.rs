//! Property execution engine for running synchronous and asynchronous property tests.
//!
//! A run walks a single stream of shrinkable values. It starts with one generated value
//! per run index; on the first failure the stream switches to the shrink candidates of
//! the failing value, and to the candidates of every further failing candidate. The
//! indices of the failing values form the path reported with the counterexample, and
//! feeding that path back through [`Parameters::with_path`] replays the descent without
//! running the predicate on the intermediate values.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, trace, warn};

use crate::config::{ConfigError, Parameters, VerbosityLevel, parse_path};
use crate::decorators::{decorate, decorate_async};
use crate::error::PropertyError;
use crate::formatter::{async_default_report_message, default_report_message};
use crate::property::{AsyncProperty, Outcome, Property};
use crate::random::{Random, RunSeeds};
use crate::report::{ExecutionStatus, ExecutionTree, RunDetails, RunStatus};
use crate::shrinkable::Shrinkable;

type Values<'a, T> = Box<dyn Iterator<Item = Shrinkable<T>> + 'a>;

/// What happened so far during a run
struct RunExecution<T> {
    verbose: VerbosityLevel,
    roots: Vec<ExecutionTree<T>>,
    /// Position of the latest failing node in `roots`; its children are the current level
    level: Vec<usize>,
    path_to_failure: Vec<usize>,
    value: Option<T>,
    failure: Option<String>,
    failures: Vec<T>,
    num_successes: usize,
    num_skips: usize,
    interrupted: bool,
}

impl<T: Clone> RunExecution<T> {
    fn new(verbose: VerbosityLevel) -> Self {
        Self {
            verbose,
            roots: Vec::new(),
            level: Vec::new(),
            path_to_failure: Vec::new(),
            value: None,
            failure: None,
            failures: Vec::new(),
            num_successes: 0,
            num_skips: 0,
            interrupted: false,
        }
    }

    fn is_failing(&self) -> bool {
        !self.path_to_failure.is_empty()
    }

    fn record(&mut self, status: ExecutionStatus, value: &T) -> Option<usize> {
        if self.verbose < VerbosityLevel::VeryVerbose {
            return None;
        }
        let mut level = &mut self.roots;
        for &index in &self.level {
            level = &mut level[index].children;
        }
        level.push(ExecutionTree::new(status, value.clone()));
        Some(level.len() - 1)
    }

    fn fail(&mut self, value: T, index: usize, failure: String) {
        if let Some(position) = self.record(ExecutionStatus::Failure, &value) {
            self.level.push(position);
        }
        if self.verbose >= VerbosityLevel::Verbose {
            self.failures.push(value.clone());
        }
        self.path_to_failure.push(index);
        self.value = Some(value);
        self.failure = Some(failure);
    }

    fn skip(&mut self, value: &T) {
        self.record(ExecutionStatus::Skipped, value);
        if !self.is_failing() {
            self.num_skips += 1;
        }
    }

    fn success(&mut self, value: &T) {
        self.record(ExecutionStatus::Success, value);
        if !self.is_failing() {
            self.num_successes += 1;
        }
    }
}

/// Drives the stream of values and feeds the outcomes back into the execution
struct Runner<'a, T> {
    values: Values<'a, T>,
    next_index: usize,
    num_runs: usize,
    remaining_attempts: usize,
    end_on_failure: bool,
    execution: RunExecution<T>,
}

impl<'a, T> Runner<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(values: Values<'a, T>, parameters: &Parameters) -> Self {
        Self {
            values,
            next_index: 0,
            num_runs: parameters.num_runs,
            remaining_attempts: parameters.num_runs.saturating_add(parameters.max_skips()),
            end_on_failure: parameters.end_on_failure,
            execution: RunExecution::new(parameters.verbose),
        }
    }

    /// Next value to run, with its index in the current stream
    fn next(&mut self) -> Result<Option<(usize, Shrinkable<T>)>, PropertyError> {
        if self.execution.interrupted {
            return Ok(None);
        }
        if !self.execution.is_failing() {
            if self.execution.num_successes >= self.num_runs || self.remaining_attempts == 0 {
                return Ok(None);
            }
            self.remaining_attempts -= 1;
        }
        let values = &mut self.values;
        let next = catch_unwind(AssertUnwindSafe(|| values.next()))
            .map_err(PropertyError::from_generation_panic)?;
        Ok(next.map(|shrinkable| {
            let index = self.next_index;
            self.next_index += 1;
            (index, shrinkable)
        }))
    }

    fn handle(
        &mut self,
        index: usize,
        shrinkable: Shrinkable<T>,
        outcome: Outcome,
    ) -> Result<(), PropertyError> {
        match outcome {
            Outcome::Success => self.execution.success(shrinkable.value()),
            Outcome::PreconditionFailure { interrupt: false } => {
                self.execution.skip(shrinkable.value())
            }
            Outcome::PreconditionFailure { interrupt: true } => {
                trace!(index, "interrupt requested");
                self.execution.interrupted = true;
            }
            Outcome::Failure(error) => {
                if self.execution.is_failing() {
                    trace!(
                        index,
                        depth = self.execution.path_to_failure.len(),
                        "shrink candidate still fails"
                    );
                } else {
                    debug!(run = index, error = %error, "first failure");
                }
                self.values = if self.end_on_failure {
                    Box::new(std::iter::empty())
                } else {
                    catch_unwind(AssertUnwindSafe(|| shrinkable.shrink()))
                        .map_err(PropertyError::from_generation_panic)?
                };
                self.next_index = 0;
                self.execution.fail(shrinkable.into_value(), index, error);
            }
        }
        Ok(())
    }

    fn into_details(self, seed: u64, base_path: &[usize], parameters: &Parameters) -> RunDetails<T> {
        let execution = self.execution;
        let mut details = RunDetails {
            status: RunStatus::Success,
            failed: false,
            interrupted: execution.interrupted,
            seed,
            num_runs: execution.num_successes,
            num_skips: execution.num_skips,
            num_shrinks: 0,
            counterexample: None,
            counterexample_path: None,
            error: None,
            failures: execution.failures,
            execution_summary: execution.roots,
            verbose: execution.verbose,
        };
        if let Some(&first) = execution.path_to_failure.first() {
            details.status = RunStatus::Failure;
            details.failed = true;
            details.num_runs = (first + 1).saturating_sub(execution.num_skips);
            details.num_shrinks = execution.path_to_failure.len() - 1;
            details.counterexample = execution.value;
            details.counterexample_path = Some(merge_paths(base_path, &execution.path_to_failure));
            details.error = execution.failure;
        } else if execution.num_skips > parameters.max_skips() {
            details.status = RunStatus::TooManySkips;
            details.failed = true;
        } else if execution.interrupted {
            details.status = RunStatus::Interrupted;
            details.failed = parameters.mark_interrupt_as_failure;
        }
        details
    }
}

/// Concatenate the replayed path and the path found by this run; the first index of
/// `path` is relative to the last replayed one
fn merge_paths(base: &[usize], path: &[usize]) -> String {
    let merged: Vec<usize> = match (base.split_last(), path.split_first()) {
        (Some((last, base)), Some((first, path))) => base
            .iter()
            .copied()
            .chain(std::iter::once(last + first))
            .chain(path.iter().copied())
            .collect(),
        _ => path.to_vec(),
    };
    merged
        .iter()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// Values a run starts from: one generated value per run index, or, when replaying a
/// path, the node it designates followed by its next siblings
fn initial_values<'a, T, G>(
    generate: G,
    seed: u64,
    path: Option<&[usize]>,
) -> Result<Values<'a, T>, PropertyError>
where
    T: Send + Sync + 'static,
    G: Fn(&mut Random, Option<usize>) -> Shrinkable<T> + 'a,
{
    let (first, walk) = match path.and_then(|path| path.split_first()) {
        Some((first, walk)) => (*first, walk),
        None => (0, &[][..]),
    };
    let mut seeds = RunSeeds::starting_at(seed, first);
    let mut runs = std::iter::from_fn(move || {
        let (index, mut random) = seeds.next_run();
        Some(generate(&mut random, Some(index)))
    });
    let Some((last, walk)) = walk.split_last() else {
        return Ok(Box::new(runs));
    };
    let invalid = || {
        let path = path.unwrap_or_default();
        let text = merge_paths(&[], path);
        PropertyError::Config(ConfigError::InvalidPath(text))
    };
    let mut node = runs.next().ok_or_else(invalid)?;
    for &index in walk {
        trace!(index, "replaying shrink step");
        node = node.shrink().nth(index).ok_or_else(invalid)?;
    }
    Ok(Box::new(node.shrink().skip(*last)))
}

struct Prepared {
    parameters: Parameters,
    seed: u64,
    path: Option<Vec<usize>>,
}

fn prepare(parameters: Parameters) -> Result<Prepared, PropertyError> {
    let parameters = parameters.merged_with_global();
    parameters.validate()?;
    let seed = parameters.seed.unwrap_or_else(rand::random);
    let path = parameters.path.as_deref().map(parse_path).transpose()?;
    debug!(
        seed,
        num_runs = parameters.num_runs,
        path = parameters.path.as_deref().unwrap_or(""),
        "starting property run"
    );
    Ok(Prepared {
        parameters,
        seed,
        path,
    })
}

fn start<'a, T, G>(prepared: &Prepared, generate: G) -> Result<Values<'a, T>, PropertyError>
where
    T: Send + Sync + 'static,
    G: Fn(&mut Random, Option<usize>) -> Shrinkable<T> + 'a,
{
    let path = prepared.path.as_deref();
    catch_unwind(AssertUnwindSafe(|| initial_values(generate, prepared.seed, path)))
        .map_err(PropertyError::from_generation_panic)?
}

fn finish<T>(runner: Runner<'_, T>, prepared: &Prepared) -> RunDetails<T>
where
    T: Clone + Send + Sync + 'static,
{
    let base_path = prepared.path.as_deref().unwrap_or_default();
    let details = runner.into_details(prepared.seed, base_path, &prepared.parameters);
    match details.status {
        RunStatus::Success => debug!(
            seed = details.seed,
            num_runs = details.num_runs,
            num_skips = details.num_skips,
            "property run succeeded"
        ),
        RunStatus::Failure => debug!(
            seed = details.seed,
            num_runs = details.num_runs,
            num_shrinks = details.num_shrinks,
            path = details.counterexample_path.as_deref().unwrap_or(""),
            "property run failed"
        ),
        RunStatus::TooManySkips => warn!(
            seed = details.seed,
            num_runs = details.num_runs,
            num_skips = details.num_skips,
            "too many pre-condition failures"
        ),
        RunStatus::Interrupted => warn!(
            seed = details.seed,
            num_runs = details.num_runs,
            "property run interrupted"
        ),
    }
    details
}

/// Execute a property with the global parameters
pub fn check<T, P>(property: P) -> Result<RunDetails<T>, PropertyError>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: Property<T>,
{
    check_with_config(property, Parameters::from_global())
}

/// Execute a property with custom parameters.
///
/// Failures of the predicate are reported in the returned [`RunDetails`]; `Err` is only
/// returned for invalid parameters and misused arbitraries.
pub fn check_with_config<T, P>(
    property: P,
    parameters: Parameters,
) -> Result<RunDetails<T>, PropertyError>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: Property<T>,
{
    let prepared = prepare(parameters)?;
    let property = decorate(property, &prepared.parameters);
    let values = start(&prepared, |random: &mut Random, run_id| {
        property.generate(random, run_id)
    })?;
    let mut runner = Runner::new(values, &prepared.parameters);
    while let Some((index, shrinkable)) = runner.next()? {
        let outcome = property.run(shrinkable.value());
        runner.handle(index, shrinkable, outcome)?;
    }
    Ok(finish(runner, &prepared))
}

/// Execute an async property with the global parameters
pub async fn check_async<T, P>(property: P) -> Result<RunDetails<T>, PropertyError>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: AsyncProperty<T>,
{
    check_async_with_config(property, Parameters::from_global()).await
}

/// Execute an async property with custom parameters; predicates are awaited one at a time
pub async fn check_async_with_config<T, P>(
    property: P,
    parameters: Parameters,
) -> Result<RunDetails<T>, PropertyError>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: AsyncProperty<T>,
{
    let prepared = prepare(parameters)?;
    let property = decorate_async(property, &prepared.parameters);
    let values = start(&prepared, |random: &mut Random, run_id| {
        property.generate(random, run_id)
    })?;
    let mut runner = Runner::new(values, &prepared.parameters);
    while let Some((index, shrinkable)) = runner.next()? {
        let outcome = property.run(shrinkable.value()).await;
        runner.handle(index, shrinkable, outcome)?;
    }
    Ok(finish(runner, &prepared))
}

/// Run a property with the global parameters and panic with a report on failure
pub fn assert_property<T, P>(property: P)
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: Property<T>,
{
    assert_property_with_config(property, Parameters::from_global())
}

/// Run a property and panic with a report on failure
pub fn assert_property_with_config<T, P>(property: P, parameters: Parameters)
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: Property<T>,
{
    let details = match check_with_config(property, parameters) {
        Ok(details) => details,
        Err(error) => panic!("{}", error),
    };
    if let Some(message) = default_report_message(&details) {
        panic!("{}", message);
    }
}

/// Run an async property with the global parameters and panic with a report on failure
pub async fn assert_async_property<T, P>(property: P)
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: AsyncProperty<T>,
{
    assert_async_property_with_config(property, Parameters::from_global()).await
}

/// Run an async property and panic with a report on failure
pub async fn assert_async_property_with_config<T, P>(property: P, parameters: Parameters)
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    P: AsyncProperty<T>,
{
    let details = match check_async_with_config(property, parameters).await {
        Ok(details) => details,
        Err(error) => panic!("{}", error),
    };
    let message =
        async_default_report_message(&details, |value| std::future::ready(format!("{:?}", value)))
            .await;
    if let Some(message) = message {
        panic!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrary::Arbitrary;
    use crate::error::{ArbitraryError, pre};
    use crate::primitives::{array, constant, integer, nat};
    use crate::property::{async_property, property};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn seeded() -> Parameters {
        Parameters::default().with_seed(42)
    }

    #[test]
    fn test_successful_run() {
        let details = check_with_config(property(nat(100), |n: u64| n <= 100), seeded()).unwrap();
        assert_eq!(details.status, RunStatus::Success);
        assert!(!details.failed);
        assert_eq!(details.num_runs, 100);
        assert_eq!(details.seed, 42);
        assert!(details.counterexample.is_none());
    }

    #[test]
    fn test_failure_is_shrunk() {
        let details =
            check_with_config(property(nat(10_000), |n: u64| n < 1000), seeded()).unwrap();
        assert_eq!(details.status, RunStatus::Failure);
        assert!(details.failed);
        assert_eq!(details.counterexample, Some(1000));
        assert!(details.num_shrinks > 0);
        let path = details.counterexample_path.unwrap();
        assert_eq!(path.split(':').count(), details.num_shrinks + 1);
        assert!(details.error.is_some());
    }

    #[test]
    fn test_array_failure_is_shrunk() {
        let prop = property(array(nat(100), 20), |values: Vec<u64>| {
            values.iter().all(|v| *v < 50)
        });
        let details = check_with_config(prop, seeded()).unwrap();
        let counterexample = details.counterexample.unwrap();
        // Leading items are dropped, trailing ones shrink to zero
        assert_eq!(counterexample[0], 50);
        assert!(counterexample[1..].iter().all(|v| *v == 0));
    }

    #[test]
    fn test_end_on_failure_skips_shrinking() {
        let details = check_with_config(
            property(nat(10_000), |n: u64| n < 10),
            seeded().end_on_failure(),
        )
        .unwrap();
        assert!(details.failed);
        assert_eq!(details.num_shrinks, 0);
        assert!(!details.counterexample_path.unwrap().contains(':'));
    }

    #[test]
    fn test_path_replays_counterexample() {
        let prop = property(nat(10_000), |n: u64| n < 1000);
        let first = check_with_config(&prop, seeded()).unwrap();
        let path = first.counterexample_path.clone().unwrap();

        let calls = AtomicUsize::new(0);
        let counting = property(nat(10_000), |n: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            n < 1000
        });
        let replayed = check_with_config(&counting, seeded().with_path(path.clone())).unwrap();
        assert_eq!(replayed.counterexample, first.counterexample);
        assert_eq!(replayed.counterexample_path, Some(path));
        // Replay starts from the counterexample: only its candidates are run
        assert!(calls.load(Ordering::SeqCst) < 100);
    }

    #[test]
    fn test_same_seed_same_report() {
        let prop = property(integer(-500i64, 500).unwrap(), |n: i64| n.abs() < 300);
        let first = check_with_config(&prop, seeded()).unwrap();
        let second = check_with_config(&prop, seeded()).unwrap();
        assert_eq!(first.counterexample, second.counterexample);
        assert_eq!(first.counterexample_path, second.counterexample_path);
        assert_eq!(first.num_runs, second.num_runs);
    }

    #[test]
    fn test_skips_are_not_runs() {
        let prop = property(nat(100), |n: u64| -> Result<(), PropertyError> {
            pre(n % 2 == 0)?;
            Ok(())
        });
        let details = check_with_config(prop, seeded()).unwrap();
        assert_eq!(details.status, RunStatus::Success);
        assert_eq!(details.num_runs, 100);
        assert!(details.num_skips > 0);
    }

    #[test]
    fn test_too_many_skips_without_tolerance() {
        let calls = AtomicUsize::new(0);
        let prop = property(nat(100), |_: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            Outcome::skip()
        });
        let details =
            check_with_config(&prop, seeded().with_num_runs(25).with_max_skips_per_run(0))
                .unwrap();
        assert_eq!(details.status, RunStatus::TooManySkips);
        assert!(details.failed);
        assert_eq!(details.num_skips, 25);
        assert_eq!(details.num_runs, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn test_too_many_skips_with_tolerance() {
        let prop = property(constant(0), |_: i32| Outcome::skip());
        let details =
            check_with_config(prop, seeded().with_num_runs(10).with_max_skips_per_run(3)).unwrap();
        assert_eq!(details.status, RunStatus::TooManySkips);
        assert_eq!(details.num_skips, 40);
    }

    #[test]
    fn test_interrupt_stops_the_run() {
        let prop = property(nat(10), |n: u64| {
            if n > 100 { Outcome::Success } else { Outcome::interrupt() }
        });
        let details = check_with_config(&prop, seeded()).unwrap();
        assert_eq!(details.status, RunStatus::Interrupted);
        assert!(details.interrupted);
        assert!(!details.failed);

        let details = check_with_config(&prop, seeded().mark_interrupt_as_failure()).unwrap();
        assert!(details.failed);
    }

    #[test]
    fn test_interrupt_after_time_limit() {
        let prop = property(nat(10), |_: u64| {
            std::thread::sleep(Duration::from_millis(2));
            true
        });
        let details = check_with_config(
            prop,
            seeded()
                .with_num_runs(10_000)
                .with_interrupt_after_time_limit(Duration::from_millis(20)),
        )
        .unwrap();
        assert_eq!(details.status, RunStatus::Interrupted);
        assert!(details.num_runs < 10_000);
    }

    #[test]
    fn test_usage_error_aborts_the_run() {
        let prop = property(constant(1).filter(|n| *n > 1), |_: i32| true);
        let error = check_with_config(prop, seeded()).unwrap_err();
        assert!(matches!(
            error,
            PropertyError::Usage(ArbitraryError::FilterExhausted { .. })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let prop = property(constant(1), |_: i32| true);
        assert!(matches!(
            check_with_config(&prop, seeded().with_num_runs(0)),
            Err(PropertyError::Config(ConfigError::InvalidNumRuns(0)))
        ));
        assert!(matches!(
            check_with_config(&prop, seeded().with_path("a:b")),
            Err(PropertyError::Config(ConfigError::InvalidPath(_)))
        ));
    }

    #[test]
    fn test_verbose_records_failures() {
        let prop = property(nat(10_000), |n: u64| n < 1000);
        let details =
            check_with_config(&prop, seeded().with_verbose(VerbosityLevel::Verbose)).unwrap();
        assert_eq!(details.failures.len(), details.num_shrinks + 1);
        assert_eq!(details.failures.last(), details.counterexample.as_ref());
        assert!(details.execution_summary.is_empty());
    }

    #[test]
    fn test_very_verbose_records_execution_tree() {
        let prop = property(nat(10_000), |n: u64| n < 1000);
        let details =
            check_with_config(&prop, seeded().with_verbose(VerbosityLevel::VeryVerbose)).unwrap();
        assert_eq!(details.execution_summary.len(), details.num_runs);
        let failing = details.execution_summary.last().unwrap();
        assert_eq!(failing.status, ExecutionStatus::Failure);
        assert!(!failing.children.is_empty());
    }

    #[test]
    fn test_merge_paths() {
        assert_eq!(merge_paths(&[], &[3, 1, 0]), "3:1:0");
        assert_eq!(merge_paths(&[3, 1], &[2, 5]), "3:3:5");
        assert_eq!(merge_paths(&[3], &[0]), "3");
    }

    #[test]
    #[should_panic(expected = "Property failed after")]
    fn test_assert_property_panics_with_report() {
        assert_property_with_config(property(nat(100), |n: u64| n < 10), seeded());
    }

    #[tokio::test]
    async fn test_async_run_is_shrunk() {
        let prop = async_property(nat(10_000), |n: u64| async move {
            tokio::task::yield_now().await;
            n < 1000
        });
        let details = check_async_with_config(prop, seeded()).await.unwrap();
        assert_eq!(details.counterexample, Some(1000));
    }

    #[tokio::test]
    async fn test_async_timeout_is_a_failure() {
        let prop = async_property(nat(10), |n: u64| async move {
            if n > 5 {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            true
        });
        let details = check_async_with_config(
            prop,
            seeded().with_timeout(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        assert!(details.failed);
        assert_eq!(details.counterexample, Some(6));
        assert_eq!(
            details.error.as_deref(),
            Some("Property timeout: exceeded limit of 20 milliseconds")
        );
    }
}
