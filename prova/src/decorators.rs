//! Cross-cutting behaviours wrapped around a property before it is run.
//!
//! [`decorate`] and [`decorate_async`] always apply the wrappers in the same order,
//! innermost first: timeout (async only), unbiased, skip after a time limit, interrupt
//! after a time limit, ignore equal values. A wrapper that is not configured passes
//! everything through untouched.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::Parameters;
use crate::error::PropertyError;
use crate::property::{AsyncProperty, Outcome, Property};
use crate::random::Random;
use crate::shrinkable::Shrinkable;

/// Fully decorated property, as run by the runner
pub type Decorated<P> = IgnoreEqualValues<SkipAfter<SkipAfter<Unbiased<P>>>>;

/// Wrap a synchronous property according to `parameters`
pub fn decorate<P>(property: P, parameters: &Parameters) -> Decorated<P> {
    let property = Unbiased {
        inner: property,
        enabled: parameters.unbiased,
    };
    let property = SkipAfter::optional(property, parameters.skip_all_after_time_limit, false);
    let property = SkipAfter::optional(property, parameters.interrupt_after_time_limit, true);
    IgnoreEqualValues {
        inner: property,
        seen: parameters.ignore_equal_values.then(|| Mutex::new(HashSet::new())),
    }
}

/// Wrap an asynchronous property according to `parameters`
pub fn decorate_async<P>(property: P, parameters: &Parameters) -> Decorated<Timeout<P>> {
    let property = Timeout {
        inner: property,
        timeout: parameters.timeout,
    };
    decorate(property, parameters)
}

/// Reports a failure when the predicate does not settle in time.
///
/// The slow predicate is dropped, not cancelled: work it spawned elsewhere keeps going.
/// The timer comes from Tokio, so timed runs must be awaited inside a Tokio runtime
/// with its time driver enabled.
pub struct Timeout<P> {
    inner: P,
    timeout: Option<Duration>,
}

impl<P> Timeout<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner,
            timeout: Some(timeout),
        }
    }
}

impl<T, P: AsyncProperty<T>> AsyncProperty<T> for Timeout<P> {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        self.inner.generate(random, run_id)
    }

    fn run(&self, value: &T) -> impl Future<Output = Outcome> + Send {
        let inner = self.inner.run(value);
        let limit = self.timeout;
        async move {
            let Some(limit) = limit else {
                return inner.await;
            };
            // The timer starts on the first poll
            match tokio::time::timeout(limit, inner).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let error = PropertyError::Timeout {
                        millis: limit.as_millis(),
                    };
                    Outcome::Failure(error.to_string())
                }
            }
        }
    }
}

/// Generates every value without bias
pub struct Unbiased<P> {
    inner: P,
    enabled: bool,
}

impl<P> Unbiased<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            enabled: true,
        }
    }

    fn run_id(&self, run_id: Option<usize>) -> Option<usize> {
        if self.enabled { None } else { run_id }
    }
}

impl<T, P: Property<T>> Property<T> for Unbiased<P> {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        self.inner.generate(random, self.run_id(run_id))
    }

    fn run(&self, value: &T) -> Outcome {
        self.inner.run(value)
    }
}

impl<T, P: AsyncProperty<T>> AsyncProperty<T> for Unbiased<P> {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        self.inner.generate(random, self.run_id(run_id))
    }

    fn run(&self, value: &T) -> impl Future<Output = Outcome> + Send {
        self.inner.run(value)
    }
}

/// Once the time limit is over, every run is rejected without executing the predicate.
///
/// With `interrupt` set the rejection also asks the runner to stop.
pub struct SkipAfter<P> {
    inner: P,
    deadline: Option<Instant>,
    interrupt: bool,
}

impl<P> SkipAfter<P> {
    /// The limit is measured from now
    pub fn new(inner: P, limit: Duration, interrupt: bool) -> Self {
        Self::optional(inner, Some(limit), interrupt)
    }

    fn optional(inner: P, limit: Option<Duration>, interrupt: bool) -> Self {
        Self {
            inner,
            deadline: limit.map(|limit| Instant::now() + limit),
            interrupt,
        }
    }

    fn expired(&self) -> Option<Outcome> {
        let deadline = self.deadline?;
        (Instant::now() >= deadline).then_some(Outcome::PreconditionFailure {
            interrupt: self.interrupt,
        })
    }
}

impl<T, P: Property<T>> Property<T> for SkipAfter<P> {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        self.inner.generate(random, run_id)
    }

    fn run(&self, value: &T) -> Outcome {
        match self.expired() {
            Some(outcome) => outcome,
            None => self.inner.run(value),
        }
    }
}

impl<T, P: AsyncProperty<T>> AsyncProperty<T> for SkipAfter<P> {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        self.inner.generate(random, run_id)
    }

    fn run(&self, value: &T) -> impl Future<Output = Outcome> + Send {
        let inner = match self.expired() {
            Some(outcome) => Err(outcome),
            None => Ok(self.inner.run(value)),
        };
        async move {
            match inner {
                Ok(inner) => inner.await,
                Err(outcome) => outcome,
            }
        }
    }
}

/// Rejects values that were already run.
///
/// Values are identified by their alternate `Debug` rendering (`{:#?}`). Types whose
/// plain rendering depends on the run itself render their structure there.
pub struct IgnoreEqualValues<P> {
    inner: P,
    seen: Option<Mutex<HashSet<String>>>,
}

impl<P> IgnoreEqualValues<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            seen: Some(Mutex::new(HashSet::new())),
        }
    }

    /// Records `value`; true when it was already recorded
    fn already_seen<T: fmt::Debug>(&self, value: &T) -> bool {
        match &self.seen {
            Some(seen) => !seen.lock().insert(format!("{:#?}", value)),
            None => false,
        }
    }
}

impl<T: fmt::Debug, P: Property<T>> Property<T> for IgnoreEqualValues<P> {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        self.inner.generate(random, run_id)
    }

    fn run(&self, value: &T) -> Outcome {
        if self.already_seen(value) {
            return Outcome::skip();
        }
        self.inner.run(value)
    }
}

impl<T: fmt::Debug, P: AsyncProperty<T>> AsyncProperty<T> for IgnoreEqualValues<P> {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        self.inner.generate(random, run_id)
    }

    fn run(&self, value: &T) -> impl Future<Output = Outcome> + Send {
        let inner = (!self.already_seen(value)).then(|| self.inner.run(value));
        async move {
            match inner {
                Some(inner) => inner.await,
                None => Outcome::skip(),
            }
        }
    }
}
