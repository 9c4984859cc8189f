//! Property definition traits for synchronous and asynchronous testing.
//!
//! A property couples an arbitrary with a predicate. The runner only talks to the
//! [`Property`] and [`AsyncProperty`] traits, so decorators can wrap a property without
//! knowing what it tests.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::arbitrary::{Arbitrary, BoxedArbitrary};
use crate::error::PropertyError;
use crate::random::Random;
use crate::shrinkable::Shrinkable;

/// Result of running a predicate once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The property holds for the value
    Success,
    /// The property does not hold; carries the error message
    Failure(String),
    /// The value was rejected before judgment. With `interrupt` set the whole run stops
    PreconditionFailure { interrupt: bool },
}

impl Outcome {
    /// Plain skip signal
    pub fn skip() -> Self {
        Outcome::PreconditionFailure { interrupt: false }
    }

    /// Skip signal asking the runner to stop
    pub fn interrupt() -> Self {
        Outcome::PreconditionFailure { interrupt: true }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        PropertyError::from_panic(payload).into()
    }
}

impl From<PropertyError> for Outcome {
    fn from(error: PropertyError) -> Self {
        match error {
            PropertyError::PreconditionFailed => Outcome::skip(),
            PropertyError::PropertyFailed { message } => Outcome::Failure(message),
            other => Outcome::Failure(other.to_string()),
        }
    }
}

/// Values a predicate may return
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Outcome {
        self
    }
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> Outcome {
        if self {
            Outcome::Success
        } else {
            Outcome::Failure("Property failed by returning false".to_string())
        }
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Success
    }
}

impl<R: IntoOutcome> IntoOutcome for Result<R, PropertyError> {
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(inner) => inner.into_outcome(),
            Err(error) => error.into(),
        }
    }
}

/// Property definition trait for synchronous testing
pub trait Property<T> {
    /// Generate the value of a run. `run_id` is `None` when no bias should be applied
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T>;

    /// Run the predicate against `value`
    fn run(&self, value: &T) -> Outcome;
}

/// Property definition trait for asynchronous testing
pub trait AsyncProperty<T> {
    /// Generate the value of a run. `run_id` is `None` when no bias should be applied
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T>;

    /// Run the predicate against `value`
    fn run(&self, value: &T) -> impl Future<Output = Outcome> + Send;
}

impl<T, P: Property<T> + ?Sized> Property<T> for &P {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        (**self).generate(random, run_id)
    }

    fn run(&self, value: &T) -> Outcome {
        (**self).run(value)
    }
}

impl<T, P: AsyncProperty<T>> AsyncProperty<T> for &P {
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        (**self).generate(random, run_id)
    }

    fn run(&self, value: &T) -> impl Future<Output = Outcome> + Send {
        (**self).run(value)
    }
}

/// Bias frequency of a run: `2 + floor(log10(run_id + 1))`, none when unbiased
pub fn bias_frequency(run_id: Option<usize>) -> Option<u32> {
    run_id.map(|id| 2 + (id + 1).ilog10())
}

fn generate_with_bias<T>(
    arbitrary: &BoxedArbitrary<T>,
    random: &mut Random,
    run_id: Option<usize>,
) -> Shrinkable<T>
where
    T: Clone + Send + Sync + 'static,
{
    match bias_frequency(run_id) {
        Some(freq) => arbitrary.with_bias(freq).generate(random),
        None => arbitrary.generate(random),
    }
}

/// A synchronous predicate over the values of an arbitrary
pub struct PredicateProperty<T, F> {
    arbitrary: BoxedArbitrary<T>,
    predicate: F,
}

/// Build a synchronous property.
///
/// The predicate may return `bool`, `()`, `Result<(), PropertyError>` or
/// `Result<bool, PropertyError>`. Panics are failures carrying the panic message, and
/// [`pre`](crate::pre) rejects the value without failing.
///
/// ```rust
/// use prova::{check_with_config, integer, property, Parameters};
///
/// let prop = property(integer(0, 100).unwrap(), |n: i32| n + 1 > n);
/// let details = check_with_config(&prop, Parameters::default().with_seed(42)).unwrap();
/// assert!(!details.failed);
/// ```
pub fn property<A, F, R>(arbitrary: A, predicate: F) -> PredicateProperty<A::Value, F>
where
    A: Arbitrary,
    F: Fn(A::Value) -> R,
    R: IntoOutcome,
{
    PredicateProperty {
        arbitrary: arbitrary.boxed(),
        predicate,
    }
}

impl<T, F, R> Property<T> for PredicateProperty<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> R,
    R: IntoOutcome,
{
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        generate_with_bias(&self.arbitrary, random, run_id)
    }

    fn run(&self, value: &T) -> Outcome {
        match catch_unwind(AssertUnwindSafe(|| (self.predicate)(value.clone()))) {
            Ok(result) => result.into_outcome(),
            Err(payload) => Outcome::from_panic(payload),
        }
    }
}

/// An asynchronous predicate over the values of an arbitrary
pub struct AsyncPredicateProperty<T, F> {
    arbitrary: BoxedArbitrary<T>,
    predicate: F,
}

/// Build an asynchronous property; see [`property`] for the accepted return values
pub fn async_property<A, F, Fut>(arbitrary: A, predicate: F) -> AsyncPredicateProperty<A::Value, F>
where
    A: Arbitrary,
    F: Fn(A::Value) -> Fut,
    Fut: Future + Send,
    Fut::Output: IntoOutcome,
{
    AsyncPredicateProperty {
        arbitrary: arbitrary.boxed(),
        predicate,
    }
}

impl<T, F, Fut> AsyncProperty<T> for AsyncPredicateProperty<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Fut,
    Fut: Future + Send,
    Fut::Output: IntoOutcome,
{
    fn generate(&self, random: &mut Random, run_id: Option<usize>) -> Shrinkable<T> {
        generate_with_bias(&self.arbitrary, random, run_id)
    }

    fn run(&self, value: &T) -> impl Future<Output = Outcome> + Send {
        let started = catch_unwind(AssertUnwindSafe(|| (self.predicate)(value.clone())));
        async move {
            match started {
                Ok(future) => match CatchUnwind::new(future).await {
                    Ok(result) => result.into_outcome(),
                    Err(payload) => Outcome::from_panic(payload),
                },
                Err(payload) => Outcome::from_panic(payload),
            }
        }
    }
}

/// Turns a panic raised while polling `F` into an `Err` output
pub(crate) struct CatchUnwind<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> CatchUnwind<F> {
    pub(crate) fn new(inner: F) -> Self {
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl<F: Future> Future for CatchUnwind<F> {
    type Output = Result<F::Output, Box<dyn Any + Send>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.get_mut().inner.as_mut();
        match catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::pre;
    use crate::primitives::{constant, nat};

    #[test]
    fn test_bias_frequency() {
        assert_eq!(bias_frequency(None), None);
        assert_eq!(bias_frequency(Some(0)), Some(2));
        assert_eq!(bias_frequency(Some(8)), Some(2));
        assert_eq!(bias_frequency(Some(9)), Some(3));
        assert_eq!(bias_frequency(Some(98)), Some(3));
        assert_eq!(bias_frequency(Some(99)), Some(4));
    }

    #[test]
    fn test_predicate_return_values() {
        let holds = property(constant(1), |n: i32| n == 1);
        assert_eq!(holds.run(&1), Outcome::Success);

        let fails = property(constant(1), |n: i32| n == 2);
        assert_eq!(
            fails.run(&1),
            Outcome::Failure("Property failed by returning false".to_string())
        );

        let unit = property(constant(1), |_: i32| ());
        assert_eq!(unit.run(&1), Outcome::Success);

        let skipped = property(constant(1), |n: i32| -> Result<(), PropertyError> {
            pre(n > 5)?;
            Ok(())
        });
        assert_eq!(skipped.run(&1), Outcome::skip());

        let explicit = property(constant(1), |_: i32| -> Result<bool, PropertyError> {
            Err(PropertyError::property_failed("nope"))
        });
        assert_eq!(explicit.run(&1), Outcome::Failure("nope".to_string()));
    }

    #[test]
    fn test_panicking_predicate_is_a_failure() {
        let prop = property(constant(3), |n: i32| {
            assert!(n < 3, "n was {}", n);
        });
        assert_eq!(prop.run(&3), Outcome::Failure("n was 3".to_string()));
    }

    #[test]
    fn test_generate_without_run_id_is_unbiased() {
        let prop = property(nat(1_000_000), |_: u64| true);
        let arbitrary = nat(1_000_000);
        for seed in 0..20 {
            let generated = prop.generate(&mut Random::new(seed), None);
            let expected = arbitrary.generate(&mut Random::new(seed));
            assert_eq!(generated.value(), expected.value());
        }
    }

    #[tokio::test]
    async fn test_async_predicate() {
        let prop = async_property(constant(4), |n: i32| async move { n % 2 == 0 });
        assert_eq!(prop.run(&4).await, Outcome::Success);

        let prop = async_property(constant(4), |n: i32| async move {
            if n > 0 {
                panic!("async boom");
            }
        });
        assert_eq!(prop.run(&4).await, Outcome::Failure("async boom".to_string()));
    }
}
