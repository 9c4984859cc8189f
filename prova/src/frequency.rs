//! Weighted choice between arbitraries.

use std::sync::Arc;

use crate::arbitrary::{Arbitrary, BoxedArbitrary};
use crate::error::ArbitraryError;
use crate::random::Random;
use crate::shrinkable::Shrinkable;

/// An arbitrary and its relative weight inside a [`frequency`]
#[derive(Debug, Clone)]
pub struct WeightedArbitrary<T> {
    /// Relative weight, the higher the more likely
    pub weight: u32,
    pub arbitrary: BoxedArbitrary<T>,
}

/// Pair `arbitrary` with `weight`
pub fn weighted<A: Arbitrary>(weight: u32, arbitrary: A) -> WeightedArbitrary<A::Value> {
    WeightedArbitrary {
        weight,
        arbitrary: arbitrary.boxed(),
    }
}

/// Picks one of its alternatives with probability `weight / total weight`
#[derive(Debug, Clone)]
pub struct FrequencyArbitrary<T> {
    alternatives: Arc<Vec<WeightedArbitrary<T>>>,
    /// Prefix sums of the weights
    summed: Arc<Vec<u64>>,
    total: u64,
}

/// Weighted choice between `alternatives`.
///
/// Fails when there is no alternative or when every weight is zero. Alternatives
/// with a zero weight are never selected.
pub fn frequency<T>(
    alternatives: Vec<WeightedArbitrary<T>>,
) -> Result<FrequencyArbitrary<T>, ArbitraryError>
where
    T: Clone + Send + Sync + 'static,
{
    FrequencyArbitrary::new(alternatives)
}

/// Uniform choice between `alternatives`
pub fn one_of<T>(alternatives: Vec<BoxedArbitrary<T>>) -> Result<FrequencyArbitrary<T>, ArbitraryError>
where
    T: Clone + Send + Sync + 'static,
{
    frequency(
        alternatives
            .into_iter()
            .map(|arbitrary| WeightedArbitrary {
                weight: 1,
                arbitrary,
            })
            .collect(),
    )
}

impl<T: Clone + Send + Sync + 'static> FrequencyArbitrary<T> {
    pub fn new(alternatives: Vec<WeightedArbitrary<T>>) -> Result<Self, ArbitraryError> {
        if alternatives.is_empty() {
            return Err(ArbitraryError::EmptyFrequency);
        }
        let summed: Vec<u64> = alternatives
            .iter()
            .scan(0u64, |sum, alternative| {
                *sum += u64::from(alternative.weight);
                Some(*sum)
            })
            .collect();
        let total = summed.last().copied().unwrap_or(0);
        if total == 0 {
            return Err(ArbitraryError::ZeroTotalWeight);
        }
        Ok(Self {
            alternatives: Arc::new(alternatives),
            summed: Arc::new(summed),
            total,
        })
    }

    /// Sum of all the weights
    pub fn total_weight(&self) -> u64 {
        self.total
    }

    /// Index of the first alternative whose cumulative weight exceeds `selected`
    fn select(&self, selected: u64) -> Option<usize> {
        self.summed.iter().position(|&sum| selected < sum)
    }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for FrequencyArbitrary<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        let selected = random.next_int(0, self.total - 1);
        match self.select(selected) {
            Some(index) => self.alternatives[index].arbitrary.generate(random),
            None => ArbitraryError::NoMatchingWeight {
                selected,
                total: self.total,
            }
            .raise(),
        }
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<T> {
        let alternatives = self
            .alternatives
            .iter()
            .map(|alternative| WeightedArbitrary {
                weight: alternative.weight,
                arbitrary: alternative.arbitrary.with_bias(freq),
            })
            .collect();
        FrequencyArbitrary {
            alternatives: Arc::new(alternatives),
            summed: self.summed.clone(),
            total: self.total,
        }
        .boxed()
    }
}
