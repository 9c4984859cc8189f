//! Leaf arbitraries: constants, integers, booleans and arrays.

use std::fmt;
use std::sync::Arc;

use num_traits::{NumCast, PrimInt};
use rand::distributions::uniform::SampleUniform;

use crate::arbitrary::{Arbitrary, Biased, BoxedArbitrary};
use crate::error::ArbitraryError;
use crate::random::Random;
use crate::shrinkable::Shrinkable;

/// Always generates the same value, never shrinks
#[derive(Debug, Clone)]
pub struct Constant<T> {
    value: T,
}

/// Arbitrary always producing `value`
pub fn constant<T: Clone + Send + Sync + 'static>(value: T) -> Constant<T> {
    Constant { value }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for Constant<T> {
    type Value = T;

    fn generate(&self, _random: &mut Random) -> Shrinkable<T> {
        Shrinkable::new(self.value.clone())
    }

    fn with_bias(&self, _freq: u32) -> BoxedArbitrary<T> {
        self.clone().boxed()
    }
}

/// Primitive integer types supported by [`integer`].
///
/// Arithmetic is carried out on `i128`; `u128` values above `i128::MAX` are generated
/// but not shrunk.
pub trait Integer: PrimInt + SampleUniform + fmt::Debug + Send + Sync + 'static {}

impl<T: PrimInt + SampleUniform + fmt::Debug + Send + Sync + 'static> Integer for T {}

/// Integers in `[min, max]`, shrinking toward the in-range value closest to zero
#[derive(Debug, Clone, Copy)]
pub struct IntegerArbitrary<T> {
    min: T,
    max: T,
}

/// Integers in `[min, max]`
///
/// Fails with [`ArbitraryError::InvalidRange`] when `min > max`.
pub fn integer<T: Integer>(min: T, max: T) -> Result<IntegerArbitrary<T>, ArbitraryError> {
    IntegerArbitrary::new(min, max)
}

/// Natural numbers in `[0, max]`
pub fn nat(max: u64) -> IntegerArbitrary<u64> {
    IntegerArbitrary { min: 0, max }
}

impl<T: Integer> IntegerArbitrary<T> {
    pub fn new(min: T, max: T) -> Result<Self, ArbitraryError> {
        if min > max {
            return Err(ArbitraryError::InvalidRange {
                min: format!("{:?}", min),
                max: format!("{:?}", max),
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    /// In-range value closest to zero
    pub fn target(&self) -> T {
        if self.min > T::zero() {
            self.min
        } else if self.max < T::zero() {
            self.max
        } else {
            T::zero()
        }
    }

    /// Shrink tree of `value`.
    ///
    /// Once a value has been shrunk (`shrunk_once`), the target is not offered again:
    /// it was already tried one level above.
    pub fn shrinkable_for(&self, value: T, shrunk_once: bool) -> Shrinkable<T> {
        let arbitrary = *self;
        Shrinkable::with_shrink(value, move || {
            Box::new(
                shrink_integer(value, arbitrary.target(), !shrunk_once)
                    .into_iter()
                    .map(move |candidate| arbitrary.shrinkable_for(candidate, true)),
            )
        })
    }
}

/// Candidates moving `current` toward `target`: `target` first (when `try_target`), then
/// `current` minus halves of the remaining gap, the closest candidate last
fn shrink_integer<T: Integer>(current: T, target: T, try_target: bool) -> Vec<T> {
    let (Some(current), Some(target)) = (current.to_i128(), target.to_i128()) else {
        return Vec::new();
    };
    let Some(gap) = current.checked_sub(target) else {
        return Vec::new();
    };
    let mut candidates = Vec::new();
    let mut to_remove = if try_target { gap } else { gap / 2 };
    while to_remove != 0 {
        if let Some(candidate) = <T as NumCast>::from(current - to_remove) {
            candidates.push(candidate);
        }
        to_remove /= 2;
    }
    candidates
}

fn log_like(value: i128) -> i128 {
    if value > 0 { value.ilog2() as i128 } else { 0 }
}

/// Small ranges close to the interesting values of `[min, max]`, most likely first
fn bias_ranges(min: i128, max: i128) -> Vec<(i128, i128)> {
    if min == max {
        return vec![(min, max)];
    }
    if min < 0 && max > 0 {
        let log_min = log_like(min.saturating_neg());
        let log_max = log_like(max);
        return vec![
            (-log_min, log_max),
            (max - log_max, max),
            (min, min + log_min),
        ];
    }
    let log_gap = log_like(max.saturating_sub(min));
    let close_to_min = (min, min + log_gap);
    let close_to_max = (max - log_gap, max);
    if min < 0 {
        vec![close_to_max, close_to_min]
    } else {
        vec![close_to_min, close_to_max]
    }
}

impl<T: Integer> Arbitrary for IntegerArbitrary<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        let value = random.next_int(self.min, self.max);
        self.shrinkable_for(value, false)
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<T> {
        let (Some(min), Some(max)) = (self.min.to_i128(), self.max.to_i128()) else {
            return self.boxed_clone();
        };
        let ranges = bias_ranges(min, max)
            .into_iter()
            .filter_map(|(low, high)| {
                Some((<T as NumCast>::from(low)?, <T as NumCast>::from(high)?))
            })
            .collect::<Vec<_>>();
        if ranges.is_empty() {
            return self.boxed_clone();
        }
        let edges = IntegerEdges {
            parent: *self,
            ranges: Arc::new(ranges),
        };
        Biased::new(freq, self.boxed_clone(), edges.boxed()).boxed()
    }
}

impl<T: Integer> IntegerArbitrary<T> {
    fn boxed_clone(&self) -> BoxedArbitrary<T> {
        (*self).boxed()
    }
}

/// Integers drawn from the bias ranges of a parent, shrinking like the parent
struct IntegerEdges<T> {
    parent: IntegerArbitrary<T>,
    ranges: Arc<Vec<(T, T)>>,
}

impl<T: Integer> Arbitrary for IntegerEdges<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        let count = self.ranges.len() as i64;
        let (low, high) = if count == 1 {
            self.ranges[0]
        } else {
            // The first range is drawn twice as often as the others together
            let id = random.next_int(-2 * (count - 1), count - 2);
            if id < 0 {
                self.ranges[0]
            } else {
                self.ranges[(id + 1) as usize]
            }
        };
        let value = random.next_int(low, high);
        self.parent.shrinkable_for(value, false)
    }

    fn with_bias(&self, _freq: u32) -> BoxedArbitrary<T> {
        IntegerEdges {
            parent: self.parent,
            ranges: self.ranges.clone(),
        }
        .boxed()
    }
}

/// Booleans, shrinking `true` to `false`
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanArbitrary;

pub fn boolean() -> BooleanArbitrary {
    BooleanArbitrary
}

impl Arbitrary for BooleanArbitrary {
    type Value = bool;

    fn generate(&self, random: &mut Random) -> Shrinkable<bool> {
        let value = random.next_boolean();
        Shrinkable::with_shrink(value, move || {
            if value {
                Box::new(std::iter::once(Shrinkable::new(false)))
            } else {
                Box::new(std::iter::empty())
            }
        })
    }

    fn with_bias(&self, _freq: u32) -> BoxedArbitrary<bool> {
        BooleanArbitrary.boxed()
    }
}

/// Vectors of up to `max_length` items
pub struct ArrayArbitrary<T> {
    item: BoxedArbitrary<T>,
    length: IntegerArbitrary<usize>,
}

/// Vectors of items generated by `item`, with at most `max_length` items
pub fn array<A: Arbitrary>(item: A, max_length: usize) -> ArrayArbitrary<A::Value> {
    ArrayArbitrary {
        item: item.boxed(),
        length: IntegerArbitrary {
            min: 0,
            max: max_length,
        },
    }
}

impl<T: Clone + Send + Sync + 'static> ArrayArbitrary<T> {
    /// Shrinks the length first (dropping items from the front), then each item in turn
    fn shrinkable_for(
        items: Arc<Vec<Shrinkable<T>>>,
        length: IntegerArbitrary<usize>,
        shrunk_once: bool,
    ) -> Shrinkable<Vec<T>> {
        let value = items.iter().map(|item| item.value().clone()).collect();
        Shrinkable::with_shrink(value, move || {
            if items.is_empty() {
                return Box::new(std::iter::empty());
            }
            let total = items.len();
            let tails = {
                let items = items.clone();
                length
                    .shrinkable_for(total, shrunk_once)
                    .shrink()
                    .map(move |kept| {
                        let tail = items[total - *kept.value()..].to_vec();
                        Self::shrinkable_for(Arc::new(tail), length, true)
                    })
            };
            let items = items.clone();
            let per_item = (0..total).flat_map(move |index| {
                let items = items.clone();
                items[index].shrink().map(move |smaller| {
                    let mut next = items.as_ref().clone();
                    next[index] = smaller;
                    Self::shrinkable_for(Arc::new(next), length, true)
                })
            });
            Box::new(tails.chain(per_item))
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for ArrayArbitrary<T> {
    type Value = Vec<T>;

    fn generate(&self, random: &mut Random) -> Shrinkable<Vec<T>> {
        let size = random.next_int(self.length.min, self.length.max);
        let items = (0..size).map(|_| self.item.generate(random)).collect();
        Self::shrinkable_for(Arc::new(items), self.length, false)
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<Vec<T>> {
        ArrayArbitrary {
            item: self.item.with_bias(freq),
            length: self.length,
        }
        .boxed()
    }
}
