//! The `Arbitrary` trait and its composition wrappers.
//!
//! An arbitrary turns random bits into a [`Shrinkable`] value. Arbitraries are immutable
//! and shareable: combinators own handles to their sources and never mutate them.

use std::fmt;
use std::sync::Arc;

use crate::error::ArbitraryError;
use crate::random::Random;
use crate::shrinkable::Shrinkable;

/// Attempts made by [`Arbitrary::filter`] before giving up
pub const MAX_FILTER_ATTEMPTS: usize = 1000;

/// A generator of shrinkable values
///
/// `generate` must only depend on the bits it draws from `random`: the same draws give
/// the same value and the same shrink tree.
pub trait Arbitrary: Send + Sync + 'static {
    /// The type of values this arbitrary generates
    type Value: Clone + Send + Sync + 'static;

    /// Generate a value and its shrink tree
    fn generate(&self, random: &mut Random) -> Shrinkable<Self::Value>;

    /// Variant of this arbitrary hitting edge cases with probability `1 / freq`
    ///
    /// Composite arbitraries forward the bias to their sources.
    fn with_bias(&self, freq: u32) -> BoxedArbitrary<Self::Value>;

    /// Map generated values (and their shrinks) through `mapper`
    fn map<U, F>(self, mapper: F) -> Map<Self::Value, U>
    where
        Self: Sized,
        U: Clone + Send + Sync + 'static,
        F: Fn(Self::Value) -> U + Send + Sync + 'static,
    {
        Map {
            source: self.boxed(),
            mapper: Arc::new(mapper),
        }
    }

    /// Only keep values accepted by `predicate`
    fn filter<F>(self, predicate: F) -> Filter<Self::Value>
    where
        Self: Sized,
        F: Fn(&Self::Value) -> bool + Send + Sync + 'static,
    {
        Filter {
            source: self.boxed(),
            predicate: Arc::new(predicate),
        }
    }

    /// Use the generated value to select the arbitrary producing the final value
    fn chain<B, F>(self, chainer: F) -> Chain<Self::Value, B::Value>
    where
        Self: Sized,
        B: Arbitrary,
        F: Fn(Self::Value) -> B + Send + Sync + 'static,
    {
        Chain {
            source: self.boxed(),
            chainer: Arc::new(move |value| chainer(value).boxed()),
            bias: None,
        }
    }

    /// Generate pairs of values
    fn zip<B>(self, other: B) -> Zip<Self::Value, B::Value>
    where
        Self: Sized,
        B: Arbitrary,
    {
        Zip {
            left: self.boxed(),
            right: other.boxed(),
        }
    }

    /// Ignore any bias request
    fn no_bias(self) -> NoBias<Self::Value>
    where
        Self: Sized,
    {
        NoBias {
            source: self.boxed(),
        }
    }

    /// Drop every shrink candidate
    fn no_shrink(self) -> NoShrink<Self::Value>
    where
        Self: Sized,
    {
        NoShrink {
            source: self.boxed(),
        }
    }

    /// Erase the concrete type of this arbitrary
    fn boxed(self) -> BoxedArbitrary<Self::Value>
    where
        Self: Sized,
    {
        BoxedArbitrary(Arc::new(self))
    }
}

/// Cheaply cloneable, type-erased arbitrary
pub struct BoxedArbitrary<T>(Arc<dyn Arbitrary<Value = T>>);

impl<T> Clone for BoxedArbitrary<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for BoxedArbitrary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedArbitrary")
    }
}

impl<T> BoxedArbitrary<T> {
    /// Whether both handles point to the very same arbitrary
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for BoxedArbitrary<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        self.0.generate(random)
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<T> {
        self.0.with_bias(freq)
    }

    fn boxed(self) -> BoxedArbitrary<T> {
        self
    }
}

/// See [`Arbitrary::map`]
pub struct Map<T, U> {
    source: BoxedArbitrary<T>,
    mapper: Arc<dyn Fn(T) -> U + Send + Sync>,
}

impl<T, U> Arbitrary for Map<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    type Value = U;

    fn generate(&self, random: &mut Random) -> Shrinkable<U> {
        self.source.generate(random).map(self.mapper.clone())
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<U> {
        Map {
            source: self.source.with_bias(freq),
            mapper: self.mapper.clone(),
        }
        .boxed()
    }
}

/// See [`Arbitrary::filter`]
pub struct Filter<T> {
    source: BoxedArbitrary<T>,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for Filter<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        for _ in 0..MAX_FILTER_ATTEMPTS {
            let candidate = self.source.generate(random);
            if (self.predicate)(candidate.value()) {
                return candidate.filter(self.predicate.clone());
            }
        }
        ArbitraryError::FilterExhausted {
            attempts: MAX_FILTER_ATTEMPTS,
        }
        .raise()
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<T> {
        Filter {
            source: self.source.with_bias(freq),
            predicate: self.predicate.clone(),
        }
        .boxed()
    }
}

type Chainer<T, U> = Arc<dyn Fn(T) -> BoxedArbitrary<U> + Send + Sync>;

/// See [`Arbitrary::chain`]
pub struct Chain<T, U> {
    source: BoxedArbitrary<T>,
    chainer: Chainer<T, U>,
    bias: Option<u32>,
}

impl<T, U> Chain<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn chained(chainer: &Chainer<T, U>, bias: Option<u32>, value: T) -> BoxedArbitrary<U> {
        let arbitrary = chainer(value);
        match bias {
            Some(freq) => arbitrary.with_bias(freq),
            None => arbitrary,
        }
    }

    /// Shrinks the source first (re-deriving the target from `snapshot`), then the target
    fn link(
        chainer: Chainer<T, U>,
        bias: Option<u32>,
        source: Shrinkable<T>,
        target: Shrinkable<U>,
        snapshot: Random,
    ) -> Shrinkable<U> {
        Shrinkable::with_shrink(target.value().clone(), move || {
            let chainer = chainer.clone();
            let snapshot = snapshot.clone();
            let from_source = source.shrink().map(move |smaller| {
                let mut random = snapshot.clone();
                let target = Self::chained(&chainer, bias, smaller.value().clone())
                    .generate(&mut random);
                Self::link(chainer.clone(), bias, smaller, target, snapshot.clone())
            });
            Box::new(from_source.chain(target.shrink()))
        })
    }
}

impl<T, U> Arbitrary for Chain<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    type Value = U;

    fn generate(&self, random: &mut Random) -> Shrinkable<U> {
        let source = self.source.generate(random);
        let snapshot = random.clone();
        let target =
            Self::chained(&self.chainer, self.bias, source.value().clone()).generate(random);
        Self::link(self.chainer.clone(), self.bias, source, target, snapshot)
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<U> {
        Chain {
            source: self.source.with_bias(freq),
            chainer: self.chainer.clone(),
            bias: Some(freq),
        }
        .boxed()
    }
}

/// See [`Arbitrary::zip`]
pub struct Zip<T, U> {
    left: BoxedArbitrary<T>,
    right: BoxedArbitrary<U>,
}

fn zip_shrinkable<T, U>(left: Shrinkable<T>, right: Shrinkable<U>) -> Shrinkable<(T, U)>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    let value = (left.value().clone(), right.value().clone());
    Shrinkable::with_shrink(value, move || {
        let fixed_right = right.clone();
        let fixed_left = left.clone();
        let lefts = left
            .shrink()
            .map(move |l| zip_shrinkable(l, fixed_right.clone()));
        let rights = right
            .shrink()
            .map(move |r| zip_shrinkable(fixed_left.clone(), r));
        Box::new(lefts.chain(rights))
    })
}

impl<T, U> Arbitrary for Zip<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    type Value = (T, U);

    fn generate(&self, random: &mut Random) -> Shrinkable<(T, U)> {
        let left = self.left.generate(random);
        let right = self.right.generate(random);
        zip_shrinkable(left, right)
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<(T, U)> {
        Zip {
            left: self.left.with_bias(freq),
            right: self.right.with_bias(freq),
        }
        .boxed()
    }
}

/// See [`Arbitrary::no_bias`]
pub struct NoBias<T> {
    source: BoxedArbitrary<T>,
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for NoBias<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        self.source.generate(random)
    }

    fn with_bias(&self, _freq: u32) -> BoxedArbitrary<T> {
        self.source.clone()
    }
}

/// See [`Arbitrary::no_shrink`]
pub struct NoShrink<T> {
    source: BoxedArbitrary<T>,
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for NoShrink<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        self.source.generate(random).without_shrink()
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<T> {
        NoShrink {
            source: self.source.with_bias(freq),
        }
        .boxed()
    }
}

/// Draws from `biased` one time out of `freq`, from `unbiased` otherwise
pub struct Biased<T> {
    freq: u32,
    unbiased: BoxedArbitrary<T>,
    biased: BoxedArbitrary<T>,
}

impl<T: Clone + Send + Sync + 'static> Biased<T> {
    pub fn new(freq: u32, unbiased: BoxedArbitrary<T>, biased: BoxedArbitrary<T>) -> Self {
        Self {
            freq: freq.max(1),
            unbiased,
            biased,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for Biased<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        if random.next_int(1, self.freq) == 1 {
            self.biased.generate(random)
        } else {
            self.unbiased.generate(random)
        }
    }

    fn with_bias(&self, _freq: u32) -> BoxedArbitrary<T> {
        Biased {
            freq: self.freq,
            unbiased: self.unbiased.clone(),
            biased: self.biased.clone(),
        }
        .boxed()
    }
}
