//! Generated values paired with their lazy shrink trees.

use std::fmt;
use std::sync::Arc;

/// Lazy sequence of shrink candidates, simplest first
pub type Shrinks<T> = Box<dyn Iterator<Item = Shrinkable<T>> + Send>;

type ShrinkFn<T> = Arc<dyn Fn() -> Shrinks<T> + Send + Sync>;

/// A generated value together with the candidates it can shrink to.
///
/// Candidates are only computed when [`shrink`](Shrinkable::shrink) is called and each
/// call restarts the sequence from its beginning. Every candidate is strictly simpler
/// than the value it came from, so walking down the tree always terminates.
pub struct Shrinkable<T> {
    value: T,
    shrinker: Option<ShrinkFn<T>>,
}

impl<T: Clone> Clone for Shrinkable<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            shrinker: self.shrinker.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Shrinkable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shrinkable")
            .field("value", &self.value)
            .field("shrinkable", &self.shrinker.is_some())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Shrinkable<T> {
    /// A value that cannot be shrunk
    pub fn new(value: T) -> Self {
        Self {
            value,
            shrinker: None,
        }
    }

    /// A value whose candidates are produced by `shrink`
    pub fn with_shrink<F>(value: T, shrink: F) -> Self
    where
        F: Fn() -> Shrinks<T> + Send + Sync + 'static,
    {
        Self {
            value,
            shrinker: Some(Arc::new(shrink)),
        }
    }

    /// Borrow the generated value
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Take the generated value
    pub fn into_value(self) -> T {
        self.value
    }

    /// Restart the sequence of shrink candidates
    pub fn shrink(&self) -> Shrinks<T> {
        match &self.shrinker {
            Some(shrinker) => shrinker(),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Same shrink tree, different root value
    pub fn with_value(&self, value: T) -> Self {
        Self {
            value,
            shrinker: self.shrinker.clone(),
        }
    }

    /// Drop every shrink candidate
    pub fn without_shrink(self) -> Self {
        Self::new(self.value)
    }

    /// Apply `mapper` to the value and, lazily, to every candidate of the tree
    pub fn map<U>(self, mapper: Arc<dyn Fn(T) -> U + Send + Sync>) -> Shrinkable<U>
    where
        U: Send + Sync + 'static,
    {
        let value = mapper(self.value);
        match self.shrinker {
            None => Shrinkable::new(value),
            Some(shrinker) => Shrinkable::with_shrink(value, move || {
                let mapper = mapper.clone();
                Box::new(shrinker().map(move |candidate| candidate.map(mapper.clone())))
            }),
        }
    }

    /// Keep only the candidates (at every depth) accepted by `predicate`
    pub fn filter(self, predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>) -> Shrinkable<T> {
        match self.shrinker {
            None => Shrinkable::new(self.value),
            Some(shrinker) => Shrinkable::with_shrink(self.value, move || {
                let predicate = predicate.clone();
                let keep = predicate.clone();
                Box::new(
                    shrinker()
                        .filter(move |candidate| keep(candidate.value()))
                        .map(move |candidate| candidate.filter(predicate.clone())),
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shrinks n toward 0 by trying 0 then n - 1
    fn countdown(n: u32) -> Shrinkable<u32> {
        Shrinkable::with_shrink(n, move || {
            let candidates: Vec<u32> = if n == 0 {
                vec![]
            } else if n == 1 {
                vec![0]
            } else {
                vec![0, n - 1]
            };
            Box::new(candidates.into_iter().map(countdown))
        })
    }

    fn values<T: Clone + Send + Sync + 'static>(shrinks: Shrinks<T>) -> Vec<T> {
        shrinks.map(|s| s.value().clone()).collect()
    }

    #[test]
    fn test_new_has_no_candidates() {
        let shrinkable = Shrinkable::new(5);
        assert_eq!(*shrinkable.value(), 5);
        assert_eq!(shrinkable.shrink().count(), 0);
    }

    #[test]
    fn test_shrink_is_restartable() {
        let shrinkable = countdown(3);
        assert_eq!(values(shrinkable.shrink()), vec![0, 2]);
        assert_eq!(values(shrinkable.shrink()), vec![0, 2]);
    }

    #[test]
    fn test_map_applies_to_whole_tree() {
        let mapped = countdown(3).map(Arc::new(|n: u32| format!("#{}", n)));
        assert_eq!(mapped.value(), "#3");
        assert_eq!(values(mapped.shrink()), vec!["#0", "#2"]);
        let second = mapped.shrink().nth(1).unwrap();
        assert_eq!(values(second.shrink()), vec!["#0", "#1"]);
    }

    #[test]
    fn test_filter_applies_to_whole_tree() {
        let filtered = countdown(4).filter(Arc::new(|n: &u32| n % 2 == 1 || *n == 4));
        assert_eq!(values(filtered.shrink()), vec![3]);
        let three = filtered.shrink().next().unwrap();
        assert!(values(three.shrink()).is_empty());
    }

    #[test]
    fn test_shrinking_terminates() {
        let mut current = countdown(50);
        let mut steps = 0;
        while let Some(next) = current.shrink().last() {
            assert!(next.value() < current.value());
            current = next;
            steps += 1;
        }
        assert_eq!(*current.value(), 0);
        assert_eq!(steps, 50);
    }

    #[test]
    fn test_with_value_keeps_tree() {
        let shrinkable = countdown(3).with_value(10);
        assert_eq!(*shrinkable.value(), 10);
        assert_eq!(values(shrinkable.shrink()), vec![0, 2]);
        assert!(shrinkable.without_shrink().shrink().next().is_none());
    }
}
