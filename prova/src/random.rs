//! Deterministic random source handed to arbitraries.

use rand::distributions::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Seeded random source producing bounded values.
///
/// Every value drawn is a pure function of the seed and of the draws made before it,
/// so regenerating from the same seed replays the same values. Cloning snapshots the
/// current state: both copies continue with the same sequence.
#[derive(Debug, Clone)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    /// Create a random source from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Integer in `[min, max]` (both inclusive)
    pub fn next_int<T>(&mut self, min: T, max: T) -> T
    where
        T: SampleUniform + PartialOrd,
    {
        self.rng.gen_range(min..=max)
    }

    /// Fair coin flip
    pub fn next_boolean(&mut self) -> bool {
        self.rng.r#gen::<bool>()
    }

    /// Double in `[0, 1)`
    pub fn next_double(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Raw 64 random bits
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// Derives one independent [`Random`] per run index from a single seed.
///
/// Run `i` only depends on the seed, so replaying a given run does not require
/// generating the values of the runs before it.
#[derive(Debug, Clone)]
pub(crate) struct RunSeeds {
    master: StdRng,
    next_index: usize,
}

impl RunSeeds {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            master: StdRng::seed_from_u64(seed),
            next_index: 0,
        }
    }

    /// Random source of the next run, with its index
    pub(crate) fn next_run(&mut self) -> (usize, Random) {
        let index = self.next_index;
        self.next_index += 1;
        (index, Random::new(self.master.next_u64()))
    }

    /// Seeds whose next run is the one at `index`
    pub(crate) fn starting_at(seed: u64, index: usize) -> Self {
        let mut seeds = Self::new(seed);
        for _ in 0..index {
            seeds.master.next_u64();
        }
        seeds.next_index = index;
        seeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let mut first = Random::new(12345);
        let mut second = Random::new(12345);
        for _ in 0..100 {
            assert_eq!(first.next_int(-50, 50), second.next_int(-50, 50));
            assert_eq!(first.next_boolean(), second.next_boolean());
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut random = Random::new(7);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..1000 {
            let value = random.next_int(0u32, 3);
            assert!(value <= 3);
            seen_min |= value == 0;
            seen_max |= value == 3;
        }
        assert!(seen_min && seen_max);

        let double = random.next_double();
        assert!((0.0..1.0).contains(&double));
    }

    #[test]
    fn test_clone_replays_the_same_sequence() {
        let mut random = Random::new(99);
        random.next_u64();
        let mut snapshot = random.clone();
        assert_eq!(random.next_u64(), snapshot.next_u64());
        assert_eq!(random.next_int(0, 1000), snapshot.next_int(0, 1000));
    }

    #[test]
    fn test_run_seeds_are_addressable() {
        let mut seeds = RunSeeds::new(42);
        let mut sequential = Vec::new();
        for _ in 0..5 {
            let (_, mut random) = seeds.next_run();
            sequential.push(random.next_u64());
        }
        for (index, expected) in sequential.iter().enumerate() {
            let (_, mut random) = RunSeeds::starting_at(42, index).next_run();
            assert_eq!(random.next_u64(), *expected);
        }
        assert_eq!(RunSeeds::starting_at(42, 3).next_run().0, 3);
    }
}
