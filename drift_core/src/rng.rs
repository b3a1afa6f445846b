//! Sampling helpers shared by the synthesizer and the reducer.

use crate::RngType;
use rand::prelude::*;

/// Return chosen index based on `weights`.
///
/// Weight is accumulated value. For example, [10, 35, 50] means each item has
/// 10%, 25%, 15% to be chosen.
pub fn choose_weighted(rng: &mut RngType, weights: &[u64]) -> usize {
    let max = weights.last().unwrap();
    let n = rng.gen_range(0..*max);
    match weights.binary_search(&n) {
        Ok(idx) => idx + 1,
        Err(idx) => idx,
    }
}

/// Depth-based rejection of recursive constructs.
///
/// Below `cap` recursion is always allowed; every level above it survives
/// with probability `keep`, so deep nesting dies off geometrically.
#[derive(Debug, Clone, Copy)]
pub struct Recursion {
    pub cap: usize,
    pub keep: f64,
}

impl Default for Recursion {
    fn default() -> Self {
        Self { cap: 7, keep: 0.6 }
    }
}

impl Recursion {
    pub fn allow(&self, rng: &mut RngType, depth: usize) -> bool {
        if depth <= self.cap {
            return true;
        }
        let excess = (depth - self.cap) as i32;
        rng.gen_bool(self.keep.powi(excess))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn choose_weighted_in_bounds() {
        let mut rng = RngType::seed_from_u64(0);
        let weights = [10, 20, 100];
        for _ in 0..100 {
            let idx = super::choose_weighted(&mut rng, &weights);
            assert!(idx < weights.len());
        }
        let single = [100];
        assert_eq!(super::choose_weighted(&mut rng, &single), 0);
    }

    #[test]
    fn recursion_allows_below_cap() {
        let mut rng = RngType::seed_from_u64(7);
        let policy = Recursion { cap: 7, keep: 0.4 };
        for d in 0..=7 {
            assert!(policy.allow(&mut rng, d));
        }
    }

    #[test]
    fn recursion_rejects_deep() {
        let mut rng = RngType::seed_from_u64(7);
        let policy = Recursion { cap: 2, keep: 0.1 };
        let allowed = (0..1000).filter(|_| policy.allow(&mut rng, 40)).count();
        assert_eq!(allowed, 0);
    }
}
