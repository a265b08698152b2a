//! Deterministic random number generation for demo ledgers.
//!
//! RULE: Seeding code never calls a platform RNG.
//! Each concern draws from its own stream, seeded from
//! (master_seed XOR stream_index * golden ratio). Adding a stream never
//! changes the data an existing stream produces.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

pub struct LedgerRng {
    inner: Pcg64Mcg,
}

impl LedgerRng {
    /// Create a stream RNG from the master seed and a stable stream index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, stream_index: u64) -> Self {
        let derived_seed = master_seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn for_stream(master_seed: u64, stream: SeedStream) -> Self {
        Self::new(master_seed, stream as u64)
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Sample from a simplified Pareto distribution.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }

    /// Pick one element uniformly.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.next_u64_below(items.len() as u64) as usize]
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries. Only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum SeedStream {
    Accounts = 0,
    Transactions = 1,
    Statements = 2,
    Actions = 3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream_is_reproducible() {
        let mut a = LedgerRng::for_stream(12345, SeedStream::Transactions);
        let mut b = LedgerRng::for_stream(12345, SeedStream::Transactions);
        for _ in 0..100 {
            assert_eq!(a.next_u64_below(1_000_000), b.next_u64_below(1_000_000));
        }
    }

    #[test]
    fn streams_are_independent() {
        let mut a = LedgerRng::for_stream(12345, SeedStream::Accounts);
        let mut b = LedgerRng::for_stream(12345, SeedStream::Transactions);
        let left: Vec<u64> = (0..8).map(|_| a.next_u64_below(u64::MAX)).collect();
        let right: Vec<u64> = (0..8).map(|_| b.next_u64_below(u64::MAX)).collect();
        assert_ne!(left, right);
    }

    #[test]
    fn unit_floats_stay_in_range() {
        let mut rng = LedgerRng::for_stream(7, SeedStream::Statements);
        for _ in 0..1000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x), "{x} out of range");
        }
    }
}
