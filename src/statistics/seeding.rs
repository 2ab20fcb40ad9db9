//! Per-trial RNG stream derivation.
//!
//! Every Monte Carlo trial owns its own generator, seeded from the run's base
//! seed and the trial index. Results therefore do not depend on how trials
//! are scheduled across worker threads.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Counter-based RNG seed generation using SplitMix64.
///
/// This is a stateless PRF that generates deterministic, well-distributed
/// seeds from a base seed and counter. Using this instead of simple addition
/// avoids sequential correlation between neighbouring trials.
///
/// # Arguments
///
/// * `base_seed` - Base random seed
/// * `counter` - Trial counter (0, 1, 2, ...)
#[inline]
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    // SplitMix64: https://xoshiro.di.unimi.it/splitmix64.c
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Generator for trial `trial` of a run seeded with `base_seed`.
pub fn trial_rng(base_seed: u64, trial: usize) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(base_seed, trial as u64))
}

/// Draw a fresh base seed from the thread-local OS-seeded generator.
pub fn entropy_seed() -> u64 {
    rand::random()
}
