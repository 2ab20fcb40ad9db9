//! Statistical building blocks for the simulation.
//!
//! - Covariance construction and online moment accumulation
//! - Multivariate normal group sampling (stochastic and empirical)
//! - Per-trial RNG stream derivation
//! - Student-t reference distribution

mod covariance;
mod distribution;
mod sampler;
mod seeding;

pub use covariance::{sample_moments, CovarianceMatrix, WelfordCovariance2};
pub use distribution::two_sided_t_pvalue;
pub use sampler::{draw_group, rows, SamplingMode};
pub use seeding::{counter_rng_seed, entropy_seed, trial_rng};
