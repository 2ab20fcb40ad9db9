//! # did-power
//!
//! Monte Carlo power analysis for 2×2 mixed designs: one between-subjects
//! factor (control vs treatment) crossed with one within-subjects factor
//! (pre vs post).
//!
//! Each trial draws correlated pre/post outcomes for both arms from their
//! bivariate normal populations, fits the random-intercept model
//!
//! ```text
//! value ~ condition * time + (1 | subject)
//! ```
//!
//! by REML, and tests the `condition:time` (difference-in-difference) term.
//! Power is the share of trials with `p < alpha`.
//!
//! ## Quick Start
//!
//! ```
//! use did_power::{DesignParameters, GroupParameters, PowerAnalysis};
//!
//! let control = GroupParameters::new(40, (3.0, 3.0), (1.0, 1.0), 0.75);
//! let treatment = GroupParameters::new(38, (3.0, 3.5), (1.0, 1.0), 0.75);
//!
//! let estimate = PowerAnalysis::new(DesignParameters::new(control, treatment))
//!     .trials(100)
//!     .seed(42)
//!     .run()
//!     .unwrap();
//!
//! println!("{estimate}");
//! ```
//!
//! ## Reproducibility
//!
//! Trial `i` draws from its own Xoshiro256++ stream seeded from
//! `(seed, i)`, so a fixed seed yields identical counts whatever the
//! number of worker threads.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (setup at `debug`, excluded trials at
//! `warn`, the final estimate at `info`) and never installs a subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod params;
mod power;
mod types;

// Functional modules
pub mod analysis;
pub mod dataset;
pub mod helpers;
pub mod output;
pub mod statistics;
pub mod thread_pool;

// Re-exports for public API
pub use analysis::{FitOptions, MixedModel, MixedModelFit};
pub use config::{Config, FitFailurePolicy};
pub use dataset::{CellSummary, Dataset, Observation};
pub use error::{Error, Result};
pub use params::{DesignParameters, GroupParameters, PreparedDesign};
pub use power::{run_trial, CancellationToken, PowerAnalysis, PowerEstimate, TrialResult};
pub use statistics::{CovarianceMatrix, SamplingMode};
pub use types::{Condition, Matrix2, SampleMatrix, Time, Vector2};

/// Estimate power with default settings and an OS-drawn seed.
///
/// Shorthand for `PowerAnalysis::new(..).trials(trials).alpha(alpha).run()`.
///
/// # Errors
///
/// See [`PowerAnalysis::run`].
pub fn estimate_power(
    control: GroupParameters,
    treatment: GroupParameters,
    trials: usize,
    alpha: f64,
) -> Result<PowerEstimate> {
    PowerAnalysis::new(DesignParameters::new(control, treatment))
        .trials(trials)
        .alpha(alpha)
        .run()
}
