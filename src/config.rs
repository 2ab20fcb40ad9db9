//! Configuration for power simulation.

use std::env;

use serde::{Deserialize, Serialize};

use crate::analysis::FitOptions;
use crate::error::{Error, Result};

/// What to do with a trial whose model fit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitFailurePolicy {
    /// Drop failed trials from the power denominator and report their count.
    #[default]
    Exclude,
    /// Stop the whole run at the first failed trial.
    Abort,
}

/// Configuration options for [`PowerAnalysis`](crate::PowerAnalysis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Monte Carlo trials (default: 1,000).
    pub trials: usize,

    /// Significance threshold for the interaction test (default: 0.05).
    pub alpha: f64,

    /// Optional deterministic base seed. `None` draws one from the OS.
    pub seed: Option<u64>,

    /// Handling of trials whose fit fails (default: `Exclude`).
    pub failure_policy: FitFailurePolicy,

    /// REML optimizer settings.
    pub fit: FitOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trials: 1_000,
            alpha: 0.05,
            seed: None,
            failure_policy: FitFailurePolicy::Exclude,
            fit: FitOptions::default(),
        }
    }
}

impl Config {
    /// Fast preset for smoke runs (200 trials).
    pub fn quick() -> Self {
        Self {
            trials: 200,
            ..Self::default()
        }
    }

    /// Tight preset for reporting (5,000 trials).
    pub fn thorough() -> Self {
        Self {
            trials: 5_000,
            ..Self::default()
        }
    }

    /// Overlay settings from `DID_POWER_*` environment variables.
    ///
    /// Recognized: `DID_POWER_TRIALS`, `DID_POWER_ALPHA`, `DID_POWER_SEED`,
    /// `DID_POWER_FAILURE_POLICY` (`exclude` | `abort`). Unparseable values
    /// are ignored.
    pub fn from_env(mut self) -> Self {
        if let Some(trials) = parse_env("DID_POWER_TRIALS") {
            self.trials = trials;
        }
        if let Some(alpha) = parse_env("DID_POWER_ALPHA") {
            self.alpha = alpha;
        }
        if let Some(seed) = parse_env("DID_POWER_SEED") {
            self.seed = Some(seed);
        }
        if let Some(policy) = parse_policy_env("DID_POWER_FAILURE_POLICY") {
            self.failure_policy = policy;
        }
        self
    }

    /// Check ranges before any trial runs.
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(Error::invalid("trials", self.trials, "must be at least 1"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::invalid("alpha", self.alpha, "must lie in (0, 1)"));
        }
        if !(self.fit.tolerance > 0.0) {
            return Err(Error::invalid("fit.tolerance", self.fit.tolerance, "must be > 0"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}

fn parse_policy_env(key: &str) -> Option<FitFailurePolicy> {
    match env::var(key).ok()?.to_ascii_lowercase().as_str() {
        "exclude" => Some(FitFailurePolicy::Exclude),
        "abort" => Some(FitFailurePolicy::Abort),
        _ => None,
    }
}
