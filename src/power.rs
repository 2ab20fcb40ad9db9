//! Monte Carlo power estimation for the interaction effect.
//!
//! Each trial draws fresh stochastic samples for both arms, assembles the
//! long dataset, fits the mixed model, and records the `condition:time`
//! p-value. Power is the share of completed trials with `p < alpha`.
//!
//! The estimate's Monte Carlo standard error is `sqrt(power·(1-power)/S)`:
//! quadrupling the trial count halves it, at linear cost in runtime.
//!
//! # Failed fits
//!
//! A trial whose model cannot be fitted carries no information about the
//! interaction test. Counting it as non-significant would bias power
//! downward, so under [`FitFailurePolicy::Exclude`] it is dropped from the
//! denominator and reported in [`PowerEstimate::n_failed`]; a single summary
//! warning is logged when more than 5% of trials fail. Under
//! [`FitFailurePolicy::Abort`] the first failure ends the run.
//!
//! # Parallel execution
//!
//! Workers fold into private tallies that are merged once at the
//! end, so no trial touches shared state besides the cancellation flag and
//! a progress counter. Trial `i` always draws from the stream
//! [`trial_rng`]`(seed, i)`, which makes the counts a pure function of the
//! seed.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::{FitOptions, MixedModel};
use crate::config::{Config, FitFailurePolicy};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::params::{DesignParameters, PreparedDesign};
use crate::statistics::{entropy_seed, trial_rng, SamplingMode};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// z_{0.975}, for 95% intervals.
const Z_95: f64 = 1.959_963_984_540_054;

/// Failure share above which a run logs a warning.
const FAILURE_WARN_FRACTION: f64 = 0.05;

/// Outcome of one simulated study.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Two-sided p-value of the interaction term.
    pub p_value: f64,
    /// Estimated interaction (difference-in-difference).
    pub estimate: f64,
}

/// Run one trial: sample both arms, assemble, fit, extract the interaction.
///
/// Trials are independent; a failed trial can be retried with a fresh RNG.
pub fn run_trial<R: Rng + ?Sized>(
    design: &PreparedDesign,
    options: FitOptions,
    rng: &mut R,
) -> Result<TrialResult> {
    let dataset = Dataset::simulate(design, SamplingMode::Stochastic, rng)?;
    let fit = MixedModel::new(options).fit(&dataset)?;
    let interaction = fit.interaction()?;
    Ok(TrialResult {
        p_value: interaction.p_value,
        estimate: interaction.estimate,
    })
}

/// Cooperative cancellation flag, checked between trials.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// New, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Trials already running finish.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Empirical power of the interaction test.
///
/// `power` is `n_significant / n_completed`. The sampling uncertainty of that
/// ratio is summarised two ways: [`standard_error`](Self::standard_error)
/// gives the usual binomial SE, and
/// [`confidence_interval`](Self::confidence_interval) gives a Wilson score
/// interval, which stays inside `[0, 1]` and keeps its coverage when power
/// is near 0 or 1 where the Wald interval collapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerEstimate {
    /// Share of completed trials with `p < alpha`.
    pub power: f64,
    /// Significance threshold.
    pub alpha: f64,
    /// Trials requested.
    pub n_trials: usize,
    /// Trials whose fit succeeded (the power denominator).
    pub n_completed: usize,
    /// Trials excluded because the fit failed.
    pub n_failed: usize,
    /// Completed trials with `p < alpha`.
    pub n_significant: usize,
    /// Mean interaction estimate over completed trials.
    pub mean_estimate: f64,
    /// Interaction implied by the design's means.
    pub true_interaction: f64,
    /// Base seed; rerunning with it reproduces the counts.
    pub seed: u64,
    /// Wall-clock time of the run.
    pub runtime_secs: f64,
}

impl PowerEstimate {
    /// Monte Carlo standard error `sqrt(p(1-p)/n)`.
    pub fn standard_error(&self) -> f64 {
        if self.n_completed == 0 {
            return f64::NAN;
        }
        (self.power * (1.0 - self.power) / self.n_completed as f64).sqrt()
    }

    /// Wilson score 95% interval for the true power.
    pub fn confidence_interval(&self) -> (f64, f64) {
        let n = self.n_completed as f64;
        if n == 0.0 {
            return (0.0, 1.0);
        }
        let p = self.power;
        let z2 = Z_95 * Z_95;
        let denom = 1.0 + z2 / n;
        let centre = (p + z2 / (2.0 * n)) / denom;
        let half = Z_95 / denom * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();
        ((centre - half).max(0.0), (centre + half).min(1.0))
    }

    /// Share of requested trials whose fit failed.
    pub fn failure_rate(&self) -> f64 {
        self.n_failed as f64 / self.n_trials.max(1) as f64
    }
}

impl fmt::Display for PowerEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Power of the interaction effect: {:.1}%", self.power * 100.0)
    }
}

/// Builder and runner for a power simulation.
///
/// # Example
///
/// ```
/// use did_power::{DesignParameters, GroupParameters, PowerAnalysis};
///
/// let control = GroupParameters::new(40, (3.0, 3.0), (1.0, 1.0), 0.75);
/// let treatment = GroupParameters::new(38, (3.0, 3.5), (1.0, 1.0), 0.75);
///
/// let estimate = PowerAnalysis::new(DesignParameters::new(control, treatment))
///     .trials(50)
///     .seed(1)
///     .run()
///     .unwrap();
/// assert!((0.0..=1.0).contains(&estimate.power));
/// ```
#[derive(Debug, Clone)]
pub struct PowerAnalysis {
    design: DesignParameters,
    config: Config,
    cancellation: Option<CancellationToken>,
}

impl PowerAnalysis {
    /// Default configuration for the given design.
    pub fn new(design: DesignParameters) -> Self {
        Self::with_config(design, Config::default())
    }

    /// Explicit configuration.
    pub fn with_config(design: DesignParameters, config: Config) -> Self {
        Self {
            design,
            config,
            cancellation: None,
        }
    }

    /// Set the number of trials.
    pub fn trials(mut self, n: usize) -> Self {
        self.config.trials = n;
        self
    }

    /// Set the significance threshold.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Set a deterministic base seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set the fit-failure policy.
    pub fn failure_policy(mut self, policy: FitFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Set REML optimizer options.
    pub fn fit_options(mut self, options: FitOptions) -> Self {
        self.config.fit = options;
        self
    }

    /// Attach a cancellation token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Design under analysis.
    pub fn design(&self) -> &DesignParameters {
        &self.design
    }

    /// Validate, then run all trials.
    ///
    /// # Errors
    ///
    /// * `InvalidParameter` / `NonPositiveDefiniteCovariance` before any trial.
    /// * `TrialFailed` on the first fit failure under `FitFailurePolicy::Abort`.
    /// * `NoSuccessfulTrials` if every trial failed under `Exclude`.
    /// * `Cancelled` if the token was triggered.
    pub fn run(&self) -> Result<PowerEstimate> {
        let start = Instant::now();
        self.config.validate()?;
        let prepared = self.design.prepare()?;

        let seed = self.config.seed.unwrap_or_else(entropy_seed);
        tracing::debug!(
            trials = self.config.trials,
            alpha = self.config.alpha,
            seed,
            policy = ?self.config.failure_policy,
            n_control = prepared.params().control.n,
            n_treatment = prepared.params().treatment.n,
            "starting power simulation"
        );

        let runner = TrialRunner {
            design: &prepared,
            config: &self.config,
            seed,
            cancellation: self.cancellation.as_ref(),
            finished: AtomicUsize::new(0),
        };
        let tally = runner.run_all()?;

        // One summary line per run; individual exclusions are logged at debug.
        let failure_rate = tally.failed as f64 / self.config.trials as f64;
        if failure_rate > FAILURE_WARN_FRACTION {
            tracing::warn!(
                failed = tally.failed,
                trials = self.config.trials,
                "more than {:.0}% of trials failed to fit and were excluded",
                FAILURE_WARN_FRACTION * 100.0
            );
        }

        if tally.completed == 0 {
            return Err(Error::NoSuccessfulTrials {
                attempted: self.config.trials,
            });
        }

        let estimate = PowerEstimate {
            power: tally.significant as f64 / tally.completed as f64,
            alpha: self.config.alpha,
            n_trials: self.config.trials,
            n_completed: tally.completed,
            n_failed: tally.failed,
            n_significant: tally.significant,
            mean_estimate: tally.estimate_sum / tally.completed as f64,
            true_interaction: self.design.true_interaction(),
            seed,
            runtime_secs: start.elapsed().as_secs_f64(),
        };

        tracing::info!(
            power = estimate.power,
            se = estimate.standard_error(),
            completed = estimate.n_completed,
            runtime_secs = estimate.runtime_secs,
            "power simulation finished"
        );
        Ok(estimate)
    }
}

/// Per-worker partial counts, merged at the end.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    completed: usize,
    significant: usize,
    failed: usize,
    estimate_sum: f64,
}

impl Tally {
    fn merge(self, other: Self) -> Self {
        Self {
            completed: self.completed + other.completed,
            significant: self.significant + other.significant,
            failed: self.failed + other.failed,
            estimate_sum: self.estimate_sum + other.estimate_sum,
        }
    }
}

struct TrialRunner<'a> {
    design: &'a PreparedDesign,
    config: &'a Config,
    seed: u64,
    cancellation: Option<&'a CancellationToken>,
    finished: AtomicUsize,
}

impl TrialRunner<'_> {
    #[cfg(feature = "parallel")]
    fn run_all(&self) -> Result<Tally> {
        crate::thread_pool::install(|| {
            (0..self.config.trials)
                .into_par_iter()
                .try_fold(Tally::default, |acc, i| self.step(acc, i))
                .try_reduce(Tally::default, |a, b| Ok(a.merge(b)))
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn run_all(&self) -> Result<Tally> {
        (0..self.config.trials).try_fold(Tally::default(), |acc, i| self.step(acc, i))
    }

    fn step(&self, mut acc: Tally, trial: usize) -> Result<Tally> {
        if self.cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled {
                completed: self.finished.load(Ordering::Relaxed),
            });
        }

        let mut rng = trial_rng(self.seed, trial);
        match run_trial(self.design, self.config.fit, &mut rng) {
            Ok(result) => {
                tracing::trace!(trial, p_value = result.p_value, "trial finished");
                acc.completed += 1;
                acc.estimate_sum += result.estimate;
                if result.p_value < self.config.alpha {
                    acc.significant += 1;
                }
            }
            Err(e) if e.is_fit_failure() => match self.config.failure_policy {
                FitFailurePolicy::Exclude => {
                    tracing::debug!(trial, error = %e, "excluding trial after fit failure");
                    acc.failed += 1;
                }
                FitFailurePolicy::Abort => {
                    return Err(Error::TrialFailed {
                        trial,
                        source: Box::new(e),
                    });
                }
            },
            Err(e) => return Err(e),
        }
        self.finished.fetch_add(1, Ordering::Relaxed);
        Ok(acc)
    }
}
