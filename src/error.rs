//! Error types for power analysis.

use crate::types::Condition;

/// Errors raised while validating parameters, sampling, or fitting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A caller-supplied value is malformed or out of range.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        /// Field name, qualified by group where applicable (e.g. `control.sd_pre`).
        name: String,
        /// Offending value, rendered for display.
        value: String,
        /// What the value must satisfy.
        reason: String,
    },

    /// The derived covariance matrix cannot be used for sampling.
    #[error("covariance matrix for {group} group is not positive definite (determinant {determinant:.3e})")]
    NonPositiveDefiniteCovariance {
        /// Group whose matrix failed the check.
        group: Condition,
        /// Determinant of the offending matrix.
        determinant: f64,
    },

    /// The mixed model could not be fitted to a dataset.
    #[error("model fit failed: {reason}")]
    FitFailure {
        /// Why the fit failed.
        reason: String,
    },

    /// A trial failed under [`FitFailurePolicy::Abort`](crate::FitFailurePolicy::Abort).
    #[error("trial {trial} failed: {source}")]
    TrialFailed {
        /// Zero-based trial index.
        trial: usize,
        /// Underlying fit failure.
        #[source]
        source: Box<Error>,
    },

    /// Every trial failed, so no estimate exists.
    #[error("all {attempted} trials failed to fit; no power estimate available")]
    NoSuccessfulTrials {
        /// Number of trials run.
        attempted: usize,
    },

    /// The run was cancelled between trials.
    #[error("power run cancelled after {completed} trials")]
    Cancelled {
        /// Trials finished before cancellation was observed.
        completed: usize,
    },
}

impl Error {
    pub(crate) fn invalid(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fit(reason: impl Into<String>) -> Self {
        Error::FitFailure {
            reason: reason.into(),
        }
    }

    /// True for errors that belong to a single trial rather than the run setup.
    pub fn is_fit_failure(&self) -> bool {
        matches!(self, Error::FitFailure { .. } | Error::TrialFailed { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
