//! Per-group simulation parameters.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::statistics::CovarianceMatrix;
use crate::types::{Condition, Vector2};

/// Population parameters for one group's (pre, post) outcome pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupParameters {
    /// Population mean at pre.
    pub mean_pre: f64,
    /// Population mean at post.
    pub mean_post: f64,
    /// Standard deviation at pre (must be > 0).
    pub sd_pre: f64,
    /// Standard deviation at post (must be > 0).
    pub sd_post: f64,
    /// Within-subject pre/post correlation, in [-1, 1].
    pub correlation: f64,
    /// Number of subjects (at least 2).
    pub n: usize,
}

impl GroupParameters {
    /// Minimum group size for covariance estimation and model fitting.
    pub const MIN_N: usize = 2;

    /// Create parameters for a group of `n` subjects.
    pub fn new(
        n: usize,
        (mean_pre, mean_post): (f64, f64),
        (sd_pre, sd_post): (f64, f64),
        correlation: f64,
    ) -> Self {
        Self {
            mean_pre,
            mean_post,
            sd_pre,
            sd_post,
            correlation,
            n,
        }
    }

    /// Mean vector `[pre, post]`.
    pub fn mean(&self) -> Vector2 {
        Vector2::new(self.mean_pre, self.mean_post)
    }

    /// Check ranges, naming the offending field with `group` as prefix.
    pub fn validate(&self, group: Condition) -> Result<()> {
        let field = |name: &str| format!("{group}.{name}");

        for (name, value) in [("mean_pre", self.mean_pre), ("mean_post", self.mean_post)] {
            if !value.is_finite() {
                return Err(Error::invalid(field(name), value, "must be finite"));
            }
        }
        for (name, value) in [("sd_pre", self.sd_pre), ("sd_post", self.sd_post)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::invalid(field(name), value, "must be finite and > 0"));
            }
        }
        if !self.correlation.is_finite() || self.correlation.abs() > 1.0 {
            return Err(Error::invalid(
                field("correlation"),
                self.correlation,
                "must lie in [-1, 1]",
            ));
        }
        if self.n < Self::MIN_N {
            return Err(Error::invalid(
                field("n"),
                self.n,
                format!("must be at least {}", Self::MIN_N),
            ));
        }
        Ok(())
    }
}

/// Parameters for both arms of the 2x2 design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignParameters {
    /// Control group.
    pub control: GroupParameters,
    /// Treatment group.
    pub treatment: GroupParameters,
}

impl DesignParameters {
    /// Pair control and treatment parameters.
    pub fn new(control: GroupParameters, treatment: GroupParameters) -> Self {
        Self { control, treatment }
    }

    /// Parameters for one arm.
    pub fn group(&self, condition: Condition) -> &GroupParameters {
        match condition {
            Condition::Control => &self.control,
            Condition::Treatment => &self.treatment,
        }
    }

    /// Total number of subjects across both arms.
    pub fn total_subjects(&self) -> usize {
        self.control.n + self.treatment.n
    }

    /// True difference-in-difference:
    /// (treatment post - pre) - (control post - pre).
    pub fn true_interaction(&self) -> f64 {
        (self.treatment.mean_post - self.treatment.mean_pre)
            - (self.control.mean_post - self.control.mean_pre)
    }

    /// Validate both groups and build their covariance matrices.
    ///
    /// Each matrix is built from its own group's parameters only.
    pub fn prepare(&self) -> Result<PreparedDesign> {
        let control_cov = self.group_covariance(Condition::Control)?;
        let treatment_cov = self.group_covariance(Condition::Treatment)?;
        Ok(PreparedDesign {
            params: *self,
            control_cov,
            treatment_cov,
        })
    }

    fn group_covariance(&self, condition: Condition) -> Result<CovarianceMatrix> {
        let group = self.group(condition);
        group.validate(condition)?;
        let cov = CovarianceMatrix::from_group(group).map_err(|e| qualify(e, condition))?;
        cov.ensure_positive_definite(condition)?;
        Ok(cov)
    }
}

/// Validated design with per-group covariance matrices ready for sampling.
#[derive(Debug, Clone, Copy)]
pub struct PreparedDesign {
    params: DesignParameters,
    control_cov: CovarianceMatrix,
    treatment_cov: CovarianceMatrix,
}

impl PreparedDesign {
    /// Underlying parameters.
    pub fn params(&self) -> &DesignParameters {
        &self.params
    }

    /// Covariance matrix for one arm.
    pub fn covariance(&self, condition: Condition) -> &CovarianceMatrix {
        match condition {
            Condition::Control => &self.control_cov,
            Condition::Treatment => &self.treatment_cov,
        }
    }
}

fn qualify(err: Error, condition: Condition) -> Error {
    match err {
        Error::InvalidParameter { name, value, reason } if !name.contains('.') => {
            Error::InvalidParameter {
                name: format!("{condition}.{name}"),
                value,
                reason,
            }
        }
        other => other,
    }
}
