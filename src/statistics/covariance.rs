//! 2x2 (pre, post) covariance matrices.
//!
//! [`CovarianceMatrix`] builds the population matrix for one group from its
//! standard deviations and correlation. [`WelfordCovariance2`] accumulates the
//! sample mean and covariance of drawn (pre, post) pairs in a single pass.

use nalgebra::Cholesky;
use nalgebra::U2;

use crate::error::{Error, Result};
use crate::params::GroupParameters;
use crate::types::{Condition, Matrix2, Vector2};

/// Relative determinant threshold below which a matrix is treated as singular.
const SINGULAR_REL_TOL: f64 = 1e-12;

/// Symmetric 2x2 variance-covariance matrix of a (pre, post) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceMatrix {
    matrix: Matrix2,
}

impl CovarianceMatrix {
    /// Build `[[sd_pre², sd_pre·sd_post·r], [sd_pre·sd_post·r, sd_post²]]`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if either standard deviation is not positive or
    /// `|r| > 1`.
    pub fn from_sds(sd_pre: f64, sd_post: f64, correlation: f64) -> Result<Self> {
        if !sd_pre.is_finite() || sd_pre <= 0.0 {
            return Err(Error::invalid("sd_pre", sd_pre, "must be finite and > 0"));
        }
        if !sd_post.is_finite() || sd_post <= 0.0 {
            return Err(Error::invalid("sd_post", sd_post, "must be finite and > 0"));
        }
        if !correlation.is_finite() || correlation.abs() > 1.0 {
            return Err(Error::invalid("correlation", correlation, "must lie in [-1, 1]"));
        }

        let cross = sd_pre * sd_post * correlation;
        Ok(Self {
            matrix: Matrix2::new(sd_pre * sd_pre, cross, cross, sd_post * sd_post),
        })
    }

    /// Build the matrix from one group's own parameters.
    pub fn from_group(group: &GroupParameters) -> Result<Self> {
        Self::from_sds(group.sd_pre, group.sd_post, group.correlation)
    }

    /// The underlying matrix.
    pub fn matrix(&self) -> &Matrix2 {
        &self.matrix
    }

    /// Determinant `sd_pre²·sd_post²·(1 - r²)`.
    pub fn determinant(&self) -> f64 {
        self.matrix.determinant()
    }

    /// Standard deviations `(pre, post)`.
    pub fn sds(&self) -> (f64, f64) {
        (self.matrix[(0, 0)].sqrt(), self.matrix[(1, 1)].sqrt())
    }

    /// Implied correlation.
    pub fn correlation(&self) -> f64 {
        let (a, b) = self.sds();
        self.matrix[(0, 1)] / (a * b)
    }

    /// Strict positive-definiteness, with a scale-relative singularity guard.
    pub fn is_positive_definite(&self) -> bool {
        let diag = self.matrix[(0, 0)] * self.matrix[(1, 1)];
        self.matrix[(0, 0)] > 0.0
            && self.matrix[(1, 1)] > 0.0
            && self.determinant() > SINGULAR_REL_TOL * diag
    }

    /// Fail with `NonPositiveDefiniteCovariance` unless positive definite.
    pub fn ensure_positive_definite(&self, group: Condition) -> Result<()> {
        if self.is_positive_definite() {
            Ok(())
        } else {
            Err(Error::NonPositiveDefiniteCovariance {
                group,
                determinant: self.determinant(),
            })
        }
    }

    /// Lower-triangular Cholesky factor `L` with `L·Lᵀ = Σ`.
    pub fn cholesky(&self) -> Option<Cholesky<f64, U2>> {
        if !self.is_positive_definite() {
            return None;
        }
        Cholesky::new(self.matrix)
    }
}

/// Online mean/covariance accumulator for (pre, post) pairs.
///
/// Welford's single-pass update keeps a running mean and the sum of outer
/// products `M2`, converted to the unbiased covariance as `M2/(n-1)` on
/// demand. Unlike the textbook `Σxxᵀ/n - μμᵀ` form it does not subtract two
/// large, nearly equal quantities, so the empirical sampler's whitening step
/// stays accurate when the outcome mean is far from zero.
#[derive(Debug, Clone, Default)]
pub struct WelfordCovariance2 {
    /// Count of pairs accumulated so far.
    n: usize,
    /// Running mean.
    mean: Vector2,
    /// Sum of outer products: Σ(x - μ)(x - μ)^T
    m2: Matrix2,
}

impl WelfordCovariance2 {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self {
            n: 0,
            mean: Vector2::zeros(),
            m2: Matrix2::zeros(),
        }
    }

    /// Add one observation pair.
    ///
    /// ```text
    /// δ  = x - μₙ₋₁
    /// μₙ = μₙ₋₁ + δ/n
    /// M2ₙ = M2ₙ₋₁ + δ·(x - μₙ)ᵀ
    /// ```
    pub fn update(&mut self, x: &Vector2) {
        self.n += 1;
        let n = self.n as f64;

        let delta = x - self.mean;
        self.mean += delta / n;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2.transpose();
    }

    /// Number of pairs seen.
    pub fn count(&self) -> usize {
        self.n
    }

    /// Running mean.
    pub fn mean(&self) -> Vector2 {
        self.mean
    }

    /// Unbiased sample covariance `M2/(n-1)`, or `None` for fewer than two pairs.
    pub fn covariance(&self) -> Option<Matrix2> {
        if self.n < 2 {
            return None;
        }
        let mut cov = self.m2 / (self.n - 1) as f64;
        // Keep exact symmetry for downstream Cholesky.
        let off = 0.5 * (cov[(0, 1)] + cov[(1, 0)]);
        cov[(0, 1)] = off;
        cov[(1, 0)] = off;
        Some(cov)
    }
}

/// Sample mean vector and unbiased covariance of row pairs.
pub fn sample_moments(rows: &[Vector2]) -> Option<(Vector2, Matrix2)> {
    let mut acc = WelfordCovariance2::new();
    for row in rows {
        acc.update(row);
    }
    acc.covariance().map(|cov| (acc.mean(), cov))
}
