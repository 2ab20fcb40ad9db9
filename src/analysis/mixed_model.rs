//! Random-intercept linear mixed model fitted by REML.
//!
//! Model, per subject `g` with `n_g` rows:
//!
//! ```text
//! y_g = X_g β + 1·b_g + e_g,   b_g ~ N(0, σ²θ),   e_g ~ N(0, σ² I)
//! ```
//!
//! With `V_g = I + θ 11ᵀ` the inverse and determinant are closed form:
//!
//! ```text
//! V_g⁻¹ = I - c_g 11ᵀ,   c_g = θ / (1 + n_g θ),   |V_g| = 1 + n_g θ
//! ```
//!
//! so `XᵀV⁻¹X`, `XᵀV⁻¹y` and `yᵀV⁻¹y` are rank-one corrections of per-subject
//! sums. σ² is profiled out and the REML criterion
//!
//! ```text
//! -2ℓ_R(θ) = (N-p)(1 + ln 2π + ln σ̂²(θ)) + Σ ln(1 + n_g θ) + ln|XᵀV⁻¹X|
//! ```
//!
//! is minimized over `ρ = θ/(1+θ) ∈ [0, 1)` by a grid scan followed by
//! golden-section refinement. The boundary `θ = 0` is always a candidate.
//!
//! Fixed-effect tests use Student-t reference distributions with denominator
//! degrees of freedom from the between/within-subject split of each term.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

use super::design::{DesignMatrix, INTERACTION, INTERCEPT};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::statistics::two_sided_t_pvalue;

const LN_2PI: f64 = 1.837_877_066_409_345_5;
const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Largest variance-ratio coordinate searched (θ ≈ 1e6).
const RHO_MAX: f64 = 1.0 - 1e-6;

/// Numerical settings for the REML optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Bracket width at which golden-section search stops (in ρ units).
    pub tolerance: f64,
    /// Maximum golden-section iterations before declaring non-convergence.
    pub max_iterations: usize,
    /// Grid points for the initial scan of ρ.
    pub grid_points: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 200,
            grid_points: 24,
        }
    }
}

/// One fixed-effect coefficient with its Wald t-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedEffect {
    /// Term name, e.g. `condition:time`.
    pub term: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error.
    pub std_error: f64,
    /// Denominator degrees of freedom.
    pub df: f64,
    /// `estimate / std_error`.
    pub t_value: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Result of a REML fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixedModelFit {
    /// Fixed effects in model-matrix column order.
    pub fixed_effects: Vec<FixedEffect>,
    /// Random-intercept variance σ²θ.
    pub subject_variance: f64,
    /// Residual variance σ².
    pub residual_variance: f64,
    /// REML criterion (-2 log restricted likelihood) at the optimum.
    pub reml_criterion: f64,
    /// Number of observations.
    pub n_obs: usize,
    /// Number of subjects.
    pub n_subjects: usize,
    /// Golden-section iterations used.
    pub iterations: usize,
    /// True when the subject variance was estimated at zero.
    pub at_boundary: bool,
}

impl MixedModelFit {
    /// Coefficient by term name.
    pub fn coefficient(&self, term: &str) -> Option<&FixedEffect> {
        self.fixed_effects.iter().find(|fe| fe.term == term)
    }

    /// The `condition:time` coefficient.
    pub fn interaction(&self) -> Result<&FixedEffect> {
        self.coefficient(INTERACTION)
            .ok_or_else(|| Error::fit(format!("model has no `{INTERACTION}` term")))
    }

    /// Intraclass correlation σ²_subject / (σ²_subject + σ²).
    pub fn icc(&self) -> f64 {
        self.subject_variance / (self.subject_variance + self.residual_variance)
    }
}

/// Random-intercept mixed-model fitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixedModel {
    options: FitOptions,
}

impl MixedModel {
    /// Fitter with the given optimizer settings.
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    /// Fit `value ~ condition * time + (1 | subject)`.
    pub fn fit(&self, dataset: &Dataset) -> Result<MixedModelFit> {
        let design = DesignMatrix::from_dataset(dataset);
        self.fit_design(&design)
    }

    /// Fit an already-built design.
    pub fn fit_design(&self, design: &DesignMatrix) -> Result<MixedModelFit> {
        let n = design.n_obs();
        let p = design.n_terms();
        if n <= p {
            return Err(Error::fit(format!(
                "{n} observations cannot support {p} fixed effects"
            )));
        }

        let stats = SufficientStats::new(design);
        let profile = |rho: f64| stats.profile(rho_to_theta(rho));

        // θ = 0 must work: failure there means the fixed effects are not estimable.
        let at_zero = profile(0.0)?;
        // `yty` is the centred total sum of squares, so this is shift/scale invariant.
        if at_zero.rss <= 1e-12 * stats.yty {
            return Err(Error::fit("residual variance is zero (perfect fit)"));
        }

        let (rho, iterations) = self.minimize(|rho| {
            profile(rho).map(|pt| pt.criterion).unwrap_or(f64::INFINITY)
        })?;

        let mut best = at_zero;
        let mut best_rho = 0.0;
        if let Ok(candidate) = profile(rho) {
            if candidate.criterion < best.criterion {
                best = candidate;
                best_rho = rho;
            }
        }

        let theta = rho_to_theta(best_rho);
        if !best.criterion.is_finite() || !best.sigma2.is_finite() || best.sigma2 <= 0.0 {
            return Err(Error::fit(format!(
                "REML criterion not finite at theta={theta:.3e}"
            )));
        }

        let fixed_effects = self.tests(design, &best, stats.y_offset)?;
        Ok(MixedModelFit {
            fixed_effects,
            subject_variance: theta * best.sigma2,
            residual_variance: best.sigma2,
            reml_criterion: best.criterion,
            n_obs: n,
            n_subjects: design.n_groups(),
            iterations,
            at_boundary: best_rho == 0.0,
        })
    }

    /// Grid scan then golden-section search on ρ ∈ [0, RHO_MAX].
    fn minimize<F: Fn(f64) -> f64>(&self, f: F) -> Result<(f64, usize)> {
        let g = self.options.grid_points.max(3);
        let grid: Vec<f64> = (0..=g).map(|k| RHO_MAX * k as f64 / g as f64).collect();
        let values: Vec<f64> = grid.iter().map(|&r| f(r)).collect();

        let k_best = values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap_or(0);
        if !values[k_best].is_finite() {
            return Err(Error::fit("REML criterion is not finite anywhere on the search grid"));
        }

        let mut lo = grid[k_best.saturating_sub(1)];
        let mut hi = grid[(k_best + 1).min(g)];
        let mut x1 = hi - INV_PHI * (hi - lo);
        let mut x2 = lo + INV_PHI * (hi - lo);
        let mut f1 = f(x1);
        let mut f2 = f(x2);

        let mut iterations = 0;
        while hi - lo > self.options.tolerance {
            if iterations >= self.options.max_iterations {
                return Err(Error::fit(format!(
                    "REML optimizer did not converge in {} iterations (bracket {:.3e})",
                    self.options.max_iterations,
                    hi - lo
                )));
            }
            iterations += 1;
            if f1 <= f2 {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - INV_PHI * (hi - lo);
                f1 = f(x1);
            } else {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + INV_PHI * (hi - lo);
                f2 = f(x2);
            }
        }

        let mid = 0.5 * (lo + hi);
        let candidate = if f(mid) <= values[k_best] { mid } else { grid[k_best] };
        Ok((candidate, iterations))
    }

    fn tests(
        &self,
        design: &DesignMatrix,
        point: &ProfilePoint,
        y_offset: f64,
    ) -> Result<Vec<FixedEffect>> {
        let n = design.n_obs() as f64;
        let groups = design.n_groups() as f64;
        let between = design.between_subject();
        // Intercept is tested at the within-subject level.
        let n_between = between.iter().skip(1).filter(|b| **b).count() as f64;
        let n_within = between.iter().skip(1).filter(|b| !**b).count() as f64;
        let df_between = groups - n_between - 1.0;
        let df_within = n - groups - n_within;

        let inv = point.chol.inverse();
        design
            .terms()
            .iter()
            .enumerate()
            .map(|(j, term)| {
                // The response was centred; only the intercept absorbs the mean.
                let estimate = if *term == INTERCEPT {
                    point.beta[j] + y_offset
                } else {
                    point.beta[j]
                };
                let var = point.sigma2 * inv[(j, j)];
                if !(var.is_finite() && var > 0.0) {
                    return Err(Error::fit(format!("non-positive variance for `{term}`")));
                }
                let std_error = var.sqrt();
                let df = if j > 0 && between[j] { df_between } else { df_within };
                if df <= 0.0 {
                    return Err(Error::fit(format!(
                        "no residual degrees of freedom for `{term}`"
                    )));
                }
                let t_value = estimate / std_error;
                Ok(FixedEffect {
                    term: (*term).to_string(),
                    estimate,
                    std_error,
                    df,
                    t_value,
                    p_value: two_sided_t_pvalue(t_value, df)?,
                })
            })
            .collect()
    }
}

/// Fit and return the interaction p-value.
pub fn interaction_pvalue(dataset: &Dataset, options: FitOptions) -> Result<f64> {
    let fit = MixedModel::new(options).fit(dataset)?;
    Ok(fit.interaction()?.p_value)
}

fn rho_to_theta(rho: f64) -> f64 {
    rho / (1.0 - rho)
}

struct ProfilePoint {
    criterion: f64,
    rss: f64,
    sigma2: f64,
    beta: DVector<f64>,
    chol: Cholesky<f64, Dyn>,
}

/// Per-subject sums that make each criterion evaluation O(subjects · p²).
///
/// The response is centred on its grand mean before any sum is formed. With
/// an intercept column in `X` this leaves every slope, every residual and
/// the REML optimum unchanged, but keeps `yᵀV⁻¹y - βᵀb` free of the
/// cancellation that a large outcome mean relative to its spread would
/// otherwise cause. `y_offset` restores the intercept afterwards.
struct SufficientStats {
    xtx: DMatrix<f64>,
    xty: DVector<f64>,
    /// Centred total sum of squares Σ(y - ȳ)².
    yty: f64,
    y_offset: f64,
    /// Per subject: (n_g, X_gᵀ1, 1ᵀy_g).
    subjects: Vec<(f64, DVector<f64>, f64)>,
    n: usize,
    p: usize,
}

impl SufficientStats {
    fn new(design: &DesignMatrix) -> Self {
        let x = design.x();
        let p = design.n_terms();
        let y_offset = design.y().mean();
        let y = design.y().add_scalar(-y_offset);

        let mut subjects: Vec<(f64, DVector<f64>, f64)> =
            vec![(0.0, DVector::zeros(p), 0.0); design.n_groups()];
        for (i, &g) in design.groups().iter().enumerate() {
            let entry = &mut subjects[g];
            entry.0 += 1.0;
            entry.1 += x.row(i).transpose();
            entry.2 += y[i];
        }

        Self {
            xtx: x.transpose() * x,
            xty: x.transpose() * &y,
            yty: y.dot(&y),
            y_offset,
            subjects,
            n: design.n_obs(),
            p,
        }
    }

    fn profile(&self, theta: f64) -> Result<ProfilePoint> {
        let mut a = self.xtx.clone();
        let mut b = self.xty.clone();
        let mut q = self.yty;
        let mut log_det_v = 0.0;

        if theta > 0.0 {
            for (n_g, s, t) in &self.subjects {
                let c = theta / (1.0 + n_g * theta);
                a -= (s * s.transpose()) * c;
                b -= s * (c * t);
                q -= c * t * t;
                log_det_v += (1.0 + n_g * theta).ln();
            }
        }

        let chol = Cholesky::new(a)
            .ok_or_else(|| Error::fit("fixed-effects design is rank deficient"))?;
        let beta = chol.solve(&b);
        let dof = (self.n - self.p) as f64;
        let rss = q - beta.dot(&b);
        let sigma2 = rss.max(0.0) / dof;
        let log_det_a = 2.0 * chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();

        let criterion = dof * (1.0 + LN_2PI + sigma2.ln()) + log_det_v + log_det_a;
        Ok(ProfilePoint {
            criterion,
            rss,
            sigma2,
            beta,
            chol,
        })
    }
}
