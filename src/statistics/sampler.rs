//! Correlated (pre, post) sampling for one group.
//!
//! Draws come from N(μ, Σ) via the Cholesky factor `L` of Σ: each row is
//! `μ + L·z` with `z` two independent standard normals.
//!
//! In empirical mode the standard-normal draws are first centred and whitened
//! by their own sample covariance, so the returned sample has exactly the
//! requested mean and (n-1)-denominator covariance. That mode exists for
//! illustrating parameters, not for power trials.

use rand::Rng;
use rand_distr::StandardNormal;

use super::covariance::{sample_moments, CovarianceMatrix};
use crate::error::{Error, Result};
use crate::types::{Matrix2, SampleMatrix, Vector2};

/// Redraws allowed when an empirical draw is numerically degenerate.
const MAX_EMPIRICAL_ATTEMPTS: usize = 8;

/// How a group sample relates to the population parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    /// Independent stochastic realization (power trials).
    #[default]
    Stochastic,
    /// Sample moments forced to equal the population moments (visualization).
    Empirical,
}

impl SamplingMode {
    /// Minimum group size for this mode.
    ///
    /// Empirical mode needs a full-rank centred sample, which takes three
    /// rows in two dimensions.
    pub fn min_n(self) -> usize {
        match self {
            SamplingMode::Stochastic => 2,
            SamplingMode::Empirical => 3,
        }
    }
}

/// Draw `n` (pre, post) rows from N(`mean`, `cov`).
///
/// # Errors
///
/// * `InvalidParameter` if `n` is below [`SamplingMode::min_n`].
/// * `NonPositiveDefiniteCovariance` is the caller's concern; here a
///   non-PD `cov` yields `InvalidParameter` on `covariance`.
pub fn draw_group<R: Rng + ?Sized>(
    n: usize,
    mean: &Vector2,
    cov: &CovarianceMatrix,
    mode: SamplingMode,
    rng: &mut R,
) -> Result<SampleMatrix> {
    if n < mode.min_n() {
        return Err(Error::invalid(
            "n",
            n,
            format!("{:?} sampling needs at least {} subjects", mode, mode.min_n()),
        ));
    }
    let l = cov
        .cholesky()
        .ok_or_else(|| {
            Error::invalid(
                "covariance",
                format!("det={:.3e}", cov.determinant()),
                "must be positive definite",
            )
        })?
        .l();

    let z = match mode {
        SamplingMode::Stochastic => standard_normal_rows(n, rng),
        SamplingMode::Empirical => whitened_rows(n, rng)?,
    };

    Ok(color(&z, mean, &l))
}

fn standard_normal_rows<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<Vector2> {
    (0..n)
        .map(|_| Vector2::new(rng.sample(StandardNormal), rng.sample(StandardNormal)))
        .collect()
}

/// Rows with sample mean exactly 0 and sample covariance exactly I.
fn whitened_rows<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<Vec<Vector2>> {
    for _ in 0..MAX_EMPIRICAL_ATTEMPTS {
        let raw = standard_normal_rows(n, rng);
        let Some((centre, s)) = sample_moments(&raw) else {
            continue;
        };
        let Some(l_inv) = nalgebra::Cholesky::new(s).and_then(|c| c.l().try_inverse()) else {
            continue;
        };
        return Ok(raw.iter().map(|row| l_inv * (row - centre)).collect());
    }
    Err(Error::invalid(
        "n",
        n,
        "empirical sampling produced a degenerate draw repeatedly",
    ))
}

fn color(z: &[Vector2], mean: &Vector2, l: &Matrix2) -> SampleMatrix {
    let colored: Vec<Vector2> = z.iter().map(|zi| mean + l * zi).collect();
    SampleMatrix::from_fn(colored.len(), |i, j| colored[i][j])
}

/// Rows of a wide sample as (pre, post) vectors.
pub fn rows(sample: &SampleMatrix) -> Vec<Vector2> {
    sample
        .row_iter()
        .map(|r| Vector2::new(r[0], r[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn cov() -> CovarianceMatrix {
        CovarianceMatrix::from_sds(1.0, 2.0, 0.75).unwrap()
    }

    #[test]
    fn test_shape() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let s = draw_group(40, &Vector2::new(3.0, 3.5), &cov(), SamplingMode::Stochastic, &mut rng)
            .unwrap();
        assert_eq!(s.nrows(), 40);
        assert_eq!(s.ncols(), 2);
    }

    #[test]
    fn test_empirical_moments_are_exact() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let mean = Vector2::new(3.0, 3.5);
        for n in [3, 5, 40, 200] {
            let s = draw_group(n, &mean, &cov(), SamplingMode::Empirical, &mut rng).unwrap();
            let (m, c) = sample_moments(&rows(&s)).unwrap();
            assert!((m - mean).norm() < 1e-10, "n={n}: mean {m:?}");
            assert!((c - cov().matrix()).norm() < 1e-10, "n={n}: cov {c:?}");
        }
    }

    #[test]
    fn test_stochastic_moments_converge() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mean = Vector2::new(-1.0, 4.0);
        let s = draw_group(50_000, &mean, &cov(), SamplingMode::Stochastic, &mut rng).unwrap();
        let (m, c) = sample_moments(&rows(&s)).unwrap();
        assert!((m - mean).norm() < 0.05, "mean {m:?}");
        assert!((c - cov().matrix()).norm() < 0.1, "cov {c:?}");
    }

    #[test]
    fn test_stochastic_draws_differ() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let mean = Vector2::zeros();
        let a = draw_group(10, &mean, &cov(), SamplingMode::Stochastic, &mut rng).unwrap();
        let b = draw_group(10, &mean, &cov(), SamplingMode::Stochastic, &mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_small_n_and_singular_covariance() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mean = Vector2::zeros();
        assert!(draw_group(1, &mean, &cov(), SamplingMode::Stochastic, &mut rng).is_err());
        assert!(draw_group(2, &mean, &cov(), SamplingMode::Empirical, &mut rng).is_err());
        assert!(draw_group(2, &mean, &cov(), SamplingMode::Stochastic, &mut rng).is_ok());

        let singular = CovarianceMatrix::from_sds(1.0, 1.0, -1.0).unwrap();
        assert!(matches!(
            draw_group(10, &mean, &singular, SamplingMode::Stochastic, &mut rng),
            Err(Error::InvalidParameter { ref name, .. }) if name == "covariance"
        ));
    }
}
