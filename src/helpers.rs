//! Utilities for choosing group means.
//!
//! Planning inputs often come as response-category proportions (for example
//! the share of answers on each point of a 5-point scale) rather than means.
//! [`response_mean`] converts such a distribution into the mean to plug into
//! [`GroupParameters`](crate::GroupParameters).
//!
//! # Example
//!
//! ```
//! use did_power::helpers::response_mean;
//!
//! let mean = response_mean(&[0.1, 0.25, 0.3, 0.25, 0.1]).unwrap();
//! assert!((mean - 3.0).abs() < 1e-12);
//! ```

use crate::error::{Error, Result};

/// Proportions must sum to 1 within this tolerance.
const SUM_TOLERANCE: f64 = 1e-9;

/// Weighted mean `Σ wᵢ·xᵢ` of `levels` under the proportions `weights`.
///
/// # Errors
///
/// `InvalidParameter` when the inputs are empty, have different lengths,
/// contain a negative or non-finite weight, or the weights do not sum to 1.
pub fn weighted_mean(levels: &[f64], weights: &[f64]) -> Result<f64> {
    if weights.is_empty() {
        return Err(Error::invalid("weights", "[]", "must not be empty"));
    }
    if levels.len() != weights.len() {
        return Err(Error::invalid(
            "levels",
            levels.len(),
            format!("length must match weights ({})", weights.len()),
        ));
    }
    if let Some((i, w)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(Error::invalid(
            format!("weights[{i}]"),
            w,
            "must be finite and non-negative",
        ));
    }
    if let Some((i, x)) = levels.iter().enumerate().find(|(_, x)| !x.is_finite()) {
        return Err(Error::invalid(format!("levels[{i}]"), x, "must be finite"));
    }

    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        return Err(Error::invalid("weights", total, "must sum to 1"));
    }

    Ok(levels.iter().zip(weights).map(|(x, w)| x * w).sum())
}

/// Mean response on a `1..=k` scale given the share of each category.
pub fn response_mean(proportions: &[f64]) -> Result<f64> {
    let levels: Vec<f64> = (1..=proportions.len()).map(|k| k as f64).collect();
    weighted_mean(&levels, proportions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_five_point_scale() {
        let mean = response_mean(&[0.1, 0.25, 0.3, 0.25, 0.1]).unwrap();
        assert!((mean - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_skewed_distribution() {
        let mean = response_mean(&[0.0, 0.0, 0.0, 0.5, 0.5]).unwrap();
        assert!((mean - 4.5).abs() < 1e-12);
        let mean = weighted_mean(&[-1.0, 1.0], &[0.25, 0.75]).unwrap();
        assert!((mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_malformed_weights() {
        assert!(response_mean(&[]).is_err());
        assert!(response_mean(&[0.5, 0.4]).is_err());
        assert!(response_mean(&[1.2, -0.2]).is_err());
        assert!(response_mean(&[f64::NAN, 1.0]).is_err());
        assert!(weighted_mean(&[1.0, 2.0, 3.0], &[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_error_names_offending_weight() {
        match response_mean(&[0.5, -0.1, 0.6]) {
            Err(Error::InvalidParameter { name, .. }) => assert_eq!(name, "weights[1]"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
