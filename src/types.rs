//! Type aliases and common types.

use std::fmt;

use nalgebra::{MatrixXx2, SMatrix, SVector};
use serde::{Deserialize, Serialize};

/// 2x2 matrix for (pre, post) covariance.
pub type Matrix2 = SMatrix<f64, 2, 2>;

/// 2-dimensional vector for (pre, post) means.
pub type Vector2 = SVector<f64, 2>;

/// n x 2 wide sample: one row per subject, columns (pre, post).
pub type SampleMatrix = MatrixXx2<f64>;

/// Measurement occasion (within-subjects factor).
///
/// The variant order is the level order: `Pre` is the reference level, so
/// the fitted `time` and `condition:time` coefficients measure change from
/// pre to post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Time {
    /// Baseline measurement.
    Pre,
    /// Follow-up measurement.
    Post,
}

impl Time {
    /// Levels in model order.
    pub const LEVELS: [Time; 2] = [Time::Pre, Time::Post];

    /// Treatment-coded indicator (0 for the reference level).
    pub fn indicator(self) -> f64 {
        match self {
            Time::Pre => 0.0,
            Time::Post => 1.0,
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Time::Pre => write!(f, "pre"),
            Time::Post => write!(f, "post"),
        }
    }
}

/// Experimental condition (between-subjects factor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Reference group.
    Control,
    /// Intervention group.
    Treatment,
}

impl Condition {
    /// Levels in model order.
    pub const LEVELS: [Condition; 2] = [Condition::Control, Condition::Treatment];

    /// Treatment-coded indicator (0 for the reference level).
    pub fn indicator(self) -> f64 {
        match self {
            Condition::Control => 0.0,
            Condition::Treatment => 1.0,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Control => write!(f, "control"),
            Condition::Treatment => write!(f, "treatment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_levels_code_to_zero() {
        assert_eq!(Time::Pre.indicator(), 0.0);
        assert_eq!(Time::Post.indicator(), 1.0);
        assert_eq!(Condition::Control.indicator(), 0.0);
        assert_eq!(Condition::Treatment.indicator(), 1.0);
    }

    #[test]
    fn test_level_order() {
        assert!(Time::Pre < Time::Post);
        assert_eq!(Time::LEVELS[0], Time::Pre);
        assert_eq!(Condition::LEVELS[0], Condition::Control);
    }
}
