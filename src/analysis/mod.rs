//! Model fitting for the 2×2 mixed design.
//!
//! 1. **Design matrix**: treatment-coded fixed effects with named terms
//! 2. **Mixed model**: random-intercept REML fit and Wald t-tests

mod design;
mod mixed_model;

pub use design::{DesignMatrix, CONDITION, INTERACTION, INTERCEPT, TIME};
pub use mixed_model::{
    interaction_pvalue, FitOptions, FixedEffect, MixedModel, MixedModelFit,
};
