//! Reference distributions for coefficient tests.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Error, Result};

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
///
/// Uses the survival function directly so small p-values keep precision.
pub fn two_sided_t_pvalue(t: f64, df: f64) -> Result<f64> {
    if !t.is_finite() {
        return Err(Error::fit(format!("non-finite t statistic ({t})")));
    }
    if !(df.is_finite() && df > 0.0) {
        return Err(Error::fit(format!("non-positive degrees of freedom ({df})")));
    }
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| Error::fit(format!("t-distribution with df={df}: {e}")))?;
    Ok((2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}
