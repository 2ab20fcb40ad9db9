//! JSON serialization for power estimates.

use crate::power::PowerEstimate;

/// Serialize a PowerEstimate to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (non-finite floats serialize as `null`).
pub fn to_json(estimate: &PowerEstimate) -> Result<String, serde_json::Error> {
    serde_json::to_string(estimate)
}

/// Serialize a PowerEstimate to a pretty-printed JSON string.
pub fn to_json_pretty(estimate: &PowerEstimate) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(estimate)
}
