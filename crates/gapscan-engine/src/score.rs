//! Gap scoring and verdict assignment.

use gapscan_core::Verdict;

use crate::error::EngineError;

/// Gap scores at or above this are `high_opportunity`.
pub const HIGH_OPPORTUNITY_THRESHOLD: f64 = 0.6;

/// Gap scores at or above this (but below the high threshold) are
/// `competitive`; anything lower is `saturated`.
pub const COMPETITIVE_THRESHOLD: f64 = 0.3;

/// Compute the gap score `(demand - supply + 1) / 2`, clamped to [0, 1].
///
/// Equal demand and supply land exactly on `0.5`; maximal demand against
/// zero supply yields `1.0` and the reverse yields `0.0`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if either composite is non-finite
/// or outside [0, 1].
pub fn gap_score(demand: f64, supply: f64) -> Result<f64, EngineError> {
    for (label, value) in [("demand", demand), ("supply", supply)] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(EngineError::InvalidInput(format!(
                "{label} composite {value} must be within [0, 1]"
            )));
        }
    }
    Ok(((demand - supply + 1.0) / 2.0).clamp(0.0, 1.0))
}

/// Map a gap score to its verdict. Thresholds are checked highest first and
/// boundaries are inclusive, so exactly `0.6` is `high_opportunity` and
/// exactly `0.3` is `competitive`.
#[must_use]
pub fn verdict_for(gap: f64) -> Verdict {
    if gap >= HIGH_OPPORTUNITY_THRESHOLD {
        Verdict::HighOpportunity
    } else if gap >= COMPETITIVE_THRESHOLD {
        Verdict::Competitive
    } else {
        Verdict::Saturated
    }
}
