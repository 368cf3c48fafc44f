//! Population-relative min-max normalization.

use std::collections::HashSet;

use gapscan_core::{NormalizedSignal, RawSignal, SignalDirection};

use crate::error::EngineError;

/// Normalize one metric's signals across the category population for a
/// single (platform, metric_name, week_start).
///
/// Every signal maps to `(raw - min) / (max - min)`; when all raw values are
/// equal the population carries no ranking information and every signal maps
/// to `0.5`. An `Inverted` direction flips the result to `1 - normalized` so
/// that a high raw reading lowers the composite it feeds.
///
/// Min and max are tracked in a single running pass, so the output is
/// independent of input order.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if the slice is empty, mixes
/// (platform, metric_type, metric_name, week_start) keys, or contains the
/// same category twice.
pub fn normalize_metric(
    signals: &[RawSignal],
    direction: SignalDirection,
) -> Result<Vec<NormalizedSignal>, EngineError> {
    let Some(first) = signals.first() else {
        return Err(EngineError::InvalidInput(
            "cannot normalize an empty signal population".to_string(),
        ));
    };

    let mut seen_categories = HashSet::with_capacity(signals.len());
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for signal in signals {
        if signal.platform != first.platform
            || signal.metric_type != first.metric_type
            || signal.metric_name != first.metric_name
            || signal.week_start != first.week_start
        {
            return Err(EngineError::InvalidInput(format!(
                "normalization population mixes keys: expected \
                 ({}, {}, '{}', {}), got ({}, {}, '{}', {})",
                first.platform,
                first.metric_type,
                first.metric_name,
                first.week_start,
                signal.platform,
                signal.metric_type,
                signal.metric_name,
                signal.week_start,
            )));
        }
        if !seen_categories.insert(signal.category.as_str()) {
            return Err(EngineError::InvalidInput(format!(
                "duplicate category '{}' in normalization population for metric '{}'",
                signal.category, signal.metric_name
            )));
        }
        min = min.min(signal.raw_value);
        max = max.max(signal.raw_value);
    }

    let span = max - min;
    signals
        .iter()
        .map(|signal| {
            let normalized = if span == 0.0 {
                0.5
            } else {
                (signal.raw_value - min) / span
            };
            let directed = match direction {
                SignalDirection::Direct => normalized,
                SignalDirection::Inverted => 1.0 - normalized,
            };
            NormalizedSignal::from_raw(signal, directed)
                .map_err(|e| EngineError::InvalidInput(e.to_string()))
        })
        .collect()
}
