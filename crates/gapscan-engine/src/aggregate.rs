//! Weighted aggregation of normalized metrics into a composite.

use std::collections::BTreeMap;

use gapscan_core::{MetricType, SideSpec};

use crate::error::EngineError;

/// Combine one category's normalized metric values into a demand or supply
/// composite in [0, 1].
///
/// `values` maps metric name to the category's normalized value for that
/// metric; configured metrics absent from the map are treated as missing and
/// their weight is redistributed proportionally across the metrics that are
/// present (the composite divides by the sum of present weights). A side
/// configured with a `baseline` instead of metrics always yields the
/// baseline.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientSignal`] when none of the configured
/// metrics are present, and [`EngineError::InvalidInput`] when a present
/// value lies outside [0, 1] or the side declares no metrics and no
/// baseline.
pub fn composite_score(
    category: &str,
    metric_type: MetricType,
    side: &SideSpec,
    values: &BTreeMap<String, f64>,
) -> Result<f64, EngineError> {
    if side.metrics.is_empty() {
        return side.baseline.ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "{metric_type} side declares neither metrics nor a baseline"
            ))
        });
    }

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;

    for metric in &side.metrics {
        let Some(&value) = values.get(&metric.name) else {
            continue;
        };
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(EngineError::InvalidInput(format!(
                "normalized value {value} for metric '{}' must be within [0, 1]",
                metric.name
            )));
        }
        weighted_sum += metric.weight * value;
        weight_sum += metric.weight;
    }

    if weight_sum == 0.0 {
        return Err(EngineError::InsufficientSignal {
            category: category.to_string(),
            metric_type,
        });
    }

    Ok((weighted_sum / weight_sum).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use gapscan_core::{MetricSpec, SignalDirection};

    use super::*;

    fn side(specs: &[(&str, f64)]) -> SideSpec {
        SideSpec {
            metrics: specs
                .iter()
                .map(|(name, weight)| MetricSpec {
                    name: (*name).to_string(),
                    weight: *weight,
                    direction: SignalDirection::Direct,
                })
                .collect(),
            baseline: None,
        }
    }

    fn values(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(name, v)| ((*name).to_string(), *v))
            .collect()
    }

    #[test]
    fn full_composite_is_weighted_mean() {
        let side = side(&[("review_count", 0.7), ("avg_rating", 0.3)]);
        let values = values(&[("review_count", 1.0), ("avg_rating", 0.0)]);
        let composite = composite_score("digital planners", MetricType::Demand, &side, &values);
        assert_eq!(composite.unwrap(), 0.7);
    }

    #[test]
    fn missing_metric_weight_is_redistributed() {
        let side = side(&[("a", 0.5), ("b", 0.5)]);
        let values = values(&[("a", 0.8)]);
        let composite = composite_score("x", MetricType::Demand, &side, &values).unwrap();
        assert!((composite - 0.8).abs() < 1e-12, "expected 0.8, got {composite}");
    }

    #[test]
    fn redistribution_with_unequal_weights() {
        let side = side(&[("a", 0.7), ("b", 0.3)]);
        let values = values(&[("b", 1.0)]);
        assert_eq!(
            composite_score("x", MetricType::Supply, &side, &values).unwrap(),
            1.0
        );
    }

    #[test]
    fn no_present_metrics_is_insufficient_signal() {
        let side = side(&[("a", 0.5), ("b", 0.5)]);
        let err = composite_score("stock photos", MetricType::Demand, &side, &BTreeMap::new())
            .unwrap_err();
        match err {
            EngineError::InsufficientSignal {
                category,
                metric_type,
            } => {
                assert_eq!(category, "stock photos");
                assert_eq!(metric_type, MetricType::Demand);
            }
            other => panic!("expected InsufficientSignal, got {other:?}"),
        }
    }

    #[test]
    fn baseline_side_yields_baseline() {
        let side = SideSpec {
            metrics: vec![],
            baseline: Some(0.5),
        };
        assert_eq!(
            composite_score("x", MetricType::Supply, &side, &BTreeMap::new()).unwrap(),
            0.5
        );
    }

    #[test]
    fn empty_side_without_baseline_is_invalid_input() {
        let err = composite_score("x", MetricType::Supply, &SideSpec::default(), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn out_of_range_value_is_invalid_input() {
        let side = side(&[("a", 1.0)]);
        let values = values(&[("a", 1.5)]);
        let err = composite_score("x", MetricType::Demand, &side, &values).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn values_for_unconfigured_metrics_are_ignored() {
        let side = side(&[("a", 1.0)]);
        let values = values(&[("a", 0.4), ("stray", 0.9)]);
        assert_eq!(
            composite_score("x", MetricType::Demand, &side, &values).unwrap(),
            0.4
        );
    }

    #[test]
    fn composite_stays_within_unit_interval() {
        let side = side(&[("a", 0.6), ("b", 0.4)]);
        let values = values(&[("a", 1.0), ("b", 1.0)]);
        let composite = composite_score("x", MetricType::Demand, &side, &values).unwrap();
        assert!((0.0..=1.0).contains(&composite));
    }
}
