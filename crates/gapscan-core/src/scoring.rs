//! Versioned scoring configuration loaded from `config/scoring.yaml`.
//!
//! The file declares, per platform, which metrics feed the demand and supply
//! composites, their weights, and whether a metric is inverted (higher raw
//! value means a *worse* opportunity, e.g. listing counts on the supply side
//! are direct while low prices signal saturation). Platforms without supply
//! telemetry declare a fixed `baseline` instead of metrics.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{normalize_category, MetricType, Platform};
use crate::ConfigError;

/// Schema version this binary understands. Files with any other `version`
/// are rejected so a stale config cannot silently shift score semantics.
pub const SCORING_CONFIG_VERSION: u32 = 1;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// How a metric's normalized value contributes to its composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    /// Higher raw value pushes the composite up.
    #[default]
    Direct,
    /// Higher raw value pushes the composite down (`1 - normalized`).
    Inverted,
}

/// One weighted metric within a demand or supply composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub direction: SignalDirection,
}

/// Metric list for one side (demand or supply) of a platform, or a fixed
/// baseline for platforms where that side has no scrapeable signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideSpec {
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
    #[serde(default)]
    pub baseline: Option<f64>,
}

impl SideSpec {
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.metrics.is_empty() && self.baseline.is_some()
    }

    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformScoring {
    pub demand: SideSpec,
    pub supply: SideSpec,
}

impl PlatformScoring {
    #[must_use]
    pub fn side(&self, metric_type: MetricType) -> &SideSpec {
        match metric_type {
            MetricType::Demand => &self.demand,
            MetricType::Supply => &self.supply,
        }
    }
}

/// Root of `scoring.yaml`. Passed into the engine by the caller so scoring
/// stays a pure function of its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub version: u32,
    pub platforms: BTreeMap<Platform, PlatformScoring>,
    #[serde(default)]
    pub watchlist: Vec<String>,
}

impl ScoringConfig {
    /// Load and validate the scoring configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ScoringFileIo {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: ScoringConfig =
            serde_yaml::from_str(&content).map_err(ConfigError::ScoringFileParse)?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to the config
    /// compiled into the binary. A file that exists but fails to parse or
    /// validate is still an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an existing file cannot be read, parsed, or
    /// fails validation.
    pub fn load_or_embedded(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::embedded_default()
        }
    }

    /// The `config/scoring.yaml` shipped with this repository.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the embedded file fails to parse or
    /// validate, which indicates a packaging mistake rather than a runtime
    /// condition.
    pub fn embedded_default() -> Result<Self, ConfigError> {
        let config: ScoringConfig =
            serde_yaml::from_str(include_str!("../../../config/scoring.yaml"))
                .map_err(ConfigError::ScoringFileParse)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn platform(&self, platform: Platform) -> Option<&PlatformScoring> {
        self.platforms.get(&platform)
    }

    /// Watchlist categories in file order, normalized for matching against
    /// signal rows.
    #[must_use]
    pub fn watchlist_categories(&self) -> Vec<String> {
        self.watchlist.iter().map(|c| normalize_category(c)).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SCORING_CONFIG_VERSION {
            return Err(ConfigError::Validation(format!(
                "unsupported scoring config version {}; this build understands version {}",
                self.version, SCORING_CONFIG_VERSION
            )));
        }

        if self.platforms.is_empty() {
            return Err(ConfigError::Validation(
                "scoring config must declare at least one platform".to_string(),
            ));
        }

        for (platform, scoring) in &self.platforms {
            for metric_type in MetricType::ALL {
                validate_side(*platform, metric_type, scoring.side(metric_type))?;
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.watchlist {
            let normalized = normalize_category(entry);
            if normalized.is_empty() {
                return Err(ConfigError::Validation(
                    "watchlist entries must be non-empty".to_string(),
                ));
            }
            if !seen.insert(normalized.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate watchlist category: '{normalized}'"
                )));
            }
        }

        Ok(())
    }
}

fn validate_side(
    platform: Platform,
    metric_type: MetricType,
    side: &SideSpec,
) -> Result<(), ConfigError> {
    match (&side.metrics[..], side.baseline) {
        ([], None) => {
            return Err(ConfigError::Validation(format!(
                "platform '{platform}' {metric_type} side declares neither metrics nor a baseline"
            )));
        }
        ([], Some(baseline)) => {
            if !baseline.is_finite() || !(0.0..=1.0).contains(&baseline) {
                return Err(ConfigError::Validation(format!(
                    "platform '{platform}' {metric_type} baseline {baseline} must be within [0, 1]"
                )));
            }
        }
        (_, Some(_)) => {
            return Err(ConfigError::Validation(format!(
                "platform '{platform}' {metric_type} side declares both metrics and a baseline"
            )));
        }
        (metrics, None) => {
            let mut seen = HashSet::new();
            let mut sum = 0.0;
            for metric in metrics {
                if metric.name.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "platform '{platform}' {metric_type} side has a metric with an empty name"
                    )));
                }
                if !metric.weight.is_finite() || metric.weight <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "metric '{}' on platform '{platform}' has invalid weight {}; \
                         weights must be positive",
                        metric.name, metric.weight
                    )));
                }
                if !seen.insert(metric.name.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "duplicate metric '{}' on platform '{platform}' {metric_type} side",
                        metric.name
                    )));
                }
                sum += metric.weight;
            }
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ConfigError::Validation(format!(
                    "platform '{platform}' {metric_type} weights sum to {sum}; must sum to 1.0"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str, weight: f64) -> MetricSpec {
        MetricSpec {
            name: name.to_string(),
            weight,
            direction: SignalDirection::Direct,
        }
    }

    fn metrics_side(metrics: Vec<MetricSpec>) -> SideSpec {
        SideSpec {
            metrics,
            baseline: None,
        }
    }

    fn baseline_side(baseline: f64) -> SideSpec {
        SideSpec {
            metrics: vec![],
            baseline: Some(baseline),
        }
    }

    fn config_with(platforms: BTreeMap<Platform, PlatformScoring>) -> ScoringConfig {
        ScoringConfig {
            version: SCORING_CONFIG_VERSION,
            platforms,
            watchlist: vec![],
        }
    }

    fn single_platform_config(demand: SideSpec, supply: SideSpec) -> ScoringConfig {
        let mut platforms = BTreeMap::new();
        platforms.insert(Platform::Etsy, PlatformScoring { demand, supply });
        config_with(platforms)
    }

    #[test]
    fn valid_config_passes() {
        let config = single_platform_config(
            metrics_side(vec![metric("review_count", 0.7), metric("avg_rating", 0.3)]),
            baseline_side(0.5),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut config = single_platform_config(
            metrics_side(vec![metric("review_count", 1.0)]),
            baseline_side(0.5),
        );
        config.version = SCORING_CONFIG_VERSION + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn empty_platforms_rejected() {
        let config = config_with(BTreeMap::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let config = single_platform_config(
            metrics_side(vec![metric("review_count", 0.7), metric("avg_rating", 0.4)]),
            baseline_side(0.5),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum"));
    }

    #[test]
    fn weight_sum_tolerates_float_noise() {
        let config = single_platform_config(
            metrics_side(vec![
                metric("a", 0.1),
                metric("b", 0.2),
                metric("c", 0.3),
                metric("d", 0.4),
            ]),
            baseline_side(0.5),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_weight_rejected() {
        let config = single_platform_config(
            metrics_side(vec![metric("review_count", 0.0), metric("avg_rating", 1.0)]),
            baseline_side(0.5),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn duplicate_metric_rejected() {
        let config = single_platform_config(
            metrics_side(vec![metric("review_count", 0.5), metric("review_count", 0.5)]),
            baseline_side(0.5),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn side_with_neither_metrics_nor_baseline_rejected() {
        let config = single_platform_config(
            metrics_side(vec![metric("review_count", 1.0)]),
            SideSpec::default(),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn side_with_both_metrics_and_baseline_rejected() {
        let config = single_platform_config(
            metrics_side(vec![metric("review_count", 1.0)]),
            SideSpec {
                metrics: vec![metric("listing_count", 1.0)],
                baseline: Some(0.5),
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn baseline_out_of_range_rejected() {
        let config = single_platform_config(
            metrics_side(vec![metric("review_count", 1.0)]),
            baseline_side(1.5),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[0, 1]"));
    }

    #[test]
    fn duplicate_watchlist_entries_rejected() {
        let mut config = single_platform_config(
            metrics_side(vec![metric("review_count", 1.0)]),
            baseline_side(0.5),
        );
        config.watchlist = vec!["Digital Planners".to_string(), "digital  planners".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate watchlist"));
    }

    #[test]
    fn watchlist_categories_are_normalized() {
        let mut config = single_platform_config(
            metrics_side(vec![metric("review_count", 1.0)]),
            baseline_side(0.5),
        );
        config.watchlist = vec!["  Notion   Templates ".to_string()];
        assert_eq!(config.watchlist_categories(), vec!["notion templates"]);
    }

    #[test]
    fn default_direction_is_direct() {
        let yaml = "name: listing_count\nweight: 1.0\n";
        let spec: MetricSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.direction, SignalDirection::Direct);
    }

    #[test]
    fn inverted_direction_parses() {
        let yaml = "name: avg_price\nweight: 0.3\ndirection: inverted\n";
        let spec: MetricSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.direction, SignalDirection::Inverted);
    }

    #[test]
    fn side_lookup_by_metric_type() {
        let scoring = PlatformScoring {
            demand: metrics_side(vec![metric("review_count", 1.0)]),
            supply: baseline_side(0.5),
        };
        assert_eq!(scoring.side(MetricType::Demand).metrics.len(), 1);
        assert!(scoring.side(MetricType::Supply).is_baseline());
    }

    #[test]
    fn load_scoring_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("scoring.yaml");
        assert!(
            path.exists(),
            "scoring.yaml missing at {path:?} — required for this test"
        );
        let result = ScoringConfig::load(&path);
        assert!(result.is_ok(), "failed to load scoring.yaml: {result:?}");
        let config = result.unwrap();
        assert_eq!(config.version, SCORING_CONFIG_VERSION);
        for platform in Platform::ALL {
            assert!(
                config.platform(platform).is_some(),
                "scoring.yaml must cover platform '{platform}'"
            );
        }
        assert!(!config.watchlist.is_empty());
    }

    #[test]
    fn embedded_default_matches_real_file() {
        let config = ScoringConfig::embedded_default().unwrap();
        assert_eq!(config.version, SCORING_CONFIG_VERSION);
        assert!(config.platform(Platform::Reddit).is_some());
    }
}
