//! Shared domain types for marketplace signals and gap scores.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("category must be non-empty")]
    EmptyCategory,

    #[error("raw value {value} for metric '{metric_name}' must be finite and non-negative")]
    InvalidRawValue { metric_name: String, value: f64 },

    #[error("normalized value {0} must be within [0, 1]")]
    InvalidNormalizedValue(f64),

    #[error("week start {0} is not a Monday")]
    NotWeekStart(NaiveDate),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unknown metric type: {0}")]
    UnknownMetricType(String),

    #[error("unknown verdict: {0}")]
    UnknownVerdict(String),
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Marketplace a signal was collected from. Scores are never blended across
/// platforms; each platform is scored independently.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Etsy,
    Gumroad,
    Whop,
    Reddit,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Etsy,
        Platform::Gumroad,
        Platform::Whop,
        Platform::Reddit,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Etsy => "etsy",
            Platform::Gumroad => "gumroad",
            Platform::Whop => "whop",
            Platform::Reddit => "reddit",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "etsy" => Ok(Platform::Etsy),
            "gumroad" => Ok(Platform::Gumroad),
            "whop" => Ok(Platform::Whop),
            "reddit" => Ok(Platform::Reddit),
            other => Err(SignalError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Which side of the gap a signal measures.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Demand,
    Supply,
}

impl MetricType {
    pub const ALL: [MetricType; 2] = [MetricType::Demand, MetricType::Supply];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Demand => "demand",
            MetricType::Supply => "supply",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demand" => Ok(MetricType::Demand),
            "supply" => Ok(MetricType::Supply),
            other => Err(SignalError::UnknownMetricType(other.to_string())),
        }
    }
}

/// Categorical read on a gap score. Derived from the score alone — no
/// hysteresis, no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    HighOpportunity,
    Competitive,
    Saturated,
}

impl Verdict {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::HighOpportunity => "high_opportunity",
            Verdict::Competitive => "competitive",
            Verdict::Saturated => "saturated",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_opportunity" => Ok(Verdict::HighOpportunity),
            "competitive" => Ok(Verdict::Competitive),
            "saturated" => Ok(Verdict::Saturated),
            other => Err(SignalError::UnknownVerdict(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Week handling
// ---------------------------------------------------------------------------

/// Returns the Monday of the ISO week containing `date`.
#[must_use]
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    let days_from_monday = u64::from(date.weekday().num_days_from_monday());
    // Subtracting at most 6 days from a valid date cannot underflow.
    date.checked_sub_days(Days::new(days_from_monday))
        .unwrap_or(date)
}

/// Returns `true` if `date` is a Monday, the only valid `week_start` value.
#[must_use]
pub fn is_week_start(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

/// Canonical category key: trimmed, lowercased, inner whitespace collapsed.
///
/// `"  Digital   Planners "` and `"digital planners"` become the same key, so
/// scrapes with sloppy input never split one category into two score rows.
#[must_use]
pub fn normalize_category(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Signal records
// ---------------------------------------------------------------------------

/// One raw measurement scraped from a marketplace, identified by
/// (platform, category, metric_name, week_start). Immutable once created;
/// a re-scrape supersedes the stored row via upsert rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub platform: Platform,
    pub category: String,
    pub metric_type: MetricType,
    pub metric_name: String,
    pub raw_value: f64,
    pub week_start: NaiveDate,
}

impl RawSignal {
    /// Builds a validated signal.
    ///
    /// The category is normalized with [`normalize_category`]; `week_start`
    /// must already be a Monday (scrapers compute it with
    /// [`week_start_for`]).
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the category is empty, the raw value is
    /// negative or non-finite, or `week_start` is not a Monday.
    pub fn new(
        platform: Platform,
        category: &str,
        metric_type: MetricType,
        metric_name: impl Into<String>,
        raw_value: f64,
        week_start: NaiveDate,
    ) -> Result<Self, SignalError> {
        let category = normalize_category(category);
        if category.is_empty() {
            return Err(SignalError::EmptyCategory);
        }
        let metric_name = metric_name.into();
        if !raw_value.is_finite() || raw_value < 0.0 {
            return Err(SignalError::InvalidRawValue {
                metric_name,
                value: raw_value,
            });
        }
        if !is_week_start(week_start) {
            return Err(SignalError::NotWeekStart(week_start));
        }
        Ok(Self {
            platform,
            category,
            metric_type,
            metric_name,
            raw_value,
            week_start,
        })
    }
}

/// A [`RawSignal`] plus its population-relative normalized value in [0, 1].
///
/// Normalization is joint over every category observed for the same
/// (platform, metric_name, week_start), so the value only has meaning
/// relative to that population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    pub platform: Platform,
    pub category: String,
    pub metric_type: MetricType,
    pub metric_name: String,
    pub raw_value: f64,
    pub normalized_value: f64,
    pub week_start: NaiveDate,
}

impl NormalizedSignal {
    /// Attaches a normalized value to a raw signal.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidNormalizedValue`] if the value is
    /// outside [0, 1] or non-finite.
    pub fn from_raw(raw: &RawSignal, normalized_value: f64) -> Result<Self, SignalError> {
        if !normalized_value.is_finite() || !(0.0..=1.0).contains(&normalized_value) {
            return Err(SignalError::InvalidNormalizedValue(normalized_value));
        }
        Ok(Self {
            platform: raw.platform,
            category: raw.category.clone(),
            metric_type: raw.metric_type,
            metric_name: raw.metric_name.clone(),
            raw_value: raw.raw_value,
            normalized_value,
            week_start: raw.week_start,
        })
    }
}

/// Final computed score for one (platform, category, week_start) unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapScore {
    pub platform: Platform,
    pub category: String,
    pub week_start: NaiveDate,
    /// Composite demand in [0, 1].
    pub demand_score: f64,
    /// Composite supply in [0, 1].
    pub supply_score: f64,
    /// `(demand - supply + 1) / 2`, in [0, 1].
    pub gap_score: f64,
    pub verdict: Verdict,
}
