//! Pipeline orchestration for one (platform, week) scoring run.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use gapscan_core::{
    is_week_start, AppConfig, GapScore, MetricType, NormalizedSignal, Platform, RawSignal,
    ScoringConfig,
};
use serde::{Deserialize, Serialize};

use crate::aggregate::composite_score;
use crate::error::EngineError;
use crate::normalize::normalize_metric;
use crate::score::{gap_score, verdict_for};
use crate::store::SignalStore;

// ---------------------------------------------------------------------------
// Run bookkeeping types
// ---------------------------------------------------------------------------

/// Phase of a pipeline run. Phases advance strictly in declaration order;
/// `Failed` is reachable from any phase on unrecoverable error. Per-category
/// skips never move the run to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Normalizing,
    Aggregating,
    Scoring,
    Persisting,
    Done,
    Failed,
}

impl RunState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Normalizing => "normalizing",
            RunState::Aggregating => "aggregating",
            RunState::Scoring => "scoring",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason a category produced no gap score this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingDemandSignals,
    MissingSupplySignals,
    StorageTimeout,
    StorageError,
}

/// One skipped category and why, reported so downstream consumers can tell
/// "no opportunity" apart from "could not be scored".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub category: String,
    pub reason: SkipReason,
}

/// Outcome of a pipeline run: how many categories got a gap score and which
/// were skipped, sorted by category for deterministic reruns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: Vec<SkippedCategory>,
}

/// Knobs the caller controls per run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Upper bound on concurrent per-category persistence calls.
    pub max_concurrent_categories: usize,
    /// Timeout applied to every individual storage call.
    pub store_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_categories: 8,
            store_timeout: Duration::from_secs(10),
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_categories: config.engine_max_concurrent_categories,
            store_timeout: Duration::from_secs(config.engine_store_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

struct StateTracker {
    platform: Platform,
    week_start: NaiveDate,
    state: RunState,
}

impl StateTracker {
    fn new(platform: Platform, week_start: NaiveDate) -> Self {
        Self {
            platform,
            week_start,
            state: RunState::Pending,
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(
            platform = %self.platform,
            week_start = %self.week_start,
            from = %self.state,
            to = %next,
            "pipeline state change"
        );
        self.state = next;
    }
}

/// Run the full scoring pipeline for one (platform, week).
///
/// 1. Load the week's raw signals for the platform.
/// 2. Normalize each configured metric across the category population and
///    persist the normalized values.
/// 3. Aggregate per-category demand and supply composites.
/// 4. Score each category and assign a verdict.
/// 5. Upsert gap score rows with bounded concurrency.
///
/// Categories lacking a configured side are skipped and reported in the
/// [`RunSummary`], as are categories whose upsert fails or times out;
/// neither aborts the run. An empty signal week returns an empty summary.
///
/// Rerunning on identical raw data writes identical rows, so the whole run
/// is safe to retry after a failure.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `week_start` is not a Monday or
/// the scoring config does not cover `platform`, and
/// [`EngineError::Storage`] if the initial signal load fails or times out.
pub async fn run_pipeline<S: SignalStore>(
    store: &S,
    scoring: &ScoringConfig,
    platform: Platform,
    week_start: NaiveDate,
    options: &PipelineOptions,
) -> Result<RunSummary, EngineError> {
    if !is_week_start(week_start) {
        return Err(EngineError::InvalidInput(format!(
            "week_start {week_start} is not a Monday"
        )));
    }
    let spec = scoring.platform(platform).ok_or_else(|| {
        EngineError::InvalidInput(format!("scoring config does not cover platform '{platform}'"))
    })?;

    let mut tracker = StateTracker::new(platform, week_start);
    let store_timeout = options.store_timeout;

    // Step 1: Load the week's signals.
    tracker.advance(RunState::Normalizing);
    let load = store.load_raw_signals(platform, week_start);
    let raw = match tokio::time::timeout(store_timeout, load).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            tracker.advance(RunState::Failed);
            return Err(e);
        }
        Err(_) => {
            tracker.advance(RunState::Failed);
            return Err(EngineError::Storage(format!(
                "timed out loading raw signals for {platform} week {week_start} after {}s",
                store_timeout.as_secs()
            )));
        }
    };

    if raw.is_empty() {
        tracing::info!(
            platform = %platform,
            week_start = %week_start,
            "no raw signals for this week; nothing to score"
        );
        tracker.advance(RunState::Done);
        return Ok(RunSummary::default());
    }

    let categories: BTreeSet<String> = raw.iter().map(|s| s.category.clone()).collect();
    let populations = partition_populations(raw);

    // Step 2: Normalize each configured metric across its population.
    let mut normalized_all: Vec<NormalizedSignal> = Vec::new();
    let mut demand_values: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut supply_values: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut consumed: BTreeSet<(MetricType, String)> = BTreeSet::new();

    for metric_type in MetricType::ALL {
        for metric in &spec.side(metric_type).metrics {
            let key = (metric_type, metric.name.clone());
            let Some(population) = populations.get(&key) else {
                tracing::debug!(
                    platform = %platform,
                    metric = %metric.name,
                    "no signals for configured metric this week"
                );
                continue;
            };
            consumed.insert(key);

            let normalized = match normalize_metric(population, metric.direction) {
                Ok(normalized) => normalized,
                Err(e) => {
                    tracker.advance(RunState::Failed);
                    return Err(e);
                }
            };
            let values = match metric_type {
                MetricType::Demand => &mut demand_values,
                MetricType::Supply => &mut supply_values,
            };
            for signal in &normalized {
                values
                    .entry(signal.category.clone())
                    .or_default()
                    .insert(signal.metric_name.clone(), signal.normalized_value);
            }
            normalized_all.extend(normalized);
        }
    }

    for (metric_type, name) in populations.keys() {
        if !consumed.contains(&(*metric_type, name.clone())) {
            tracing::warn!(
                platform = %platform,
                metric = %name,
                metric_type = %metric_type,
                "ignoring stored signals for a metric the scoring config does not reference"
            );
        }
    }

    // Normalized values are bookkeeping for later inspection; gap scores are
    // still computable and persisted when this write fails.
    if !normalized_all.is_empty() {
        match tokio::time::timeout(store_timeout, store.store_normalized(&normalized_all)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(platform = %platform, error = %e, "failed to persist normalized values");
            }
            Err(_) => {
                tracing::warn!(
                    platform = %platform,
                    timeout_secs = store_timeout.as_secs(),
                    "timed out persisting normalized values"
                );
            }
        }
    }

    // Step 3: Aggregate per-category composites, isolating skips.
    tracker.advance(RunState::Aggregating);
    let mut summary = RunSummary::default();
    let mut composites: Vec<(String, f64, f64)> = Vec::new();
    let empty = BTreeMap::new();

    for category in &categories {
        let demand_input = demand_values.get(category).unwrap_or(&empty);
        let demand = match composite_score(
            category,
            MetricType::Demand,
            spec.side(MetricType::Demand),
            demand_input,
        ) {
            Ok(v) => v,
            Err(EngineError::InsufficientSignal { .. }) => {
                tracing::info!(
                    platform = %platform,
                    category = %category,
                    "skipping category with no demand signals"
                );
                summary.skipped.push(SkippedCategory {
                    category: category.clone(),
                    reason: SkipReason::MissingDemandSignals,
                });
                continue;
            }
            Err(e) => {
                tracker.advance(RunState::Failed);
                return Err(e);
            }
        };

        let supply_input = supply_values.get(category).unwrap_or(&empty);
        let supply = match composite_score(
            category,
            MetricType::Supply,
            spec.side(MetricType::Supply),
            supply_input,
        ) {
            Ok(v) => v,
            Err(EngineError::InsufficientSignal { .. }) => {
                tracing::info!(
                    platform = %platform,
                    category = %category,
                    "skipping category with no supply signals"
                );
                summary.skipped.push(SkippedCategory {
                    category: category.clone(),
                    reason: SkipReason::MissingSupplySignals,
                });
                continue;
            }
            Err(e) => {
                tracker.advance(RunState::Failed);
                return Err(e);
            }
        };

        composites.push((category.clone(), demand, supply));
    }

    // Step 4: Score. Composites are clamped, so failures here are caller bugs.
    tracker.advance(RunState::Scoring);
    let mut scored: Vec<GapScore> = Vec::with_capacity(composites.len());
    for (category, demand, supply) in composites {
        let value = match gap_score(demand, supply) {
            Ok(value) => value,
            Err(e) => {
                tracker.advance(RunState::Failed);
                return Err(e);
            }
        };
        scored.push(GapScore {
            platform,
            category,
            week_start,
            demand_score: demand,
            supply_score: supply,
            gap_score: value,
            verdict: verdict_for(value),
        });
    }

    // Step 5: Persist with bounded concurrency; a failed or timed-out upsert
    // skips that category only.
    tracker.advance(RunState::Persisting);
    let max_concurrent = options.max_concurrent_categories.max(1);
    let outcomes: Vec<(String, Option<SkipReason>)> = stream::iter(scored)
        .map(|row| async move {
            let category = row.category.clone();
            let outcome = match tokio::time::timeout(store_timeout, store.upsert_gap_score(&row))
                .await
            {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    tracing::warn!(
                        platform = %platform,
                        category = %category,
                        error = %e,
                        "gap score upsert failed"
                    );
                    Some(SkipReason::StorageError)
                }
                Err(_) => {
                    tracing::warn!(
                        platform = %platform,
                        category = %category,
                        timeout_secs = store_timeout.as_secs(),
                        "gap score upsert timed out"
                    );
                    Some(SkipReason::StorageTimeout)
                }
            };
            (category, outcome)
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    for (category, outcome) in outcomes {
        match outcome {
            None => summary.succeeded += 1,
            Some(reason) => summary.skipped.push(SkippedCategory { category, reason }),
        }
    }

    summary
        .skipped
        .sort_by(|a, b| a.category.cmp(&b.category));

    tracker.advance(RunState::Done);
    tracing::info!(
        platform = %platform,
        week_start = %week_start,
        succeeded = summary.succeeded,
        skipped = summary.skipped.len(),
        "pipeline run complete"
    );
    Ok(summary)
}

fn partition_populations(
    signals: Vec<RawSignal>,
) -> BTreeMap<(MetricType, String), Vec<RawSignal>> {
    let mut populations: BTreeMap<(MetricType, String), Vec<RawSignal>> = BTreeMap::new();
    for signal in signals {
        populations
            .entry((signal.metric_type, signal.metric_name.clone()))
            .or_default()
            .push(signal);
    }
    populations
}
