//! Storage seam between the pipeline and the persistence layer.

use async_trait::async_trait;
use chrono::NaiveDate;
use gapscan_core::{GapScore, NormalizedSignal, Platform, RawSignal};

use crate::error::EngineError;

/// Persistence operations the pipeline depends on.
///
/// The engine never opens connections itself; callers hand it an
/// implementation backed by Postgres in production and by an in-memory map
/// in tests. All writes are upserts on natural keys so that concurrent
/// last-writer-wins races between identical recomputes are harmless.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Load every raw signal recorded for `platform` in the week starting
    /// at `week_start`, across all categories and metrics.
    async fn load_raw_signals(
        &self,
        platform: Platform,
        week_start: NaiveDate,
    ) -> Result<Vec<RawSignal>, EngineError>;

    /// Record normalized values alongside their raw rows.
    async fn store_normalized(&self, signals: &[NormalizedSignal]) -> Result<(), EngineError>;

    /// Insert or overwrite the gap score row for the signal's
    /// (platform, category, week_start) key.
    async fn upsert_gap_score(&self, score: &GapScore) -> Result<(), EngineError>;
}
