//! Postgres-backed implementation of the engine's storage seam.

use async_trait::async_trait;
use chrono::NaiveDate;
use gapscan_core::{GapScore, NormalizedSignal, Platform, RawSignal};
use gapscan_engine::{EngineError, SignalStore};
use sqlx::PgPool;

/// [`SignalStore`] backed by the shared Postgres pool.
#[derive(Debug, Clone)]
pub struct PgSignalStore {
    pool: PgPool,
}

impl PgSignalStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    async fn load_raw_signals(
        &self,
        platform: Platform,
        week_start: NaiveDate,
    ) -> Result<Vec<RawSignal>, EngineError> {
        crate::metrics::load_raw_signals(&self.pool, platform, week_start)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    async fn store_normalized(&self, signals: &[NormalizedSignal]) -> Result<(), EngineError> {
        crate::metrics::update_normalized_values(&self.pool, signals)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    async fn upsert_gap_score(&self, score: &GapScore) -> Result<(), EngineError> {
        crate::gap_scores::upsert_gap_score(&self.pool, score)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))
    }
}
