use gapscan_core::MetricType;
use thiserror::Error;

/// Engine failure taxonomy.
///
/// `InvalidInput` means the caller handed the engine malformed data (a bug,
/// never retried). `InsufficientSignal` is legitimate missing data; the
/// affected category is skipped and the run continues. `Storage` surfaces
/// persistence failures; whole runs are safe to retry because recompute is
/// idempotent.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no usable {metric_type} signals for category '{category}'")]
    InsufficientSignal {
        category: String,
        metric_type: MetricType,
    },

    #[error("storage error: {0}")]
    Storage(String),
}
