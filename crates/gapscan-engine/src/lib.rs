//! Deterministic gap scoring engine.
//!
//! Turns raw marketplace signals into per-category gap scores for one
//! (platform, week) at a time: min-max normalization across the week's
//! category population, weighted aggregation into demand and supply
//! composites, and a gap score with a verdict. The normalizer, aggregator,
//! and scorer are pure functions; only the pipeline touches storage, which
//! keeps reruns byte-identical for identical input.

pub mod aggregate;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod score;
pub mod store;

pub use aggregate::composite_score;
pub use error::EngineError;
pub use normalize::normalize_metric;
pub use pipeline::{
    run_pipeline, PipelineOptions, RunState, RunSummary, SkipReason, SkippedCategory,
};
pub use score::{gap_score, verdict_for, COMPETITIVE_THRESHOLD, HIGH_OPPORTUNITY_THRESHOLD};
pub use store::SignalStore;
