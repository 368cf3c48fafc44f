use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod scoring;
pub mod types;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use scoring::{
    MetricSpec, PlatformScoring, ScoringConfig, SideSpec, SignalDirection,
    SCORING_CONFIG_VERSION,
};
pub use types::{
    is_week_start, normalize_category, week_start_for, GapScore, MetricType, NormalizedSignal,
    Platform, RawSignal, SignalError, Verdict,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read scoring config at {path}: {source}")]
    ScoringFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scoring config: {0}")]
    ScoringFileParse(#[from] serde_yaml::Error),

    #[error("scoring config validation failed: {0}")]
    Validation(String),
}
