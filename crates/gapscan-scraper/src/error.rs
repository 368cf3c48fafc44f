use gapscan_core::SignalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("missing credential: set {name}")]
    MissingCredential { name: &'static str },

    #[error("collection {snapshot_id} reported failed by the dataset API")]
    CollectionFailed { snapshot_id: String },

    #[error("collection {snapshot_id} not ready after {timeout_secs}s")]
    CollectionTimedOut {
        snapshot_id: String,
        timeout_secs: u64,
    },

    #[error("invalid signal: {0}")]
    Signal(#[from] SignalError),
}
