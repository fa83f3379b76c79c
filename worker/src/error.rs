//! Worker error types.

use std::path::PathBuf;

use crate::lifecycle::ServiceWorkerState;

/// Failures talking to the network.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// No connectivity at all.
    #[error("network is offline")]
    Offline,

    /// The request could not be completed (DNS, TLS, connection reset...).
    #[error("request to {url} failed: {reason}")]
    Unreachable { url: String, reason: String },

    /// The request URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Failures reading or writing the durable action queue.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures loading a worker configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("version string must not be empty")]
    EmptyVersion,
}

/// All errors produced by the offline worker.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    /// Lifecycle transition not allowed from the current state.
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: ServiceWorkerState,
        to: ServiceWorkerState,
    },

    /// A precache entry could not be fetched or was not a success response.
    #[error("precache of {url} failed: {reason}")]
    PrecacheFailed { url: String, reason: String },

    /// Sync endpoint rejected or never received the queue.
    #[error("sync to {endpoint} failed: {reason}")]
    SyncFailed { endpoint: String, reason: String },

    /// The worker task has stopped and no longer accepts events.
    #[error("worker is no longer running")]
    WorkerGone,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
