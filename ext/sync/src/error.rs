//! Error types for the synchronizer, store, fetch and config layers.

use std::path::PathBuf;

/// A registration-service call failed.
///
/// Recovered per identity: recorded into `descriptor.error`, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("registration rejected: {0}")]
    Rejected(String),

    #[error("invalid registration payload for {id}: {reason}")]
    InvalidPayload { id: String, reason: String },
}

/// A fetch of a remote require or update failed.
///
/// Recovered per URL: the segment or update is omitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("fetch {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("fetch {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Loading a [`SyncConfig`](crate::SyncConfig) failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced to callers of store-level operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("parse failed: {0}")]
    Parse(#[from] usm::UsmError),

    #[error("metadata block has no @name")]
    MissingName,

    #[error("no installed script named \"{name}\"")]
    NotFound { name: String },

    #[error("a script named \"{name}\" is already installed")]
    NameTaken { name: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type SyncResult<T> = Result<T, SyncError>;
