//! Synchronizer configuration.
//!
//! ```yaml
//! update_batch_size: 10
//! remote_failure: omit        # or record_error
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default number of descriptors checked per update tick.
pub const DEFAULT_UPDATE_BATCH_SIZE: usize = 10;

/// What a failed remote-require fetch does beyond omitting the segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFailurePolicy {
    /// Omit the segment, log, and register the rest.
    #[default]
    Omit,
    /// Also record the failure into `descriptor.error`, still registering the rest.
    RecordError,
}

/// Runtime knobs for [`RegistrationSynchronizer`](crate::RegistrationSynchronizer)
/// and [`UpdateChecker`](crate::UpdateChecker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub update_batch_size: usize,
    pub remote_failure: RemoteFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_batch_size: DEFAULT_UPDATE_BATCH_SIZE,
            remote_failure: RemoteFailurePolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Load from a `.json` file, or YAML for any other extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on malformed input.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }
}
