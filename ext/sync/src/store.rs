//! Descriptor store contract and change batches.
//!
//! Layout of the persisted key-value store:
//!
//! | Key | Value |
//! |-----|-------|
//! | `"_" + name` | [`ScriptRecord`]: descriptor + its value-store sub-map |
//! | [`GLOBAL_EXCLUDES_KEY`] | space-separated match patterns |
//!
//! Every mutation produces a [`ChangeBatch`] (`{key: {old_value, new_value}}`)
//! that is delivered serially to subscribers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use usm::ScriptDescriptor;

use crate::{SyncError, SyncResult};

/// Preference key of the global exclude list.
pub const GLOBAL_EXCLUDES_KEY: &str = "globalScriptExcludeMatches";

const RECORD_PREFIX: char = '_';

/// Storage key of a descriptor record.
#[must_use]
pub fn record_key(name: &str) -> String {
    format!("{RECORD_PREFIX}{name}")
}

/// Descriptor name of a record key, or `None` for preference keys.
#[must_use]
pub fn record_name(key: &str) -> Option<&str> {
    key.strip_prefix(RECORD_PREFIX)
}

/// Split the space-separated global exclude preference.
#[must_use]
pub fn split_patterns(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_owned).collect()
}

/// One persisted record: the descriptor and the script's own key-value data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub descriptor: ScriptDescriptor,
    #[serde(default)]
    pub storage: BTreeMap<String, serde_json::Value>,
}

impl ScriptRecord {
    #[must_use]
    pub fn new(descriptor: ScriptDescriptor) -> Self {
        Self {
            descriptor,
            storage: BTreeMap::new(),
        }
    }
}

/// A value held under one store key.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Record(Box<ScriptRecord>),
    Preference(String),
}

impl StoredValue {
    /// The descriptor, if this is a record.
    #[must_use]
    pub fn descriptor(&self) -> Option<&ScriptDescriptor> {
        match self {
            Self::Record(record) => Some(&record.descriptor),
            Self::Preference(_) => None,
        }
    }
}

/// Old and new value of one key. `None` means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    pub old_value: Option<StoredValue>,
    pub new_value: Option<StoredValue>,
}

/// All keys touched by one store mutation.
pub type ChangeBatch = BTreeMap<String, Change>;

/// The persisted descriptor map, as seen by the synchronizer and updater.
///
/// Every call may suspend (storage I/O).
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// The descriptor stored under `name`.
    async fn get(&self, name: &str) -> Option<ScriptDescriptor>;

    /// All installed descriptor names, sorted.
    async fn names(&self) -> Vec<String>;

    /// The global exclude preference, split into patterns.
    async fn global_excludes(&self) -> Vec<String>;

    /// Save a descriptor under its name, clearing any recorded error and
    /// keeping the record's storage sub-map.
    async fn save(&self, descriptor: ScriptDescriptor) -> ChangeBatch;

    /// Record (or clear) the last registration failure.
    async fn set_error(&self, name: &str, error: Option<String>);
}

/// Parse `text` and save it, keeping the state of an existing install.
///
/// An existing record with the same name keeps its `enabled` flag, user
/// overrides and storage.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] when the text has no metadata fence, and
/// [`SyncError::MissingName`] when the fence declares no `@name`.
pub async fn install(store: &dyn DescriptorStore, text: &str) -> SyncResult<ScriptDescriptor> {
    let mut descriptor = usm::try_parse(text, "", "")?;
    if descriptor.name.is_empty() {
        return Err(SyncError::MissingName);
    }

    if let Some(existing) = store.get(&descriptor.name).await {
        descriptor = usm::try_parse(text, &existing.user_matches, &existing.user_exclude_matches)?;
        descriptor.enabled = existing.enabled;
        descriptor.user_run_at = existing.user_run_at;
    }

    tracing::info!(identity = %descriptor.name, "installing");
    store.save(descriptor.clone()).await;
    Ok(descriptor)
}
