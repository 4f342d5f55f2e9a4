//! usm-sync: keeps live registrations in step with installed descriptors
//!
//! # Architecture
//!
//! ```text
//! DescriptorStore mutation
//!         ↓ ChangeBatch {key: {old_value, new_value}}
//! plan()  → [Unregister(name) | Sync(name) | SyncAll]
//!         ↓ apply()
//! RegistrationSynchronizer::sync(identity)
//!         ↓ unregister → build payloads → register
//! RegistrationService
//! ```
//!
//! The store, the registration service and the fetcher are traits; the
//! [`memory`] module provides in-process implementations.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use usm_sync::memory::{MapFetcher, MemoryStore, RecordingService};
//! use usm_sync::{install, RegistrationSynchronizer, SyncConfig};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let service = RecordingService::new();
//! let sync = RegistrationSynchronizer::new(
//!     store.clone(),
//!     Arc::new(service.clone()),
//!     Arc::new(MapFetcher::new()),
//!     SyncConfig::default(),
//! );
//!
//! let mut changes = store.subscribe();
//! install(store.as_ref(), "// ==UserScript==\n// @name Hi\n// @match *://*/*\n// ==/UserScript==\nhi();")
//!     .await
//!     .unwrap();
//! sync.apply(&changes.try_recv().unwrap()).await;
//!
//! assert_eq!(service.live(), vec!["Hi"]);
//! # });
//! ```

mod changes;
mod config;
mod error;
mod payload;
mod service;
mod store;
mod synchronizer;
mod update;

#[cfg(feature = "http")]
mod http;

pub mod memory;

pub use changes::{plan, SyncAction};
pub use config::{RemoteFailurePolicy, SyncConfig, DEFAULT_UPDATE_BATCH_SIZE};
pub use error::{ConfigError, FetchError, RegistrationError, SyncError, SyncResult};
pub use payload::{build, Built, RegistrationPayload, Source, Target};
pub use service::{Fetcher, RegistrationHandle, RegistrationService};
pub use store::{
    install, record_key, record_name, split_patterns, Change, ChangeBatch, DescriptorStore,
    ScriptRecord, StoredValue, GLOBAL_EXCLUDES_KEY,
};
pub use synchronizer::{RegistrationSynchronizer, SyncOutcome};
pub use update::{compare_versions, is_newer, UpdateChecker, UpdateReport};

#[cfg(feature = "http")]
pub use http::ReqwestFetcher;
