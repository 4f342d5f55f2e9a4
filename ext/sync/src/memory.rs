//! In-memory implementations of the store, registration service and fetcher.
//!
//! [`MemoryStore`] is a complete store (it is what the CLI and tests drive);
//! [`RecordingService`] and [`MapFetcher`] record every call so tests can
//! assert on registration traffic.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use usm::ScriptDescriptor;

use crate::store::{
    record_key, split_patterns, Change, ChangeBatch, DescriptorStore, ScriptRecord, StoredValue,
    GLOBAL_EXCLUDES_KEY,
};
use crate::{
    FetchError, Fetcher, RegistrationError, RegistrationHandle, RegistrationPayload,
    RegistrationService, SyncError, SyncResult,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MemoryStore
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, ScriptRecord>,
    global_excludes: String,
}

/// In-memory [`DescriptorStore`] with change notification.
///
/// Every mutation returns the [`ChangeBatch`] it produced and delivers it to
/// every subscriber, in mutation order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChangeBatch>>>,
}

fn record_value(record: &ScriptRecord) -> StoredValue {
    StoredValue::Record(Box::new(record.clone()))
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every future change batch.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChangeBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    fn emit(&self, batch: ChangeBatch) -> ChangeBatch {
        if !batch.is_empty() {
            lock(&self.subscribers).retain(|tx| tx.send(batch.clone()).is_ok());
        }
        batch
    }

    /// The full record stored under `name`.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<ScriptRecord> {
        self.read().records.get(name).cloned()
    }

    fn save_record(&self, mut descriptor: ScriptDescriptor) -> ChangeBatch {
        descriptor.error = None;
        let name = descriptor.name.clone();
        let mut batch = ChangeBatch::new();
        {
            let mut inner = self.write();
            let old = inner.records.get(&name).cloned();
            let storage = old.as_ref().map(|r| r.storage.clone()).unwrap_or_default();
            let new = ScriptRecord {
                descriptor,
                storage,
            };
            batch.insert(
                record_key(&name),
                Change {
                    old_value: old.as_ref().map(record_value),
                    new_value: Some(record_value(&new)),
                },
            );
            inner.records.insert(name, new);
        }
        self.emit(batch)
    }

    fn update<F>(&self, name: &str, f: F) -> SyncResult<ChangeBatch>
    where
        F: FnOnce(&mut ScriptRecord),
    {
        let mut batch = ChangeBatch::new();
        {
            let mut inner = self.write();
            let Some(record) = inner.records.get_mut(name) else {
                return Err(SyncError::NotFound { name: name.into() });
            };
            let old = record_value(record);
            f(record);
            batch.insert(
                record_key(name),
                Change {
                    old_value: Some(old),
                    new_value: Some(record_value(record)),
                },
            );
        }
        Ok(self.emit(batch))
    }

    /// Enable or disable an installed script.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if nothing is installed under `name`.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> SyncResult<ChangeBatch> {
        self.update(name, |r| r.descriptor.enabled = enabled)
    }

    /// Replace the user match overrides (space-separated patterns).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if nothing is installed under `name`.
    pub fn set_user_matches(
        &self,
        name: &str,
        user_matches: &str,
        user_exclude_matches: &str,
    ) -> SyncResult<ChangeBatch> {
        self.update(name, |r| {
            r.descriptor.user_matches = user_matches.to_owned();
            r.descriptor.user_exclude_matches = user_exclude_matches.to_owned();
        })
    }

    /// Write one entry of a script's own value store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if nothing is installed under `name`.
    pub fn set_value(
        &self,
        name: &str,
        key: &str,
        value: serde_json::Value,
    ) -> SyncResult<ChangeBatch> {
        self.update(name, |r| {
            r.storage.insert(key.to_owned(), value);
        })
    }

    /// Move a record (descriptor and storage) to a new name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if `from` is not installed and
    /// [`SyncError::NameTaken`] if `to` already is.
    pub fn rename(&self, from: &str, to: &str) -> SyncResult<ChangeBatch> {
        let mut batch = ChangeBatch::new();
        {
            let mut inner = self.write();
            if inner.records.contains_key(to) {
                return Err(SyncError::NameTaken { name: to.into() });
            }
            let Some(old) = inner.records.remove(from) else {
                return Err(SyncError::NotFound { name: from.into() });
            };
            let mut new = old.clone();
            new.descriptor.name = to.to_owned();
            batch.insert(
                record_key(from),
                Change {
                    old_value: Some(record_value(&old)),
                    new_value: None,
                },
            );
            batch.insert(
                record_key(to),
                Change {
                    old_value: None,
                    new_value: Some(record_value(&new)),
                },
            );
            inner.records.insert(to.to_owned(), new);
        }
        tracing::info!(from, to, "renamed");
        Ok(self.emit(batch))
    }

    /// Remove a record and its storage.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if nothing is installed under `name`.
    pub fn delete(&self, name: &str) -> SyncResult<ChangeBatch> {
        let mut batch = ChangeBatch::new();
        {
            let mut inner = self.write();
            let Some(old) = inner.records.remove(name) else {
                return Err(SyncError::NotFound { name: name.into() });
            };
            batch.insert(
                record_key(name),
                Change {
                    old_value: Some(record_value(&old)),
                    new_value: None,
                },
            );
        }
        tracing::info!(identity = name, "deleted");
        Ok(self.emit(batch))
    }

    /// Replace the global exclude preference (space-separated patterns).
    pub fn set_global_excludes(&self, value: &str) -> ChangeBatch {
        let mut batch = ChangeBatch::new();
        {
            let mut inner = self.write();
            let old = std::mem::replace(&mut inner.global_excludes, value.to_owned());
            batch.insert(
                GLOBAL_EXCLUDES_KEY.to_owned(),
                Change {
                    old_value: Some(StoredValue::Preference(old)),
                    new_value: Some(StoredValue::Preference(value.to_owned())),
                },
            );
        }
        self.emit(batch)
    }
}

#[async_trait]
impl DescriptorStore for MemoryStore {
    async fn get(&self, name: &str) -> Option<ScriptDescriptor> {
        self.read().records.get(name).map(|r| r.descriptor.clone())
    }

    async fn names(&self) -> Vec<String> {
        self.read().records.keys().cloned().collect()
    }

    async fn global_excludes(&self) -> Vec<String> {
        split_patterns(&self.read().global_excludes)
    }

    async fn save(&self, descriptor: ScriptDescriptor) -> ChangeBatch {
        self.save_record(descriptor)
    }

    async fn set_error(&self, name: &str, error: Option<String>) {
        if self.update(name, |r| r.descriptor.error = error).is_err() {
            tracing::debug!(identity = name, "error for uninstalled script dropped");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RecordingService
// ═══════════════════════════════════════════════════════════════════════════════

/// One call observed by [`RecordingService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Register(String),
    Unregister(String),
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<ServiceCall>,
    payloads: Vec<RegistrationPayload>,
    live: Vec<String>,
    failing: HashSet<String>,
}

/// [`RegistrationService`] that records calls and tracks live registrations.
///
/// Each call yields once to the scheduler, so concurrent syncs interleave.
#[derive(Debug, Clone, Default)]
pub struct RecordingService {
    state: Arc<Mutex<Recording>>,
}

impl RecordingService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future registration under `id`.
    pub fn fail_on(&self, id: &str) {
        lock(&self.state).failing.insert(id.to_owned());
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        lock(&self.state).calls.clone()
    }

    /// Every accepted payload so far, in order.
    #[must_use]
    pub fn payloads(&self) -> Vec<RegistrationPayload> {
        lock(&self.state).payloads.clone()
    }

    /// Currently live registration ids, sorted (duplicates kept).
    #[must_use]
    pub fn live(&self) -> Vec<String> {
        let mut live = lock(&self.state).live.clone();
        live.sort();
        live
    }

    /// Forget the call log; live registrations are kept.
    pub fn clear_calls(&self) {
        let mut state = lock(&self.state);
        state.calls.clear();
        state.payloads.clear();
    }
}

#[async_trait]
impl RegistrationService for RecordingService {
    async fn register(
        &self,
        payload: RegistrationPayload,
    ) -> Result<Box<dyn RegistrationHandle>, RegistrationError> {
        tokio::task::yield_now().await;
        let id = payload.id.clone();
        {
            let mut state = lock(&self.state);
            state.calls.push(ServiceCall::Register(id.clone()));
            if state.failing.contains(&id) {
                return Err(RegistrationError::Rejected(format!("{id} refused")));
            }
            state.payloads.push(payload);
            state.live.push(id.clone());
        }
        Ok(Box::new(RecordedHandle {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct RecordedHandle {
    id: String,
    state: Arc<Mutex<Recording>>,
}

#[async_trait]
impl RegistrationHandle for RecordedHandle {
    fn id(&self) -> &str {
        &self.id
    }

    async fn unregister(&self) {
        tokio::task::yield_now().await;
        let mut state = lock(&self.state);
        state.calls.push(ServiceCall::Unregister(self.id.clone()));
        if let Some(i) = state.live.iter().position(|l| *l == self.id) {
            state.live.remove(i);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MapFetcher
// ═══════════════════════════════════════════════════════════════════════════════

/// [`Fetcher`] backed by a URL → text map. Unknown URLs fail.
#[derive(Debug, Default)]
pub struct MapFetcher {
    pages: Mutex<HashMap<String, String>>,
    fetched: Mutex<Vec<String>>,
}

impl MapFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(self, url: &str, text: &str) -> Self {
        self.set(url, text);
        self
    }

    /// Serve `text` for `url` from now on.
    pub fn set(&self, url: &str, text: &str) {
        lock(&self.pages).insert(url.to_owned(), text.to_owned());
    }

    /// Every URL requested so far, in order.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        lock(&self.fetched).push(url.to_owned());
        lock(&self.pages)
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network {
                url: url.to_owned(),
                reason: "no such page".into(),
            })
    }
}
