//! Registration synchronizer.
//!
//! Each identity owns one slot: an async mutex around its live handles. A
//! `sync` holds the slot for its whole unregister → build → register run, so
//! syncs of one identity are serialized while different identities proceed
//! concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tokio::sync::mpsc;

use crate::changes::{plan, SyncAction};
use crate::config::{RemoteFailurePolicy, SyncConfig};
use crate::payload::build;
use crate::store::{ChangeBatch, DescriptorStore};
use crate::{Fetcher, RegistrationHandle, RegistrationService};

type Slot = Arc<tokio::sync::Mutex<Vec<Box<dyn RegistrationHandle>>>>;

/// How one `sync` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing stored under the identity.
    Missing,
    /// The descriptor is disabled.
    Disabled,
    /// No matches, include globs or style sections select any page.
    NoSelection,
    /// Payloads were submitted; `failed` of them were rejected.
    Registered { live: usize, failed: usize },
}

/// Keeps live registrations in step with the descriptor store.
pub struct RegistrationSynchronizer {
    store: Arc<dyn DescriptorStore>,
    service: Arc<dyn RegistrationService>,
    fetcher: Arc<dyn Fetcher>,
    config: SyncConfig,
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for RegistrationSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationSynchronizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RegistrationSynchronizer {
    #[must_use]
    pub fn new(
        store: Arc<dyn DescriptorStore>,
        service: Arc<dyn RegistrationService>,
        fetcher: Arc<dyn Fetcher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            service,
            fetcher,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, identity: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(identity.to_owned()).or_default())
    }

    /// Drop the map entry for `identity` once nothing else holds its slot.
    ///
    /// Must be called with the slot's handle list empty. Clones are only
    /// handed out under the map lock, so a strong count of two (map plus
    /// caller) means no other task is waiting on the slot.
    fn release(&self, identity: &str, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = Arc::strong_count(slot) == 2;
        if idle && slots.get(identity).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(identity);
        }
    }

    fn slot_names(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.keys().cloned().collect()
    }

    /// Identities that currently own a slot, sorted.
    #[must_use]
    pub fn tracked(&self) -> Vec<String> {
        let mut names = self.slot_names();
        names.sort();
        names
    }

    /// Number of live registrations held for `identity`.
    pub async fn live_count(&self, identity: &str) -> usize {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(identity).cloned()
        };
        match slot {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }

    /// Re-register `identity` from its stored descriptor.
    ///
    /// Always unregisters first. Registration and (per policy) fetch failures
    /// are recorded into the descriptor's `error`; nothing is retried.
    pub async fn sync(&self, identity: &str) -> SyncOutcome {
        let slot = self.slot(identity);
        let mut handles = slot.lock().await;
        for handle in handles.drain(..) {
            handle.unregister().await;
        }

        let Some(descriptor) = self.store.get(identity).await else {
            tracing::debug!(identity, "not installed, nothing to register");
            self.release(identity, &slot);
            return SyncOutcome::Missing;
        };
        if !descriptor.enabled {
            tracing::debug!(identity, "disabled");
            return SyncOutcome::Disabled;
        }
        if !descriptor.has_selection() {
            tracing::debug!(identity, "no page selection");
            return SyncOutcome::NoSelection;
        }

        let global_excludes = self.store.global_excludes().await;
        let built = build(&descriptor, &global_excludes, self.fetcher.as_ref()).await;

        let mut errors: Vec<String> = Vec::new();
        if self.config.remote_failure == RemoteFailurePolicy::RecordError {
            errors.extend(built.fetch_failures.iter().map(ToString::to_string));
        }

        let mut failed = 0;
        for payload in built.payloads {
            let id = payload.id.clone();
            match self.service.register(payload).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!(identity, id = %id, error = %e, "registration failed");
                    failed += 1;
                    errors.push(e.to_string());
                }
            }
        }

        if !errors.is_empty() {
            self.store.set_error(identity, Some(errors.join("; "))).await;
        } else if descriptor.error.is_some() {
            self.store.set_error(identity, None).await;
        }

        tracing::info!(identity, live = handles.len(), failed, "registered");
        SyncOutcome::Registered {
            live: handles.len(),
            failed,
        }
    }

    /// Destroy every live registration of `identity`.
    pub async fn unregister(&self, identity: &str) {
        let slot = self.slot(identity);
        let mut handles = slot.lock().await;
        let count = handles.len();
        for handle in handles.drain(..) {
            handle.unregister().await;
        }
        if self.store.get(identity).await.is_none() {
            self.release(identity, &slot);
        }
        tracing::info!(identity, count, "unregistered");
    }

    /// Re-register every installed identity and release identities that are
    /// no longer installed.
    pub async fn sync_all(&self) {
        let names = self.store.names().await;
        let orphans: Vec<String> = self
            .slot_names()
            .into_iter()
            .filter(|slot| !names.contains(slot))
            .collect();

        join_all(orphans.iter().map(|name| self.unregister(name))).await;
        join_all(names.iter().map(|name| self.sync(name))).await;
        tracing::debug!(identities = names.len(), "synced all");
    }

    /// Execute the plan for one change batch.
    pub async fn apply(&self, batch: &ChangeBatch) {
        let actions = plan(batch);
        let mut syncs = Vec::new();
        let mut sync_all = false;
        let mut unregisters = Vec::new();
        for action in &actions {
            match action {
                SyncAction::Unregister(name) => unregisters.push(name.as_str()),
                SyncAction::Sync(name) => syncs.push(name.as_str()),
                SyncAction::SyncAll => sync_all = true,
            }
        }

        join_all(unregisters.into_iter().map(|name| self.unregister(name))).await;
        if sync_all {
            self.sync_all().await;
        } else {
            join_all(syncs.into_iter().map(|name| self.sync(name))).await;
        }
    }

    /// Apply change batches in delivery order until the sender closes.
    pub async fn run(&self, mut changes: mpsc::UnboundedReceiver<ChangeBatch>) {
        while let Some(batch) = changes.recv().await {
            self.apply(&batch).await;
        }
        tracing::debug!("change stream closed");
    }
}
