//! Remote update checks.
//!
//! Each tick takes the next bounded batch of auto-updating descriptors
//! (round-robin across ticks), fetches their `update_url`, and replaces the
//! stored descriptor when the fetched version is newer. Saving goes through the
//! store, so the resulting change batch drives re-registration as usual.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::future::join_all;

use usm::ScriptDescriptor;

use crate::store::DescriptorStore;
use crate::{Fetcher, SyncConfig, SyncResult};

/// Compare two dotted version strings numerically.
///
/// Missing components count as zero; each component contributes its leading
/// digits only, so `1.10` > `1.9` and `2.0` == `2`.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn component(part: &str) -> u64 {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().unwrap_or(0)
    }
    let a: Vec<u64> = a.trim().split('.').map(component).collect();
    let b: Vec<u64> = b.trim().split('.').map(component).collect();
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Whether `candidate` should replace `current`.
#[must_use]
pub fn is_newer(candidate: Option<&str>, current: Option<&str>) -> bool {
    match (candidate, current) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(c), Some(cur)) => compare_versions(c, cur) == Ordering::Greater,
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Names checked this tick.
    pub checked: Vec<String>,
    /// Names replaced by a newer version.
    pub updated: Vec<String>,
}

/// Round-robin remote update poller.
pub struct UpdateChecker {
    store: Arc<dyn DescriptorStore>,
    fetcher: Arc<dyn Fetcher>,
    batch_size: usize,
    cursor: AtomicUsize,
}

impl std::fmt::Debug for UpdateChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateChecker")
            .field("batch_size", &self.batch_size)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl UpdateChecker {
    #[must_use]
    pub fn new(
        store: Arc<dyn DescriptorStore>,
        fetcher: Arc<dyn Fetcher>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            batch_size: config.update_batch_size.max(1),
            cursor: AtomicUsize::new(0),
        }
    }

    async fn candidates(&self) -> Vec<ScriptDescriptor> {
        let mut out = Vec::new();
        for name in self.store.names().await {
            if let Some(d) = self.store.get(&name).await {
                if d.auto_update && d.update_url.is_some() {
                    out.push(d);
                }
            }
        }
        out
    }

    /// Check the next batch.
    pub async fn tick(&self) -> UpdateReport {
        let candidates = self.candidates().await;
        if candidates.is_empty() {
            return UpdateReport::default();
        }

        let take = self.batch_size.min(candidates.len());
        let start = self.cursor.fetch_add(take, AtomicOrdering::Relaxed) % candidates.len();
        let batch: Vec<&ScriptDescriptor> = candidates
            .iter()
            .cycle()
            .skip(start)
            .take(take)
            .collect();

        let results = join_all(batch.iter().map(|d| self.check(d))).await;

        let mut report = UpdateReport::default();
        for (d, result) in batch.iter().zip(results) {
            report.checked.push(d.name.clone());
            match result {
                Ok(true) => report.updated.push(d.name.clone()),
                Ok(false) => {}
                Err(e) => tracing::warn!(identity = %d.name, error = %e, "update omitted"),
            }
        }
        tracing::debug!(
            checked = report.checked.len(),
            updated = report.updated.len(),
            "update tick"
        );
        report
    }

    async fn check(&self, current: &ScriptDescriptor) -> SyncResult<bool> {
        let Some(url) = current.update_url.as_deref() else {
            return Ok(false);
        };
        let text = self.fetcher.fetch(url).await?;
        let mut fresh =
            usm::try_parse(&text, &current.user_matches, &current.user_exclude_matches)?;
        if !is_newer(fresh.version.as_deref(), current.version.as_deref()) {
            return Ok(false);
        }

        fresh.name.clone_from(&current.name);
        fresh.enabled = current.enabled;
        fresh.user_run_at = current.user_run_at;
        tracing::info!(
            identity = %current.name,
            from = current.version.as_deref().unwrap_or("-"),
            to = fresh.version.as_deref().unwrap_or("-"),
            "updated"
        );
        self.store.save(fresh).await;
        Ok(true)
    }
}
