//! Change policy — which store changes require re-registration.
//!
//! Only fields that affect what gets registered count
//! ([`ScriptDescriptor::registration_eq`]); editing a description, bumping a
//! version or recording an error never churns live registrations.

use usm::ScriptDescriptor;

use crate::store::{record_name, ChangeBatch, StoredValue, GLOBAL_EXCLUDES_KEY};

/// What the synchronizer does in response to a change batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Re-register one identity.
    Sync(String),
    /// Destroy every live registration of one identity.
    Unregister(String),
    /// Re-register every installed identity.
    SyncAll,
}

fn descriptor(value: Option<&StoredValue>) -> Option<&ScriptDescriptor> {
    value.and_then(StoredValue::descriptor)
}

/// Plan the actions for one change batch.
///
/// Unregisters come first, so a rename releases the old identity before the
/// new one registers. A changed global-exclude preference collapses every
/// other sync into one [`SyncAction::SyncAll`].
#[must_use]
pub fn plan(batch: &ChangeBatch) -> Vec<SyncAction> {
    let mut unregisters = Vec::new();
    let mut syncs = Vec::new();
    let mut sync_all = false;

    for (key, change) in batch {
        if key == GLOBAL_EXCLUDES_KEY {
            sync_all |= change.old_value != change.new_value;
            continue;
        }
        let Some(name) = record_name(key) else {
            continue;
        };
        let old = descriptor(change.old_value.as_ref());
        let new = descriptor(change.new_value.as_ref());
        match (old, new) {
            (Some(_), None) => unregisters.push(SyncAction::Unregister(name.to_owned())),
            (None, Some(_)) => syncs.push(SyncAction::Sync(name.to_owned())),
            (Some(old), Some(new)) if !old.registration_eq(new) => {
                syncs.push(SyncAction::Sync(name.to_owned()));
            }
            _ => {}
        }
    }

    tracing::debug!(
        keys = batch.len(),
        unregisters = unregisters.len(),
        syncs = syncs.len(),
        sync_all,
        "planned change batch"
    );

    if sync_all {
        unregisters.push(SyncAction::SyncAll);
        unregisters
    } else {
        unregisters.extend(syncs);
        unregisters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{record_key, Change, ScriptRecord};
    use usm::Kind;

    fn record(name: &str, matches: &[&str]) -> StoredValue {
        let mut d = ScriptDescriptor::new(Kind::Script, "code");
        d.name = name.into();
        d.matches = matches.iter().map(|m| (*m).to_owned()).collect();
        StoredValue::Record(Box::new(ScriptRecord::new(d)))
    }

    fn change(old: Option<StoredValue>, new: Option<StoredValue>) -> Change {
        Change {
            old_value: old,
            new_value: new,
        }
    }

    #[test]
    fn added_removed_changed() {
        let mut batch = ChangeBatch::new();
        batch.insert(record_key("added"), change(None, Some(record("added", &["*://a/*"]))));
        batch.insert(record_key("gone"), change(Some(record("gone", &["*://g/*"])), None));
        batch.insert(
            record_key("moved"),
            change(
                Some(record("moved", &["*://x/*"])),
                Some(record("moved", &["*://y/*"])),
            ),
        );
        assert_eq!(
            plan(&batch),
            vec![
                SyncAction::Unregister("gone".into()),
                SyncAction::Sync("added".into()),
                SyncAction::Sync("moved".into()),
            ]
        );
    }

    #[test]
    fn informational_edits_are_ignored() {
        let old = record("s", &["*://a/*"]);
        let mut new = old.clone();
        if let StoredValue::Record(r) = &mut new {
            r.descriptor.description = Some("now documented".into());
            r.descriptor.error = Some("boom".into());
            r.storage.insert("count".into(), serde_json::json!(3));
        }
        let mut batch = ChangeBatch::new();
        batch.insert(record_key("s"), change(Some(old), Some(new)));
        assert!(plan(&batch).is_empty());
    }

    #[test]
    fn global_excludes_force_sync_all() {
        let mut batch = ChangeBatch::new();
        batch.insert(
            GLOBAL_EXCLUDES_KEY.into(),
            change(None, Some(StoredValue::Preference("*://bank.com/*".into()))),
        );
        batch.insert(record_key("a"), change(None, Some(record("a", &["*://a/*"]))));
        batch.insert(record_key("z"), change(Some(record("z", &["*://z/*"])), None));
        assert_eq!(
            plan(&batch),
            vec![SyncAction::Unregister("z".into()), SyncAction::SyncAll]
        );
    }

    #[test]
    fn unchanged_preference_is_ignored() {
        let pref = StoredValue::Preference("*://bank.com/*".into());
        let mut batch = ChangeBatch::new();
        batch.insert(GLOBAL_EXCLUDES_KEY.into(), change(Some(pref.clone()), Some(pref)));
        batch.insert("theme".into(), change(None, Some(StoredValue::Preference("dark".into()))));
        assert!(plan(&batch).is_empty());
    }
}
