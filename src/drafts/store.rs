//! Capped, newest-first persistence of saved drafts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kv::KeyValueStore;
use crate::log;
use crate::statblock::StatBlockDraft;

/// Maximum number of drafts kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// Storage key the draft list lives under.
pub const DEFAULT_STORAGE_KEY: &str = "statblockImporterDraftsV1";

/// A draft as persisted, with the time it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDraft {
    #[serde(flatten)]
    pub draft: StatBlockDraft,
    #[serde(rename = "_savedAt")]
    pub saved_at: DateTime<Utc>,
}

/// Draft list stored under one key of a [`KeyValueStore`].
///
/// New drafts go to the front; anything beyond `capacity` is evicted from
/// the back.
pub struct DraftStore<S: KeyValueStore> {
    store: S,
    key: String,
    capacity: usize,
}

impl<S: KeyValueStore> DraftStore<S> {
    pub fn new(store: S, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            store,
            key: key.into(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the saved drafts, newest first.
    ///
    /// Unreadable storage and malformed records read as absent.
    pub fn list(&self) -> Vec<SavedDraft> {
        let mut drafts: Vec<SavedDraft> = self
            .raw_records()
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    log(&format!("Draft store: skipping malformed draft: {}", e));
                    None
                }
            })
            .collect();
        drafts.truncate(self.capacity);
        drafts
    }

    /// Saves `draft` at the front of the list.
    ///
    /// A stored record with the same id is replaced. Other stored records are
    /// kept as they are, even ones `list` cannot read.
    pub fn add(&mut self, draft: &StatBlockDraft) -> Result<SavedDraft> {
        let saved = SavedDraft {
            draft: draft.clone(),
            saved_at: Utc::now(),
        };
        let record = serde_json::to_value(&saved).context("Failed to serialize draft")?;

        let mut records = self.raw_records();
        records.retain(|item| item.get("id").and_then(Value::as_str) != Some(draft.id.as_str()));
        records.insert(0, record);
        records.truncate(self.capacity);
        let count = records.len();

        self.store
            .set(&self.key, Value::Array(records))
            .context("Failed to write drafts")?;

        log(&format!(
            "Draft store: saved '{}' ({}), {} drafts stored",
            draft.name(),
            draft.id,
            count
        ));

        Ok(saved)
    }

    /// The stored records as untyped JSON, or empty when unreadable.
    fn raw_records(&self) -> Vec<Value> {
        match self.store.get(&self.key) {
            Ok(Some(Value::Array(items))) => items,
            Ok(Some(_)) => {
                log("Draft store: stored drafts are not a list, ignoring");
                Vec::new()
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                log(&format!("Draft store: failed to read drafts: {:#}", e));
                Vec::new()
            }
        }
    }
}
