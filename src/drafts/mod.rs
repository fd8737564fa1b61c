//! Draft persistence.
//!
//! This module provides:
//! - Keyed JSON storage (file-backed and in-memory)
//! - The capped, newest-first draft list
//! - An optional vault sink that mirrors saved drafts

pub mod kv;
pub mod store;
pub mod vault;

pub use kv::{JsonFileStore, KeyValueStore};
pub use store::{DraftStore, SavedDraft};
pub use vault::{DirectoryVault, VaultSink};

use anyhow::Result;

use crate::statblock::StatBlockDraft;

/// Saves `draft` to the store, then mirrors it to `vault` if one is given.
///
/// Only the store write can fail the save; vault errors are logged.
pub fn save_draft<S: KeyValueStore>(
    store: &mut DraftStore<S>,
    vault: Option<&dyn VaultSink>,
    draft: &StatBlockDraft,
) -> Result<SavedDraft> {
    let saved = store.add(draft)?;

    if let Some(vault) = vault {
        match vault.save(draft) {
            Ok(()) => crate::log(&format!("Vault: mirrored draft {}", draft.id)),
            Err(e) => crate::log(&format!("Vault: failed to mirror draft {}: {:#}", draft.id, e)),
        }
    }

    Ok(saved)
}
