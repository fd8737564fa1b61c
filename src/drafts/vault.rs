use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::statblock::StatBlockDraft;

/// An optional secondary destination for saved drafts.
pub trait VaultSink {
    fn save(&self, draft: &StatBlockDraft) -> Result<()>;
}

/// Writes each draft as `<id>.json` into a directory.
pub struct DirectoryVault {
    dir: PathBuf,
}

impl DirectoryVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl VaultSink for DirectoryVault {
    fn save(&self, draft: &StatBlockDraft) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create vault dir: {}", self.dir.display()))?;

        let path = self.dir.join(format!("{}.json", draft.id));
        let json = draft
            .to_json_pretty()
            .context("Failed to serialize draft for vault")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write vault file: {}", path.display()))?;
        Ok(())
    }
}
