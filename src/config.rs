//! Application configuration.
//!
//! Loads settings from config.json at startup. Missing fields take their
//! defaults; a missing or malformed file falls back to the defaults entirely.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::drafts::store::{DEFAULT_CAPACITY, DEFAULT_STORAGE_KEY};
use crate::ocr::{EngineOptions, PrepareOptions};
use crate::pipeline::PipelineOptions;
use crate::statblock::DraftSource;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tesseract language tag(s), e.g. "eng" or "eng+deu"
    pub language: String,
    /// Tesseract `--psm` value
    pub page_segmentation_mode: u8,
    /// Narrower screenshots are upscaled to this width before recognition
    pub upscale_min_width: u32,
    /// Luma cutoff for binarization; `None` keeps grayscale
    pub binarize_threshold: Option<u8>,
    /// Maximum number of saved drafts
    pub draft_capacity: usize,
    /// Key the draft list is stored under
    pub storage_key: String,
    /// Storage file; defaults to the per-user data dir
    pub storage_file: Option<PathBuf>,
    pub source_label: String,
    pub source_type: String,
    /// Saved drafts are mirrored here when set
    pub vault_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let source = DraftSource::default();
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: 4,
            upscale_min_width: 1200,
            binarize_threshold: None,
            draft_capacity: DEFAULT_CAPACITY,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_file: None,
            source_label: source.label,
            source_type: source.source_type,
            vault_dir: None,
        }
    }
}

impl AppConfig {
    pub fn storage_path(&self) -> PathBuf {
        self.storage_file
            .clone()
            .unwrap_or_else(crate::paths::default_storage_file)
    }

    pub fn source(&self) -> DraftSource {
        DraftSource {
            label: self.source_label.clone(),
            source_type: self.source_type.clone(),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            language: self.language.clone(),
            source: self.source(),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            page_segmentation_mode: self.page_segmentation_mode,
            prepare: PrepareOptions {
                upscale_min_width: self.upscale_min_width,
                binarize_threshold: self.binarize_threshold,
            },
        }
    }
}

/// Loads configuration from `path`, or returns defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    crate::log(&format!("Looking for config at: {}", path.display()));

    if !path.exists() {
        crate::log("config.json not found. Using default config.");
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                crate::log("Config loaded from config.json");
                config
            }
            Err(e) => {
                crate::log(&format!(
                    "Failed to parse config.json: {}. Using defaults.",
                    e
                ));
                AppConfig::default()
            }
        },
        Err(e) => {
            crate::log(&format!(
                "Failed to read config.json: {}. Using defaults.",
                e
            ));
            AppConfig::default()
        }
    }
}

/// Initializes the global configuration from `path`, or from config.json
/// next to the executable.
pub fn init_config(path: Option<&Path>) {
    let default_path = crate::paths::get_exe_dir().join("config.json");
    let _ = CONFIG.set(load_config_from(path.unwrap_or(&default_path)));
}

/// Returns the global configuration, or defaults before `init_config`.
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "language": "eng+deu", "draft_capacity": 25, "vault_dir": "/tmp/vault" }"#,
        )
        .unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.language, "eng+deu");
        assert_eq!(config.draft_capacity, 25);
        assert_eq!(config.vault_dir, Some(PathBuf::from("/tmp/vault")));
        assert_eq!(config.page_segmentation_mode, 4);
        assert_eq!(config.storage_key, "statblockImporterDraftsV1");
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ language: ").unwrap();
        assert_eq!(load_config_from(&path), AppConfig::default());
    }

    #[test]
    fn test_derived_options() {
        let config = AppConfig {
            language: "deu".to_string(),
            page_segmentation_mode: 6,
            binarize_threshold: Some(150),
            source_label: "Bestiary Scan".to_string(),
            storage_file: Some(PathBuf::from("/data/drafts.json")),
            ..AppConfig::default()
        };

        let pipeline = config.pipeline_options();
        assert_eq!(pipeline.language, "deu");
        assert_eq!(pipeline.source.label, "Bestiary Scan");
        assert_eq!(pipeline.source.source_type, "homebrew");

        let engine = config.engine_options();
        assert_eq!(engine.page_segmentation_mode, 6);
        assert_eq!(engine.prepare.upscale_min_width, 1200);
        assert_eq!(engine.prepare.binarize_threshold, Some(150));

        assert_eq!(config.storage_path(), PathBuf::from("/data/drafts.json"));
    }
}
