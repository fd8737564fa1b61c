use anyhow::{anyhow, Context, Result};
use std::process::Command;
use std::sync::OnceLock;
use tempfile::NamedTempFile;

use super::preprocess::{prepare_for_ocr, PrepareOptions};
use super::setup::{ensure_tesseract, TesseractPaths};
use crate::log;

/// An external text recognizer.
///
/// Loading happens at most once per engine; after that the engine is shared
/// read-only between runs.
pub trait RecognitionEngine: Send + Sync {
    /// True once `load` has succeeded.
    fn is_loaded(&self) -> bool;

    /// Makes the engine ready to recognize `language`.
    fn load(&self, language: &str) -> Result<()>;

    /// Recognizes the text in `image`, reporting fractional progress in [0, 1].
    fn recognize(
        &self,
        image: &[u8],
        language: &str,
        progress: &mut dyn FnMut(f32),
    ) -> Result<String>;
}

/// Tesseract settings for one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Tesseract `--psm` value.
    pub page_segmentation_mode: u8,
    pub prepare: PrepareOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            page_segmentation_mode: 4, // Single column of text of variable sizes
            prepare: PrepareOptions::default(),
        }
    }
}

/// Runs the Tesseract command-line tool on prepared images.
pub struct TesseractEngine {
    paths: OnceLock<TesseractPaths>,
    options: EngineOptions,
}

impl TesseractEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            paths: OnceLock::new(),
            options,
        }
    }
}

impl RecognitionEngine for TesseractEngine {
    fn is_loaded(&self) -> bool {
        self.paths.get().is_some()
    }

    fn load(&self, language: &str) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }
        let paths = ensure_tesseract(language)?;
        // A concurrent load may have won the race; either result is equivalent.
        let _ = self.paths.set(paths);
        Ok(())
    }

    fn recognize(
        &self,
        image: &[u8],
        language: &str,
        progress: &mut dyn FnMut(f32),
    ) -> Result<String> {
        let paths = self
            .paths
            .get()
            .ok_or_else(|| anyhow!("Tesseract has not been loaded"))?;

        progress(0.0);

        let prepared = prepare_for_ocr(image, &self.options.prepare)?;
        log(&format!(
            "Recognizing {}x{} image (lang={}, psm={})",
            prepared.width(),
            prepared.height(),
            language,
            self.options.page_segmentation_mode
        ));

        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        prepared
            .save(temp_input.path())
            .context("Failed to write temporary image")?;

        progress(0.2);

        // Run Tesseract to stdout
        let output = Command::new(&paths.executable)
            .arg(temp_input.path())
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&paths.tessdata)
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(self.options.page_segmentation_mode.to_string())
            .output()
            .with_context(|| format!("Failed to run {}", paths.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        progress(1.0);

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
