//! Configuration for the translator.
//!
//! Handles loading configuration from environment variables and .env files.

use crate::session::{SessionSettings, DEFAULT_MIN_DETECTION_CHARS};
use crate::store::default_store_path;
use crate::translator::{TranslationBackend, DEFAULT_DETECTION_CONFIDENCE};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the translation API endpoint.
    pub translation_api_url: String,

    /// Which translation backend to use (google or libretranslate).
    pub translation_backend: TranslationBackend,

    /// Deadline for one translation call.
    pub translate_timeout: Duration,

    /// Minimum confidence threshold for language detection (0.0 to 1.0).
    pub detection_confidence_threshold: f64,

    /// Inputs shorter than this many characters are not auto-detected.
    pub min_detection_chars: usize,

    /// SQLite database holding the translation history.
    pub database_path: PathBuf,

    /// OCR binary.
    pub tesseract_bin: String,

    /// Command used to take a picture for `:scan camera`.
    pub camera_command: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `TRANSLATION_BACKEND`: "google" (default) or "libretranslate"
    /// - `TRANSLATION_API_URL`: Translation API server URL (default depends on backend)
    /// - `TRANSLATE_TIMEOUT_SECS`: Per-translation deadline (default: 10)
    /// - `DETECTION_CONFIDENCE`: Minimum confidence for language detection (default: 0.6)
    /// - `MIN_DETECTION_CHARS`: Minimum input length before detection runs (default: 5)
    /// - `DATABASE_PATH`: History database (default: data/translations.db)
    /// - `TESSERACT_BIN`: OCR binary (default: tesseract)
    /// - `CAMERA_COMMAND`: Capture command (default: fswebcam)
    pub fn load() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Parse translation backend (default to Google)
        let translation_backend: TranslationBackend = lookup("TRANSLATION_BACKEND")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default();

        // Set default URL based on backend
        let default_url = match translation_backend {
            TranslationBackend::Google => "http://localhost:4000",
            TranslationBackend::LibreTranslate => "http://localhost:5000/translate",
        };

        let translation_api_url =
            lookup("TRANSLATION_API_URL").unwrap_or_else(|| default_url.to_string());

        let timeout_secs: u64 = lookup("TRANSLATE_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("TRANSLATE_TIMEOUT_SECS must be a valid positive number")?;
        if timeout_secs == 0 {
            bail!("TRANSLATE_TIMEOUT_SECS must be greater than zero");
        }

        let detection_confidence_threshold: f64 = lookup("DETECTION_CONFIDENCE")
            .unwrap_or_else(|| DEFAULT_DETECTION_CONFIDENCE.to_string())
            .parse()
            .context("DETECTION_CONFIDENCE must be a valid number between 0.0 and 1.0")?;
        if !(0.0..=1.0).contains(&detection_confidence_threshold) {
            bail!("DETECTION_CONFIDENCE must be between 0.0 and 1.0");
        }

        let min_detection_chars: usize = lookup("MIN_DETECTION_CHARS")
            .unwrap_or_else(|| DEFAULT_MIN_DETECTION_CHARS.to_string())
            .parse()
            .context("MIN_DETECTION_CHARS must be a valid positive number")?;

        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_store_path);

        let tesseract_bin = lookup("TESSERACT_BIN").unwrap_or_else(|| "tesseract".to_string());
        let camera_command = lookup("CAMERA_COMMAND").unwrap_or_else(|| "fswebcam".to_string());

        Ok(Config {
            translation_api_url,
            translation_backend,
            translate_timeout: Duration::from_secs(timeout_secs),
            detection_confidence_threshold,
            min_detection_chars,
            database_path,
            tesseract_bin,
            camera_command,
        })
    }

    /// Session tunables derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            translate_timeout: self.translate_timeout,
            min_detection_chars: self.min_detection_chars,
        }
    }
}
