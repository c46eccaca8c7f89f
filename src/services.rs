//! Contracts for the external engines the app relies on.
//!
//! Detection, translation, and text recognition are black boxes behind these
//! traits. Concrete implementations live in [`crate::translator`] and
//! [`crate::ocr`]; tests substitute their own.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Failures reported by a translation or recognition engine.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The engine answered with a non-success status.
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to run {command}: {source}")]
    Process {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A required external program is not installed.
    #[error("{0} not found in PATH")]
    MissingDependency(String),

    #[error("no text found in the image")]
    NoText,

    #[error("{0}")]
    Other(String),
}

/// Identifies the language of a piece of text.
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Returns a language code, or `None` when the language can't be
    /// identified with enough confidence.
    async fn detect(&self, text: &str) -> Option<String>;
}

/// Translates text between two language codes.
///
/// Implementations need not enforce a deadline; callers wrap the call in a
/// timeout.
#[async_trait]
pub trait TextTranslator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_code: &str,
        target_code: &str,
    ) -> Result<String, ServiceError>;
}

/// Extracts text blocks from an image file.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Returns the recognized blocks in reading order.
    ///
    /// An image without any text is reported as [`ServiceError::NoText`].
    async fn recognize(&self, image: &Path) -> Result<Vec<String>, ServiceError>;
}
