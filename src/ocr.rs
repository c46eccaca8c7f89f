//! Text recognition from images.
//!
//! Images come from a file picked by the user (gallery) or from a capture
//! command (camera). Recognition shells out to the `tesseract` CLI, and the
//! recognized blocks are offered to the user for selection.

use crate::services::{ServiceError, TextRecognizer};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors of the image-to-text flow.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The image source selector could not be parsed. Ends the flow.
    #[error("invalid image source: {0:?}")]
    InvalidSource(String),

    #[error("image not found: {0}")]
    MissingImage(PathBuf),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Where the image to scan comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Camera,
    Gallery,
}

impl ImageSource {
    /// Parses a navigation selector: `camera`/`1` or `gallery`/`2`.
    pub fn from_selector(selector: &str) -> Result<Self, OcrError> {
        match selector.trim().to_lowercase().as_str() {
            "1" | "camera" => Ok(ImageSource::Camera),
            "2" | "gallery" => Ok(ImageSource::Gallery),
            other => Err(OcrError::InvalidSource(other.to_string())),
        }
    }
}

/// Verifies that a required external command is installed and accessible on PATH.
fn check_dependency(command: &str) -> Result<(), ServiceError> {
    match std::process::Command::new("which")
        .arg(command)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        _ => Err(ServiceError::MissingDependency(command.to_string())),
    }
}

/// Runs the camera capture command, writing a picture to `dest`.
///
/// The command is invoked as `<command> <dest>` (e.g. `fswebcam`).
pub async fn capture_image(command: &str, dest: &Path) -> Result<(), OcrError> {
    check_dependency(command)?;

    let status = tokio::process::Command::new(command)
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|source| ServiceError::Process {
            command: command.to_string(),
            source,
        })?;

    if !status.success() || !dest.exists() {
        return Err(OcrError::Service(ServiceError::Other(format!(
            "{} did not produce an image",
            command
        ))));
    }
    Ok(())
}

/// [`TextRecognizer`] backed by the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<Vec<String>, ServiceError> {
        check_dependency(&self.binary)?;

        let output = tokio::process::Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ServiceError::Process {
                command: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract failed: {}", stderr.trim());
            return Err(ServiceError::Other(stderr.trim().to_string()));
        }

        let blocks = split_blocks(&String::from_utf8_lossy(&output.stdout));
        if blocks.is_empty() {
            return Err(ServiceError::NoText);
        }

        debug!("Recognized {} text blocks in {:?}", blocks.len(), image);
        Ok(blocks)
    }
}

/// Splits raw OCR output into paragraphs separated by blank lines.
///
/// Lines inside a paragraph are joined with a single space.
fn split_blocks(raw: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join(" "));
    }

    blocks
}

/// Recognized text blocks for one image, plus a one-shot error signal.
pub struct TextSelection {
    recognizer: Arc<dyn TextRecognizer>,
    blocks: Vec<String>,
    error: bool,
}

impl TextSelection {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            recognizer,
            blocks: Vec::new(),
            error: false,
        }
    }

    /// Runs recognition on `image`, replacing the current blocks on success.
    ///
    /// On failure the previous blocks are kept and the error flag is raised.
    pub async fn fetch(&mut self, image: &Path) -> Result<&[String], OcrError> {
        if !image.exists() {
            self.error = true;
            return Err(OcrError::MissingImage(image.to_path_buf()));
        }

        let result = self.recognizer.recognize(image).await;
        match result {
            Ok(blocks) => {
                self.blocks = blocks;
                Ok(&self.blocks)
            }
            Err(e) => {
                warn!("Error fetching text from image: {}", e);
                self.error = true;
                Err(e.into())
            }
        }
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Returns the chosen block, if the index is in range.
    pub fn select(&self, index: usize) -> Option<&str> {
        self.blocks.get(index).map(String::as_str)
    }

    /// Returns whether an error is pending and clears it.
    pub fn take_error(&mut self) -> bool {
        std::mem::take(&mut self.error)
    }
}
