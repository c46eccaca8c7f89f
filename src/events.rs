//! One-shot notifications published by a translation session.
//!
//! The presentation layer turns these into toasts. They are produced
//! alongside state changes on the session's watch channel and are serialized
//! as JSON for the `--json` output mode.

use crate::store::RecordId;
use serde::Serialize;

/// Envelope for all session notifications.
///
/// Uses Serde's internally tagged representation so each JSON message
/// includes a `"type"` field identifying the variant:
///
/// ```json
/// { "type": "Saved", "id": 3, "created": true, "timestamp": 1700000000000 }
/// { "type": "TranslationFailed", "reason": "timed out", "timestamp": ... }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// The source language was filled in by detection.
    LanguageDetected(LanguageDetectedEvent),
    /// A record was written to the store.
    Saved(SavedEvent),
    /// Persisting the current record failed.
    SaveFailed(FailureEvent),
    /// A translation attempt failed or timed out.
    TranslationFailed(FailureEvent),
    /// An existing record could not be loaded.
    LoadFailed(FailureEvent),
}

/// Detection result surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageDetectedEvent {
    /// Language code reported by the detector (e.g., "es").
    pub code: String,
    /// Display name (e.g., "Spanish").
    pub name: String,
    /// Unix timestamp in milliseconds when this event was created.
    pub timestamp: u64,
}

/// Confirmation that a record was persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedEvent {
    pub id: RecordId,
    /// `true` for a new row, `false` for an in-place update.
    pub created: bool,
    /// Unix timestamp in milliseconds when this event was created.
    pub timestamp: u64,
}

/// A user-visible failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEvent {
    pub reason: String,
    /// Unix timestamp in milliseconds when this event was created.
    pub timestamp: u64,
}

impl FailureEvent {
    pub fn now(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            timestamp: current_timestamp_ms(),
        }
    }
}

/// Returns the current time as Unix milliseconds.
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
