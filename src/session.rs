//! The translation editing session.
//!
//! A [`TranslationSession`] owns the state of one editing interaction: the
//! input text, the selected source/target languages, and the latest
//! translation. It drives detection when the source language is unknown,
//! translation once both languages are known, and persistence of the result.
//!
//! State is published on a `watch` channel ([`TranslationSession::subscribe`])
//! and one-shot notifications on a `broadcast` channel
//! ([`TranslationSession::events`]). All methods take `&self`, so a session can
//! be shared between an input loop and background tasks.

use crate::events::{
    current_timestamp_ms, FailureEvent, LanguageDetectedEvent, SavedEvent, SessionEvent,
};
use crate::languages::{LanguageDictionary, Vocabulary};
use crate::services::{LanguageDetector, ServiceError, TextTranslator};
use crate::store::{RecordId, StoreError, TranslationRecord, TranslationStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Shown in place of the result while a translation is in flight.
pub const TRANSLATING_PLACEHOLDER: &str = "Translating...";

/// Default upper bound for one translation call.
pub const DEFAULT_TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Inputs shorter than this (in characters) are not sent to the detector.
pub const DEFAULT_MIN_DETECTION_CHARS: usize = 5;

/// Capacity of the event channel. Slow subscribers lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub translate_timeout: Duration,
    pub min_detection_chars: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            translate_timeout: DEFAULT_TRANSLATE_TIMEOUT,
            min_detection_chars: DEFAULT_MIN_DETECTION_CHARS,
        }
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionPhase {
    /// No input text.
    #[default]
    Idle,
    /// Text present, source language unknown.
    AwaitingDetection,
    /// Source known, waiting for the user to pick a target.
    AwaitingTarget,
    /// A translation call is in flight.
    Translating,
    /// `translated_text` holds a result.
    Ready,
    /// The last translation or load failed.
    Error,
}

/// Observable snapshot of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Display name of the source language.
    pub source_language: Option<String>,
    /// Display name of the target language.
    pub target_language: Option<String>,
    /// Empty, [`TRANSLATING_PLACEHOLDER`], or the latest result.
    pub translated_text: String,
    /// Raised by failed translations and loads; cleared by
    /// [`TranslationSession::take_error`] or the next user input.
    pub error: bool,
}

impl SessionState {
    fn has_result(&self) -> bool {
        !self.translated_text.is_empty() && self.translated_text != TRANSLATING_PLACEHOLDER
    }
}

/// Which language slot a selection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageRole {
    Source,
    Target,
}

impl LanguageRole {
    /// The vocabulary valid for this slot.
    pub fn vocabulary(self) -> Vocabulary {
        match self {
            LanguageRole::Source => Vocabulary::Detection,
            LanguageRole::Target => Vocabulary::Translation,
        }
    }
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation needs input text and languages that aren't set yet.
    #[error("not enough data: enter text and pick the languages first")]
    Incomplete,

    #[error("{name:?} is not a valid {vocabulary} language")]
    UnknownLanguage { name: String, vocabulary: Vocabulary },

    #[error("translation timed out after {0:?}")]
    Timeout(Duration),

    #[error("translation failed: {0}")]
    Translation(#[source] ServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a translation attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateOutcome {
    /// The result was applied to the session.
    Ready {
        text: String,
        /// Id the record was saved under, if it was persisted.
        saved: Option<RecordId>,
    },
    /// Input or languages changed while the call was in flight; the result
    /// was discarded.
    Superseded,
}

/// Session data that is not part of the observable state.
#[derive(Debug)]
struct Control {
    input: String,
    /// Record this session edits, once known.
    existing_id: Option<RecordId>,
    /// Set right after a load (or reset); a translation finishing while it is
    /// set does not persist the record.
    initial_render: bool,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            input: String::new(),
            existing_id: None,
            initial_render: true,
        }
    }
}

/// Orchestrates detection, translation, and persistence for one editing session.
pub struct TranslationSession {
    dictionary: Arc<LanguageDictionary>,
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn TextTranslator>,
    store: Arc<dyn TranslationStore>,
    settings: SessionSettings,

    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    control: Mutex<Control>,

    /// Re-entrancy guard: set while a detection call is outstanding.
    detecting: AtomicBool,
    /// Bumped on every input or language change; translation results from an
    /// older generation are dropped.
    generation: AtomicU64,
}

impl TranslationSession {
    pub fn new(
        dictionary: Arc<LanguageDictionary>,
        detector: Arc<dyn LanguageDetector>,
        translator: Arc<dyn TextTranslator>,
        store: Arc<dyn TranslationStore>,
        settings: SessionSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            dictionary,
            detector,
            translator,
            store,
            settings,
            state,
            events,
            control: Mutex::new(Control::default()),
            detecting: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Receiver for one-shot notifications (saves, failures, detections).
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current input text.
    pub fn input(&self) -> String {
        self.control().input.clone()
    }

    /// Id of the record this session edits, if any.
    pub fn existing_id(&self) -> Option<RecordId> {
        self.control().existing_id
    }

    pub fn dictionary(&self) -> &LanguageDictionary {
        &self.dictionary
    }

    /// Display names selectable for `role`, sorted.
    pub fn languages_for(&self, role: LanguageRole) -> Vec<&'static str> {
        self.dictionary.all_names(role.vocabulary())
    }

    /// Binds the session to a record id without loading it.
    ///
    /// Used when the id comes from navigation; the next save updates that row
    /// (and fails if it does not exist).
    pub fn bind_record(&self, id: Option<RecordId>) {
        self.control().existing_id = id;
    }

    /// Returns whether an error is pending and clears it.
    pub fn take_error(&self) -> bool {
        let mut pending = false;
        self.state.send_modify(|s| {
            pending = std::mem::take(&mut s.error);
        });
        pending
    }

    /// Handles an edit of the input text.
    ///
    /// Runs detection when the source language is unknown and the text is
    /// long enough, then translates if both languages are set. Returns the
    /// translation outcome when one was attempted.
    pub async fn on_text_changed(
        &self,
        text: &str,
    ) -> Result<Option<TranslateOutcome>, SessionError> {
        {
            let mut control = self.control();
            if control.input == text {
                return Ok(None);
            }
            control.input = text.to_string();
            control.initial_render = false;
        }
        self.invalidate(|_| {});

        let needs_detection = self.state.borrow().source_language.is_none()
            && text.chars().count() >= self.settings.min_detection_chars;
        if needs_detection {
            self.run_detection(text).await;
        }

        if self.is_complete() {
            return self.run_translation().await.map(Some);
        }
        Ok(None)
    }

    /// Sets or clears (`None` or empty) one of the language slots.
    ///
    /// A change drops the previous result and re-translates when the session
    /// is complete.
    pub async fn select_language(
        &self,
        role: LanguageRole,
        name: Option<&str>,
    ) -> Result<Option<TranslateOutcome>, SessionError> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        if let Some(name) = name {
            let vocabulary = role.vocabulary();
            if !self.dictionary.contains_name(name, vocabulary) {
                return Err(SessionError::UnknownLanguage {
                    name: name.to_string(),
                    vocabulary,
                });
            }
        }

        let current = {
            let state = self.state.borrow();
            match role {
                LanguageRole::Source => state.source_language.clone(),
                LanguageRole::Target => state.target_language.clone(),
            }
        };
        if current.as_deref() == name {
            return Ok(None);
        }

        self.control().initial_render = false;
        let name = name.map(str::to_string);
        self.invalidate(move |s| match role {
            LanguageRole::Source => s.source_language = name,
            LanguageRole::Target => s.target_language = name,
        });

        if self.is_complete() {
            return self.run_translation().await.map(Some);
        }
        Ok(None)
    }

    /// Explicit translate action. Always persists a successful result.
    pub async fn translate(&self) -> Result<TranslateOutcome, SessionError> {
        if !self.is_complete() {
            return Err(SessionError::Incomplete);
        }
        self.control().initial_render = false;
        self.run_translation().await
    }

    /// Explicit save action.
    ///
    /// Creates a record when the session has no id yet, otherwise updates it
    /// in place. Needs input text and a source language. A failure is
    /// reported but leaves the session state untouched.
    pub async fn save(&self) -> Result<RecordId, SessionError> {
        let has_input = !self.control().input.is_empty();
        let has_source = self.state.borrow().source_language.is_some();
        if !has_input || !has_source {
            return Err(SessionError::Incomplete);
        }
        self.persist()
    }

    /// Loads an existing record into the session.
    ///
    /// Returns the record's source text so the caller can seed its input
    /// field. If the record has both languages but no translation yet, one is
    /// fetched without re-saving the record.
    pub async fn load(&self, id: RecordId) -> Result<String, SessionError> {
        let record = match self.store.get_by_id(id) {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to load translation {}: {}", id, e);
                self.generation.fetch_add(1, Ordering::SeqCst);
                // Nothing of a previously open record may be saved over.
                *self.control() = Control::default();
                self.state.send_modify(|s| {
                    s.translated_text.clear();
                    s.source_language = None;
                    s.target_language = None;
                    s.error = true;
                    s.phase = SessionPhase::Error;
                });
                self.publish(SessionEvent::LoadFailed(FailureEvent::now(e.to_string())));
                return Err(e.into());
            }
        };

        {
            let mut control = self.control();
            control.input = record.source_text.clone();
            control.existing_id = Some(id);
            control.initial_render = true;
        }

        let source = non_empty(&record.source_language);
        let target = non_empty(&record.target_language);
        let translated = record.translated_text.clone();
        self.invalidate(move |s| {
            s.source_language = source;
            s.target_language = target;
            s.translated_text = translated;
        });
        debug!("Loaded translation {}", id);

        if self.is_complete() && !self.state.borrow().has_result() {
            // Failures surface through the state and the event channel.
            let _ = self.run_translation().await;
        }

        Ok(record.source_text)
    }

    /// Clears everything and returns to [`SessionPhase::Idle`].
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.control() = Control::default();
        self.state.send_replace(SessionState::default());
        debug!("Session reset");
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Whether both languages are set and there is input to translate.
    fn is_complete(&self) -> bool {
        let state = self.state.borrow();
        state.source_language.is_some()
            && state.target_language.is_some()
            && !self.control().input.is_empty()
    }

    /// Applies a user-driven change: bumps the generation, drops the previous
    /// result and error, and recomputes the phase.
    fn invalidate(&self, change: impl FnOnce(&mut SessionState)) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let input_empty = self.control().input.is_empty();
        self.state.send_modify(|s| {
            s.translated_text.clear();
            s.error = false;
            change(s);
            s.phase = settled_phase(s, input_empty);
        });
    }

    fn refresh_phase(&self) {
        let input_empty = self.control().input.is_empty();
        self.state.send_if_modified(|s| {
            let phase = settled_phase(s, input_empty);
            let changed = s.phase != phase;
            s.phase = phase;
            changed
        });
    }

    async fn run_detection(&self, text: &str) {
        if self
            .detecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // The running call re-checks the input when it returns.
            debug!("Detection already in flight, skipping");
            return;
        }

        let mut text = text.to_string();
        loop {
            self.state
                .send_modify(|s| s.phase = SessionPhase::AwaitingDetection);
            let detected = self.detector.detect(&text).await;

            let latest = self.control().input.clone();
            if latest != text {
                debug!("Input changed during detection, discarding result");
                let source_unset = self.state.borrow().source_language.is_none();
                if source_unset && latest.chars().count() >= self.settings.min_detection_chars {
                    text = latest;
                    continue;
                }
                break;
            }

            self.apply_detection(detected);
            break;
        }

        self.detecting.store(false, Ordering::Release);
        self.refresh_phase();
    }

    fn apply_detection(&self, detected: Option<String>) {
        match detected {
            Some(code) if self.dictionary.contains_code(&code, Vocabulary::Detection) => {
                let name = self.dictionary.name_for_code(&code, Vocabulary::Detection);
                let mut applied = false;
                self.state.send_modify(|s| {
                    // A manual pick made while detection ran wins.
                    if s.source_language.is_none() {
                        s.source_language = Some(name.to_string());
                        applied = true;
                    }
                });
                if applied {
                    self.generation.fetch_add(1, Ordering::SeqCst);
                    debug!("Detected source language {} ({})", name, code);
                    self.publish(SessionEvent::LanguageDetected(LanguageDetectedEvent {
                        code,
                        name: name.to_string(),
                        timestamp: current_timestamp_ms(),
                    }));
                }
            }
            Some(code) => debug!("Detected language {} is not supported", code),
            None => debug!("Could not detect the source language"),
        }
    }

    async fn run_translation(&self) -> Result<TranslateOutcome, SessionError> {
        let text = self.control().input.clone();
        let (source, target) = {
            let state = self.state.borrow();
            (state.source_language.clone(), state.target_language.clone())
        };
        let (Some(source), Some(target)) = (source, target) else {
            return Err(SessionError::Incomplete);
        };
        if text.is_empty() {
            return Err(SessionError::Incomplete);
        }

        let source_code = self
            .dictionary
            .code_for_name(Some(&source), Vocabulary::Detection);
        let target_code = self
            .dictionary
            .code_for_name(Some(&target), Vocabulary::Translation);
        let generation = self.generation.load(Ordering::SeqCst);

        self.state.send_modify(|s| {
            s.translated_text = TRANSLATING_PLACEHOLDER.to_string();
            s.error = false;
            s.phase = SessionPhase::Translating;
        });
        debug!("Translating {} chars {} -> {}", text.len(), source_code, target_code);

        let result = timeout(
            self.settings.translate_timeout,
            self.translator.translate(&text, source_code, target_code),
        )
        .await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding stale translation result");
            return Ok(TranslateOutcome::Superseded);
        }

        let translated = match result {
            Ok(Ok(translated)) => translated,
            Ok(Err(e)) => {
                self.fail_translation(&e.to_string());
                return Err(SessionError::Translation(e));
            }
            Err(_) => {
                self.fail_translation("translation timed out");
                return Err(SessionError::Timeout(self.settings.translate_timeout));
            }
        };

        self.state.send_modify(|s| {
            s.translated_text = translated.clone();
            s.phase = SessionPhase::Ready;
        });

        let should_persist = {
            let mut control = self.control();
            !std::mem::replace(&mut control.initial_render, false)
        };
        let saved = if should_persist {
            // A failed save is reported on the event channel; the
            // translation itself still succeeded.
            self.persist().ok()
        } else {
            None
        };

        Ok(TranslateOutcome::Ready {
            text: translated,
            saved,
        })
    }

    fn fail_translation(&self, reason: &str) {
        warn!("Translation failed: {}", reason);
        self.state.send_modify(|s| {
            s.translated_text.clear();
            s.target_language = None;
            s.error = true;
            s.phase = SessionPhase::Error;
        });
        self.publish(SessionEvent::TranslationFailed(FailureEvent::now(reason)));
    }

    /// Writes the current session to the store and adopts the resulting id.
    fn persist(&self) -> Result<RecordId, SessionError> {
        let (input, existing_id) = {
            let control = self.control();
            (control.input.clone(), control.existing_id)
        };
        let record = {
            let state = self.state.borrow();
            let translated = if state.has_result() {
                state.translated_text.clone()
            } else {
                String::new()
            };
            TranslationRecord::new(
                input,
                translated,
                state.source_language.clone().unwrap_or_default(),
                state.target_language.clone().unwrap_or_default(),
                current_timestamp_ms() as i64,
            )
        };

        let result = match existing_id {
            Some(id) => self.store.update(id, &record).map(|_| (id, false)),
            None => self.store.create(&record).map(|id| (id, true)),
        };

        match result {
            Ok((id, created)) => {
                self.control().existing_id = Some(id);
                info!(
                    "Translation {} {}",
                    id,
                    if created { "saved" } else { "updated" }
                );
                self.publish(SessionEvent::Saved(SavedEvent {
                    id,
                    created,
                    timestamp: current_timestamp_ms(),
                }));
                Ok(id)
            }
            Err(e) => {
                warn!("Failed to save translation: {}", e);
                self.publish(SessionEvent::SaveFailed(FailureEvent::now(e.to_string())));
                Err(e.into())
            }
        }
    }
}

/// Phase implied by the current fields when nothing is in flight.
fn settled_phase(state: &SessionState, input_empty: bool) -> SessionPhase {
    if state.error {
        SessionPhase::Error
    } else if state.has_result() {
        SessionPhase::Ready
    } else if input_empty {
        SessionPhase::Idle
    } else if state.source_language.is_none() {
        SessionPhase::AwaitingDetection
    } else if state.target_language.is_none() {
        SessionPhase::AwaitingTarget
    } else {
        // Complete but not translated yet; the caller is about to translate.
        SessionPhase::Translating
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Detector returning a fixed answer, optionally after a delay.
    struct FakeDetector {
        answer: Option<String>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeDetector {
        fn new(answer: Option<&str>) -> Arc<Self> {
            Self::slow(answer, Duration::ZERO)
        }

        fn slow(answer: Option<&str>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string),
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageDetector for FakeDetector {
        async fn detect(&self, _text: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    /// Detector that answers "fr" for text containing "Bonjour" and "en"
    /// otherwise, after a delay.
    struct KeywordDetector {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl KeywordDetector {
        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageDetector for KeywordDetector {
        async fn detect(&self, text: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let code = if text.contains("Bonjour") { "fr" } else { "en" };
            Some(code.to_string())
        }
    }

    /// Translator that tags its input with the language pair.
    ///
    /// Texts listed in `slow` take `delay` to come back; `fail` makes every
    /// call return an error.
    struct FakeTranslator {
        slow: Vec<String>,
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeTranslator {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                slow: Vec::new(),
                delay: Duration::ZERO,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                slow: Vec::new(),
                delay: Duration::ZERO,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow_for(texts: &[&str], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                slow: texts.iter().map(|t| t.to_string()).collect(),
                delay,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextTranslator for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            source_code: &str,
            target_code: &str,
        ) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.slow.iter().any(|t| t == text) {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(ServiceError::Other("engine unavailable".into()));
            }
            Ok(format!("[{}->{}] {}", source_code, target_code, text))
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    impl TranslationStore for BrokenStore {
        fn create(&self, _record: &TranslationRecord) -> Result<RecordId, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn update(&self, _id: RecordId, _record: &TranslationRecord) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
        fn delete(&self, _id: RecordId) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
        fn get_all(&self) -> Result<Vec<TranslationRecord>, StoreError> {
            Ok(Vec::new())
        }
        fn get_by_id(&self, id: RecordId) -> Result<TranslationRecord, StoreError> {
            Err(StoreError::NotFound(id))
        }
    }

    fn session_with(
        detector: Arc<FakeDetector>,
        translator: Arc<FakeTranslator>,
        store: Arc<dyn TranslationStore>,
    ) -> TranslationSession {
        TranslationSession::new(
            Arc::new(LanguageDictionary::new()),
            detector,
            translator,
            store,
            SessionSettings::default(),
        )
    }

    fn session_with_detector(
        detector: Arc<KeywordDetector>,
        store: Arc<dyn TranslationStore>,
    ) -> TranslationSession {
        TranslationSession::new(
            Arc::new(LanguageDictionary::new()),
            detector,
            FakeTranslator::ok(),
            store,
            SessionSettings::default(),
        )
    }

    fn memory_store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_detection_threshold() {
        let detector = FakeDetector::new(Some("es"));
        let session = session_with(detector.clone(), FakeTranslator::ok(), memory_store());
        let mut events = session.events();

        session.on_text_changed("hola").await.unwrap();
        assert_eq!(detector.calls(), 0);
        assert!(events.try_recv().is_err());
        assert_eq!(session.state().phase, SessionPhase::AwaitingDetection);
        assert_eq!(session.state().source_language, None);

        session.on_text_changed("hola!").await.unwrap();
        assert_eq!(detector.calls(), 1);
        assert_eq!(session.state().source_language.as_deref(), Some("Spanish"));
        assert_eq!(session.state().phase, SessionPhase::AwaitingTarget);

        let Ok(SessionEvent::LanguageDetected(detected)) = events.try_recv() else {
            panic!("expected a detection event");
        };
        assert_eq!(detected.code, "es");
        assert_eq!(detected.name, "Spanish");
    }

    #[tokio::test]
    async fn test_detection_counts_characters_not_bytes() {
        let detector = FakeDetector::new(Some("ja"));
        let session = session_with(detector.clone(), FakeTranslator::ok(), memory_store());

        // Four characters, twelve bytes.
        session.on_text_changed("こんにち").await.unwrap();
        assert_eq!(detector.calls(), 0);
    }

    #[tokio::test]
    async fn test_detection_soft_fails() {
        let detector = FakeDetector::new(None);
        let session = session_with(detector.clone(), FakeTranslator::ok(), memory_store());
        let mut events = session.events();

        session.on_text_changed("some text here").await.unwrap();

        let state = session.state();
        assert_eq!(detector.calls(), 1);
        assert_eq!(state.source_language, None);
        assert!(!state.error);
        assert!(!session.take_error());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsupported_detected_code_is_ignored() {
        let session = session_with(
            FakeDetector::new(Some("tlh")),
            FakeTranslator::ok(),
            memory_store(),
        );
        session.on_text_changed("nuqneH qaleghneS").await.unwrap();
        assert_eq!(session.state().source_language, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_is_not_reentrant() {
        let detector = FakeDetector::slow(Some("fr"), Duration::from_secs(1));
        let session = session_with(detector.clone(), FakeTranslator::ok(), memory_store());

        let (a, b) = tokio::join!(
            session.on_text_changed("bonjour tout le monde"),
            session.on_text_changed("bonjour tout le monde!"),
        );
        a.unwrap();
        b.unwrap();

        // The second edit did not start a parallel call; the first one ran
        // again for the newer text once it came back.
        assert_eq!(detector.calls(), 2);
        assert_eq!(detector.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(session.state().source_language.as_deref(), Some("French"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_result_for_old_text_is_not_applied() {
        let detector = KeywordDetector::slow(Duration::from_secs(1));
        let store = memory_store();
        let session = session_with_detector(detector.clone(), store.clone());
        session.select_language(LanguageRole::Target, Some("Spanish")).await.unwrap();

        let (first, second) = tokio::join!(session.on_text_changed("Hello there friend"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            session.on_text_changed("Bonjour tout le monde").await
        });
        first.unwrap();
        assert_eq!(second.unwrap(), None);

        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.state().source_language.as_deref(), Some("French"));
        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_text, "Bonjour tout le monde");
        assert_eq!(all[0].source_language, "French");
        assert_eq!(all[0].translated_text, "[fr->es] Bonjour tout le monde");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_text_during_detection_keeps_source_unset() {
        let detector = KeywordDetector::slow(Duration::from_secs(1));
        let store = memory_store();
        let session = session_with_detector(detector.clone(), store.clone());

        let (first, second) = tokio::join!(session.on_text_changed("Hello there friend"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            session.on_text_changed("").await
        });
        first.unwrap();
        second.unwrap();

        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
        let state = session.state();
        assert_eq!(state.source_language, None);
        assert_eq!(state.phase, SessionPhase::Idle);
        assert_eq!(session.input(), "");
        assert!(store.get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detection_then_translation_and_autosave() {
        let store = memory_store();
        let session = session_with(FakeDetector::new(Some("en")), FakeTranslator::ok(), store.clone());
        let mut events = session.events();

        session
            .select_language(LanguageRole::Target, Some("Spanish"))
            .await
            .unwrap();
        let outcome = session.on_text_changed("Hello there").await.unwrap();

        let Some(TranslateOutcome::Ready { text, saved }) = outcome else {
            panic!("expected a translation, got {:?}", outcome);
        };
        assert_eq!(text, "[en->es] Hello there");
        let id = saved.expect("record should be saved");

        let state = session.state();
        assert_eq!(state.phase, SessionPhase::Ready);
        assert_eq!(state.translated_text, text);

        let record = store.get_by_id(id).unwrap();
        assert_eq!(record.source_text, "Hello there");
        assert_eq!(record.source_language, "English");
        assert_eq!(record.target_language, "Spanish");
        assert_eq!(record.translated_text, text);

        assert!(matches!(events.try_recv(), Ok(SessionEvent::LanguageDetected(_))));
        match events.try_recv() {
            Ok(SessionEvent::Saved(saved)) => {
                assert_eq!(saved.id, id);
                assert!(saved.created);
            }
            other => panic!("expected a save event, got {:?}", other),
        }

        // The follow-up edit updates the same row.
        session.on_text_changed("Hello there!").await.unwrap();
        match events.try_recv() {
            Ok(SessionEvent::Saved(saved)) => {
                assert_eq!(saved.id, id);
                assert!(!saved.created);
            }
            other => panic!("expected a save event, got {:?}", other),
        }
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_edits_update_same_record() {
        let store = memory_store();
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), store.clone());

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.select_language(LanguageRole::Target, Some("German")).await.unwrap();
        session.on_text_changed("Good").await.unwrap();
        let first = session.existing_id().unwrap();
        session.on_text_changed("Good morning").await.unwrap();

        assert_eq!(session.existing_id(), Some(first));
        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].translated_text, "[en->de] Good morning");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clears_target_and_raises_error() {
        let translator = FakeTranslator::slow_for(&["Hello world"], Duration::from_secs(60));
        let session = session_with(FakeDetector::new(None), translator, memory_store());
        let mut events = session.events();

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.select_language(LanguageRole::Target, Some("Spanish")).await.unwrap();
        let result = session.on_text_changed("Hello world").await;

        assert!(matches!(result, Err(SessionError::Timeout(d)) if d == DEFAULT_TRANSLATE_TIMEOUT));
        let state = session.state();
        assert_eq!(state.phase, SessionPhase::Error);
        assert_eq!(state.translated_text, "");
        assert_eq!(state.target_language, None);
        assert_eq!(state.source_language.as_deref(), Some("English"));
        assert!(matches!(events.try_recv(), Ok(SessionEvent::TranslationFailed(_))));

        assert!(session.take_error());
        assert!(!session.take_error());
    }

    #[tokio::test]
    async fn test_translation_failure_is_surfaced() {
        let store = memory_store();
        let session = session_with(FakeDetector::new(None), FakeTranslator::failing(), store.clone());

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.select_language(LanguageRole::Target, Some("Italian")).await.unwrap();
        let result = session.on_text_changed("Ciao a tutti").await;

        assert!(matches!(result, Err(SessionError::Translation(_))));
        assert!(session.state().error);
        assert_eq!(session.state().target_language, None);
        assert!(store.get_all().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_translation_is_discarded() {
        let translator = FakeTranslator::slow_for(&["Hello"], Duration::from_secs(5));
        let session = session_with(FakeDetector::new(None), translator, memory_store());
        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.select_language(LanguageRole::Target, Some("French")).await.unwrap();

        let (first, second) = tokio::join!(session.on_text_changed("Hello"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            session.on_text_changed("Hello you").await
        });

        assert_eq!(first.unwrap(), Some(TranslateOutcome::Superseded));
        assert!(matches!(second.unwrap(), Some(TranslateOutcome::Ready { .. })));
        assert_eq!(session.state().translated_text, "[en->fr] Hello you");
        assert_eq!(session.state().phase, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn test_save_creates_then_updates() {
        let store = memory_store();
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), store.clone());

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.on_text_changed("Hello").await.unwrap();

        let mut events = session.events();
        let id = session.save().await.unwrap();
        assert_eq!(session.save().await.unwrap(), id);

        let created: Vec<bool> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| match event {
                SessionEvent::Saved(saved) => saved.created,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(created, vec![true, false]);

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].target_language, "");
        assert_eq!(all[0].translated_text, "");
    }

    #[tokio::test]
    async fn test_save_with_invalid_id_fails_without_state_change() {
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), memory_store());
        let mut events = session.events();

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.on_text_changed("Hello").await.unwrap();
        session.bind_record(Some(999));
        let before = session.state();

        let result = session.save().await;

        assert!(matches!(result, Err(SessionError::Store(StoreError::NotFound(999)))));
        assert_eq!(session.state(), before);
        assert_eq!(session.existing_id(), Some(999));
        assert!(matches!(events.try_recv(), Ok(SessionEvent::SaveFailed(_))));
    }

    #[tokio::test]
    async fn test_save_requires_text_and_source() {
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), memory_store());
        assert!(matches!(session.save().await, Err(SessionError::Incomplete)));

        session.on_text_changed("Hi").await.unwrap();
        assert!(matches!(session.save().await, Err(SessionError::Incomplete)));
    }

    #[tokio::test]
    async fn test_autosave_failure_keeps_translation() {
        let session = session_with(
            FakeDetector::new(None),
            FakeTranslator::ok(),
            Arc::new(BrokenStore),
        );
        let mut events = session.events();

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.select_language(LanguageRole::Target, Some("Dutch")).await.unwrap();
        let outcome = session.on_text_changed("Hello").await.unwrap();

        assert_eq!(
            outcome,
            Some(TranslateOutcome::Ready {
                text: "[en->nl] Hello".into(),
                saved: None
            })
        );
        assert_eq!(session.state().phase, SessionPhase::Ready);
        assert!(!session.state().error);
        assert!(matches!(events.try_recv(), Ok(SessionEvent::SaveFailed(_))));
    }

    #[tokio::test]
    async fn test_load_populates_session() {
        let store = memory_store();
        let id = store
            .create(&TranslationRecord::new("Hello", "Hola", "English", "Spanish", 5))
            .unwrap();
        let translator = FakeTranslator::ok();
        let session = session_with(FakeDetector::new(None), translator.clone(), store.clone());

        let text = session.load(id).await.unwrap();

        assert_eq!(text, "Hello");
        assert_eq!(session.input(), "Hello");
        assert_eq!(session.existing_id(), Some(id));
        let state = session.state();
        assert_eq!(state.source_language.as_deref(), Some("English"));
        assert_eq!(state.target_language.as_deref(), Some("Spanish"));
        assert_eq!(state.translated_text, "Hola");
        assert_eq!(state.phase, SessionPhase::Ready);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);

        // Re-feeding the same text is not an edit.
        assert_eq!(session.on_text_changed("Hello").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_translates_missing_result_without_saving() {
        let store = memory_store();
        let id = store
            .create(&TranslationRecord::new("Good night", "", "English", "Spanish", 5))
            .unwrap();
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), store.clone());

        session.load(id).await.unwrap();

        assert_eq!(session.state().translated_text, "[en->es] Good night");
        assert_eq!(store.get_by_id(id).unwrap().translated_text, "");

        // An explicit save afterwards writes the fresh result in place.
        assert_eq!(session.save().await.unwrap(), id);
        assert_eq!(store.get_by_id(id).unwrap().translated_text, "[en->es] Good night");
    }

    #[tokio::test]
    async fn test_load_missing_record_raises_error() {
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), memory_store());
        let mut events = session.events();

        let result = session.load(12).await;

        assert!(matches!(result, Err(SessionError::Store(StoreError::NotFound(12)))));
        assert_eq!(session.state().phase, SessionPhase::Error);
        assert!(matches!(events.try_recv(), Ok(SessionEvent::LoadFailed(_))));
        assert!(session.take_error());
    }

    #[tokio::test]
    async fn test_failed_load_detaches_previous_record() {
        let store = memory_store();
        let first = store
            .create(&TranslationRecord::new("Hello", "Hola", "English", "Spanish", 5))
            .unwrap();
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), store.clone());
        session.load(first).await.unwrap();

        assert!(session.load(99).await.is_err());
        assert_eq!(session.existing_id(), None);
        assert_eq!(session.input(), "");
        assert!(session.take_error());

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.select_language(LanguageRole::Target, Some("French")).await.unwrap();
        let outcome = session.on_text_changed("Good night").await.unwrap();

        let Some(TranslateOutcome::Ready { saved: Some(id), .. }) = outcome else {
            panic!("expected a saved translation, got {:?}", outcome);
        };
        assert_ne!(id, first);
        assert_eq!(store.get_by_id(first).unwrap().translated_text, "Hola");
    }

    #[tokio::test]
    async fn test_explicit_translate_after_load_saves() {
        let store = memory_store();
        let id = store
            .create(&TranslationRecord::new("Thanks", "Gracias", "English", "Spanish", 5))
            .unwrap();
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), store.clone());
        session.load(id).await.unwrap();

        let outcome = session.translate().await.unwrap();

        assert_eq!(
            outcome,
            TranslateOutcome::Ready {
                text: "[en->es] Thanks".into(),
                saved: Some(id)
            }
        );
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_unknown_language_is_rejected() {
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), memory_store());
        let result = session
            .select_language(LanguageRole::Target, Some("Amharic"))
            .await;
        assert!(matches!(
            result,
            Err(SessionError::UnknownLanguage { vocabulary: Vocabulary::Translation, .. })
        ));
        assert_eq!(session.state().target_language, None);
    }

    #[tokio::test]
    async fn test_translate_requires_complete_session() {
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), memory_store());
        session.on_text_changed("Hello").await.unwrap();
        assert!(matches!(session.translate().await, Err(SessionError::Incomplete)));
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let session = session_with(FakeDetector::new(Some("en")), FakeTranslator::ok(), memory_store());
        session.select_language(LanguageRole::Target, Some("Spanish")).await.unwrap();
        session.on_text_changed("Hello world").await.unwrap();
        assert!(session.existing_id().is_some());

        session.reset();

        assert_eq!(session.state(), SessionState::default());
        assert_eq!(session.input(), "");
        assert_eq!(session.existing_id(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_final_state() {
        let session = session_with(FakeDetector::new(None), FakeTranslator::ok(), memory_store());
        let mut rx = session.subscribe();

        session.select_language(LanguageRole::Source, Some("English")).await.unwrap();
        session.select_language(LanguageRole::Target, Some("Polish")).await.unwrap();
        session.on_text_changed("Hi").await.unwrap();

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.phase, SessionPhase::Ready);
        assert_eq!(seen.translated_text, "[en->pl] Hi");
    }
}
