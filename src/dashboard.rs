//! History view: filtering, sorting, and per-language-pair colors.
//!
//! The dashboard is a projection over the store's records. It never changes
//! them; the only state it keeps is the active filters and a color cache
//! keyed by [`LanguagePair`].

use crate::languages::{LanguageDictionary, Vocabulary};
use crate::palette::{Rgb, PASTEL_COLORS};
use crate::store::{RecordId, StoreError, TranslationRecord, TranslationStore};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// How many times a perturbed color is re-rolled before a collision is accepted.
const MAX_VARIATION_ATTEMPTS: usize = 10;

/// `(source code, target code)` of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Derives the pair from a record's display names.
    pub fn from_record(dictionary: &LanguageDictionary, record: &TranslationRecord) -> Self {
        Self::from_names(
            dictionary,
            &record.source_language,
            &record.target_language,
        )
    }

    /// Source names resolve against the detection vocabulary, target names
    /// against the translation vocabulary.
    pub fn from_names(dictionary: &LanguageDictionary, source: &str, target: &str) -> Self {
        Self::new(
            dictionary.code_for_name(Some(source), Vocabulary::Detection),
            dictionary.code_for_name(Some(target), Vocabulary::Translation),
        )
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.source, self.target)
    }
}

/// Memoized color per language pair.
#[derive(Debug, Default)]
pub struct PairColors {
    assigned: HashMap<LanguagePair, Rgb>,
}

impl PairColors {
    pub fn get(&self, pair: &LanguagePair) -> Option<Rgb> {
        self.assigned.get(pair).copied()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Returns the pair's color, assigning one on first sight.
    pub fn color_for<R: Rng + ?Sized>(&mut self, pair: &LanguagePair, rng: &mut R) -> Rgb {
        if let Some(color) = self.get(pair) {
            return color;
        }
        let color = self.next_color(rng);
        debug!("Assigned {} to {}", color, pair);
        self.assigned.insert(pair.clone(), color);
        color
    }

    fn next_color<R: Rng + ?Sized>(&self, rng: &mut R) -> Rgb {
        let used: HashSet<Rgb> = self.assigned.values().copied().collect();

        let unused: Vec<Rgb> = PASTEL_COLORS
            .iter()
            .copied()
            .filter(|c| !used.contains(c))
            .collect();
        if let Some(color) = unused.choose(rng) {
            return *color;
        }

        // Palette exhausted: derive a variant of a color already in use.
        let mut used: Vec<Rgb> = used.into_iter().collect();
        // Fixed order keeps seeded runs reproducible.
        used.sort_by_key(|c| (c.r, c.g, c.b));
        let mut candidate = PASTEL_COLORS[0];
        for _ in 0..MAX_VARIATION_ATTEMPTS {
            let base = used.choose(rng).copied().unwrap_or(PASTEL_COLORS[0]);
            candidate = base.variation(rng);
            if !self.assigned.values().any(|c| *c == candidate) {
                return candidate;
            }
        }
        candidate
    }
}

/// One row of the history list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardEntry {
    pub record: TranslationRecord,
    pub pair: LanguagePair,
    pub color: Rgb,
}

/// Filtered, sorted, colored view of the translation history.
pub struct Dashboard {
    dictionary: Arc<LanguageDictionary>,
    colors: PairColors,
    rng: StdRng,
    pair_filter: Option<LanguagePair>,
    text_filter: String,
}

impl Dashboard {
    pub fn new(dictionary: Arc<LanguageDictionary>) -> Self {
        Self::with_rng(dictionary, StdRng::from_entropy())
    }

    /// Deterministic color assignment, for tests and reproducible output.
    pub fn with_seed(dictionary: Arc<LanguageDictionary>, seed: u64) -> Self {
        Self::with_rng(dictionary, StdRng::seed_from_u64(seed))
    }

    fn with_rng(dictionary: Arc<LanguageDictionary>, rng: StdRng) -> Self {
        Self {
            dictionary,
            colors: PairColors::default(),
            rng,
            pair_filter: None,
            text_filter: String::new(),
        }
    }

    pub fn dictionary(&self) -> &LanguageDictionary {
        &self.dictionary
    }

    pub fn pair_filter(&self) -> Option<&LanguagePair> {
        self.pair_filter.as_ref()
    }

    pub fn set_pair_filter(&mut self, pair: Option<LanguagePair>) {
        self.pair_filter = pair;
    }

    pub fn text_filter(&self) -> &str {
        &self.text_filter
    }

    /// Blank text disables the filter.
    pub fn set_text_filter(&mut self, text: &str) {
        self.text_filter = text.trim().to_string();
    }

    pub fn clear_filters(&mut self) {
        self.pair_filter = None;
        self.text_filter.clear();
    }

    /// Cached color of `pair`, if it has been seen.
    pub fn color_of(&self, pair: &LanguagePair) -> Option<Rgb> {
        self.colors.get(pair)
    }

    /// Color for `pair`, assigning one on first sight.
    pub fn color_for(&mut self, pair: &LanguagePair) -> Rgb {
        self.colors.color_for(pair, &mut self.rng)
    }

    /// Makes sure every pair in `records` has a color. Iterates in the given
    /// order, so the same records assign the same colors for a fixed seed.
    pub fn assign_colors(&mut self, records: &[TranslationRecord]) {
        for record in records {
            let pair = LanguagePair::from_record(&self.dictionary, record);
            self.colors.color_for(&pair, &mut self.rng);
        }
    }

    /// Distinct pairs present in `records`, sorted, for the filter chips.
    pub fn pairs(&self, records: &[TranslationRecord]) -> Vec<LanguagePair> {
        let mut pairs: Vec<LanguagePair> = records
            .iter()
            .map(|r| LanguagePair::from_record(&self.dictionary, r))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        pairs.sort();
        pairs
    }

    /// Applies the filters and sorts newest first.
    ///
    /// Ties keep the order of `records`. Colors are assigned for every record
    /// (not only the visible ones) so hiding rows does not shift colors.
    pub fn project(&mut self, records: &[TranslationRecord]) -> Vec<DashboardEntry> {
        self.assign_colors(records);

        let needle = self.text_filter.to_lowercase();
        let mut entries: Vec<DashboardEntry> = records
            .iter()
            .filter_map(|record| {
                let pair = LanguagePair::from_record(&self.dictionary, record);
                if self.pair_filter.as_ref().is_some_and(|p| *p != pair) {
                    return None;
                }
                if !needle.is_empty() && !matches_text(record, &needle) {
                    return None;
                }
                let color = self.colors.get(&pair)?;
                Some(DashboardEntry {
                    record: record.clone(),
                    pair,
                    color,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.record.created_at_millis.cmp(&a.record.created_at_millis));
        entries
    }

    /// Deletes a record and returns the refreshed record list.
    pub fn delete(
        &self,
        store: &dyn TranslationStore,
        id: RecordId,
    ) -> Result<Vec<TranslationRecord>, StoreError> {
        store.delete(id)?;
        info!("Deleted translation {}", id);
        store.get_all()
    }
}

fn matches_text(record: &TranslationRecord, needle: &str) -> bool {
    record.source_text.to_lowercase().contains(needle)
        || record.translated_text.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn record(id: i64, text: &str, from: &str, to: &str, at: i64) -> TranslationRecord {
        let mut record = TranslationRecord::new(text, format!("<{}>", text), from, to, at);
        record.id = Some(id);
        record
    }

    fn sample() -> Vec<TranslationRecord> {
        vec![
            record(1, "Hello", "English", "Spanish", 100),
            record(2, "Bonjour", "French", "English", 200),
            record(3, "Good night", "English", "Spanish", 300),
            record(4, "Thanks", "English", "Spanish", 50),
            record(5, "Danke", "German", "English", 400),
        ]
    }

    fn dashboard() -> Dashboard {
        Dashboard::with_seed(Arc::new(LanguageDictionary::new()), 7)
    }

    #[test]
    fn test_pair_from_names() {
        let dict = LanguageDictionary::new();
        assert_eq!(
            LanguagePair::from_names(&dict, "English", "Spanish"),
            LanguagePair::new("en", "es")
        );
        assert_eq!(
            LanguagePair::from_names(&dict, "Klingon", "").target,
            crate::languages::UNKNOWN_LANGUAGE
        );
    }

    #[test]
    fn test_same_pair_same_color() {
        let mut dash = dashboard();
        let entries = dash.project(&sample());

        let en_es: Vec<Rgb> = entries
            .iter()
            .filter(|e| e.pair == LanguagePair::new("en", "es"))
            .map(|e| e.color)
            .collect();
        assert_eq!(en_es.len(), 3);
        assert!(en_es.iter().all(|c| *c == en_es[0]));

        // Colors are stable across projections.
        let again = dash.project(&sample());
        assert_eq!(entries, again);
    }

    #[test]
    fn test_first_eight_pairs_use_distinct_palette_colors() {
        let mut dash = dashboard();
        let targets = ["Spanish", "French", "German", "Italian", "Dutch", "Polish", "Swedish", "Turkish"];
        let records: Vec<TranslationRecord> = targets
            .iter()
            .enumerate()
            .map(|(i, t)| record(i as i64, "x", "English", t, i as i64))
            .collect();

        let colors: HashSet<Rgb> = dash.project(&records).iter().map(|e| e.color).collect();
        assert_eq!(colors.len(), 8);
        assert!(colors.iter().all(|c| PASTEL_COLORS.contains(c)));
    }

    #[test]
    fn test_exhausted_palette_produces_variants() {
        let mut dash = dashboard();
        let codes = dash.dictionary.all_names(Vocabulary::Translation);
        let records: Vec<TranslationRecord> = codes
            .iter()
            .take(12)
            .enumerate()
            .map(|(i, t)| record(i as i64, "x", "English", t, i as i64))
            .collect();

        dash.assign_colors(&records);
        assert_eq!(dash.colors.len(), 12);

        let distinct: HashSet<Rgb> = dash.colors.assigned.values().copied().collect();
        assert!(distinct.len() > 8);
    }

    #[test]
    fn test_pair_filter_keeps_matching_sorted_descending() {
        let mut dash = dashboard();
        dash.set_pair_filter(Some(LanguagePair::new("en", "es")));

        let entries = dash.project(&sample());
        let ids: Vec<i64> = entries.iter().filter_map(|e| e.record.id).collect();
        assert_eq!(ids, vec![3, 1, 4]);
    }

    #[test]
    fn test_text_filter_is_case_insensitive_and_composes() {
        let mut dash = dashboard();
        dash.set_text_filter("  GOOD ");
        let ids: Vec<i64> = dash.project(&sample()).iter().filter_map(|e| e.record.id).collect();
        assert_eq!(ids, vec![3]);

        // Matches translated text too.
        dash.set_text_filter("<danke>");
        assert_eq!(dash.project(&sample()).len(), 1);

        dash.set_pair_filter(Some(LanguagePair::new("en", "es")));
        assert!(dash.project(&sample()).is_empty());

        dash.clear_filters();
        assert_eq!(dash.project(&sample()).len(), 5);
    }

    #[test]
    fn test_ties_keep_store_order() {
        let mut dash = dashboard();
        let records = vec![
            record(1, "a", "English", "Spanish", 10),
            record(2, "b", "English", "Spanish", 10),
            record(3, "c", "English", "Spanish", 10),
        ];
        let ids: Vec<i64> = dash.project(&records).iter().filter_map(|e| e.record.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_projection_does_not_mutate_input() {
        let mut dash = dashboard();
        let records = sample();
        let before = records.clone();
        dash.set_text_filter("hello");
        dash.project(&records);
        assert_eq!(records, before);
    }

    #[test]
    fn test_pairs_are_distinct_and_sorted() {
        let dash = dashboard();
        let pairs = dash.pairs(&sample());
        assert_eq!(
            pairs,
            vec![
                LanguagePair::new("de", "en"),
                LanguagePair::new("en", "es"),
                LanguagePair::new("fr", "en"),
            ]
        );
    }

    #[test]
    fn test_delete_refreshes_records() {
        let store = SqliteStore::in_memory().unwrap();
        let keep = store
            .create(&TranslationRecord::new("Hello", "Hola", "English", "Spanish", 1))
            .unwrap();
        let gone = store
            .create(&TranslationRecord::new("Bye", "Adiós", "English", "Spanish", 2))
            .unwrap();

        let dash = dashboard();
        let remaining = dash.delete(&store, gone).unwrap();

        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, Some(keep));
    }
}
