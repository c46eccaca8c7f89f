//! Shareable translation cards.
//!
//! A card is a boxed plain-text rendering of one record: app title, the
//! language pair, the input, the translation, and when it was made. The REPL
//! prints it and writes a copy to disk so it can be attached elsewhere.

use crate::store::TranslationRecord;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Trailer appended to every card.
pub const SHARE_FOOTER: &str = "Shared from AI Translator";

/// Default card width in columns, borders included.
pub const DEFAULT_CARD_WIDTH: usize = 48;

/// Narrowest card that still fits the title.
const MIN_CARD_WIDTH: usize = 24;

/// One record laid out as a text card.
#[derive(Debug, Clone)]
pub struct ShareCard<'a> {
    record: &'a TranslationRecord,
    /// Preformatted creation time.
    timestamp: String,
    width: usize,
}

impl<'a> ShareCard<'a> {
    pub fn new(record: &'a TranslationRecord, timestamp: impl Into<String>) -> Self {
        Self {
            record,
            timestamp: timestamp.into(),
            width: DEFAULT_CARD_WIDTH,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(MIN_CARD_WIDTH);
        self
    }

    /// The card as lines of text, borders included.
    pub fn render(&self) -> String {
        let inner = self.width - 4;
        let mut lines = Vec::new();

        lines.push(format!("╔{}╗", "═".repeat(self.width - 2)));
        lines.push(boxed(&center("AI Translator", inner), inner));
        lines.push(boxed(&center(&self.pair_line(), inner), inner));
        lines.push(boxed("", inner));

        lines.push(boxed("Input", inner));
        for line in wrap(&self.record.source_text, inner) {
            lines.push(boxed(&line, inner));
        }
        lines.push(boxed(&"─".repeat(inner), inner));
        lines.push(boxed("Translation", inner));
        for line in wrap(&self.record.translated_text, inner) {
            lines.push(boxed(&line, inner));
        }

        if !self.timestamp.is_empty() {
            lines.push(boxed("", inner));
            lines.push(boxed(&format!("{: >inner$}", self.timestamp), inner));
        }
        lines.push(format!("╚{}╝", "═".repeat(self.width - 2)));
        lines.push(SHARE_FOOTER.to_string());

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn pair_line(&self) -> String {
        format!(
            "[ {} ] → [ {} ]",
            or_placeholder(&self.record.source_language),
            or_placeholder(&self.record.target_language)
        )
    }

    /// Writes the card to `dir/shared_translation_<millis>.txt`, creating
    /// `dir` if needed.
    pub fn write_to(&self, dir: &Path, now_millis: u64) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("shared_translation_{}.txt", now_millis));
        std::fs::write(&path, self.render())?;
        info!("Share card written to {:?}", path);
        Ok(path)
    }
}

/// Default directory for written cards.
pub fn default_share_dir() -> PathBuf {
    std::env::temp_dir().join("ai-translator-shares")
}

fn or_placeholder(language: &str) -> &str {
    if language.is_empty() {
        "?"
    } else {
        language
    }
}

fn boxed(content: &str, inner: usize) -> String {
    let pad = inner.saturating_sub(content.chars().count());
    format!("║ {}{} ║", content, " ".repeat(pad))
}

fn center(text: &str, inner: usize) -> String {
    let left = inner.saturating_sub(text.chars().count()) / 2;
    format!("{}{}", " ".repeat(left), text)
}

/// Greedy word wrap to `width` chars; words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let used = current.chars().count();
        if used > 0 && used + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello() -> TranslationRecord {
        TranslationRecord::new("Hello", "Hola", "English", "Spanish", 1_700_000_000_000)
    }

    #[test]
    fn test_card_contains_record() {
        let record = hello();
        let card = ShareCard::new(&record, "03:05 PM Jan 07").render();

        assert!(card.contains("AI Translator"));
        assert!(card.contains("[ English ] → [ Spanish ]"));
        assert!(card.contains("║ Hello "));
        assert!(card.contains("║ Hola "));
        assert!(card.contains("03:05 PM Jan 07 ║"));
        assert!(card.trim_end().ends_with(SHARE_FOOTER));
    }

    #[test]
    fn test_card_lines_have_equal_width() {
        let record = TranslationRecord::new(
            "Learning a new language takes time and practice, and a supercalifragilisticexpialidocious amount of patience.",
            "",
            "English",
            "",
            0,
        );
        let card = ShareCard::new(&record, "").with_width(30).render();

        let widths: Vec<usize> = card
            .lines()
            .filter(|l| l.starts_with('║') || l.starts_with('╔') || l.starts_with('╚'))
            .map(|l| l.chars().count())
            .collect();
        assert!(widths.len() > 8);
        assert!(widths.iter().all(|w| *w == 30), "{:?}", widths);
        assert!(card.contains("[ ? ]"));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("", 10), vec![""]);
    }

    #[test]
    fn test_write_to_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let record = hello();
        let card = ShareCard::new(&record, "Jan 07, 2023");

        let path = card.write_to(&dir.path().join("shares"), 42).unwrap();

        assert_eq!(path.file_name().unwrap(), "shared_translation_42.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), card.render());
    }
}
