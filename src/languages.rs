//! Language code and display-name lookup.
//!
//! Two fixed vocabularies are supported: the broader set of languages the
//! detector can report as a source, and the narrower set that can be used as a
//! translation target. The tables never change after construction.

use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Name returned for codes that are not part of a vocabulary.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Code returned by [`LanguageDictionary::code_for_name`] when no name is given.
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

/// Languages the detector can recognize as a source.
const DETECTION_LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("am", "Amharic"),
    ("ar", "Arabic"),
    ("az", "Azerbaijani"),
    ("be", "Belarusian"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("bs", "Bosnian"),
    ("ca", "Catalan"),
    ("ceb", "Cebuano"),
    ("co", "Corsican"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("eu", "Basque"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fil", "Filipino"),
    ("fr", "French"),
    ("fy", "Western Frisian"),
    ("ga", "Irish"),
    ("gd", "Scots Gaelic"),
    ("gl", "Galician"),
    ("gu", "Gujarati"),
    ("ha", "Hausa"),
    ("haw", "Hawaiian"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hmn", "Hmong"),
    ("hr", "Croatian"),
    ("ht", "Haitian"),
    ("hu", "Hungarian"),
    ("hy", "Armenian"),
    ("id", "Indonesian"),
    ("ig", "Igbo"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("jv", "Javanese"),
    ("ka", "Georgian"),
    ("kk", "Kazakh"),
    ("km", "Khmer"),
    ("kn", "Kannada"),
    ("ko", "Korean"),
    ("ku", "Kurdish"),
    ("ky", "Kyrgyz"),
    ("la", "Latin"),
    ("lb", "Luxembourgish"),
    ("lo", "Lao"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("mg", "Malagasy"),
    ("mi", "Maori"),
    ("mk", "Macedonian"),
    ("ml", "Malayalam"),
    ("mn", "Mongolian"),
    ("mr", "Marathi"),
    ("ms", "Malay"),
    ("mt", "Maltese"),
    ("my", "Burmese"),
    ("ne", "Nepali"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("ny", "Nyanja"),
    ("pa", "Punjabi"),
    ("pl", "Polish"),
    ("ps", "Pashto"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sd", "Sindhi"),
    ("si", "Sinhala"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sm", "Samoan"),
    ("sn", "Shona"),
    ("so", "Somali"),
    ("sq", "Albanian"),
    ("sr", "Serbian"),
    ("st", "Sesotho"),
    ("su", "Sundanese"),
    ("sv", "Swedish"),
    ("sw", "Swahili"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("tg", "Tajik"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("uz", "Uzbek"),
    ("vi", "Vietnamese"),
    ("xh", "Xhosa"),
    ("yi", "Yiddish"),
    ("yo", "Yoruba"),
    ("zh", "Chinese"),
    ("zu", "Zulu"),
];

/// Languages usable as a translation target.
const TRANSLATION_LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("ar", "Arabic"),
    ("be", "Belarusian"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("ga", "Irish"),
    ("gl", "Galician"),
    ("gu", "Gujarati"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("ht", "Haitian"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ka", "Georgian"),
    ("kn", "Kannada"),
    ("ko", "Korean"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("mk", "Macedonian"),
    ("mr", "Marathi"),
    ("ms", "Malay"),
    ("mt", "Maltese"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sq", "Albanian"),
    ("sv", "Swedish"),
    ("sw", "Swahili"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tl", "Tagalog"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// Which vocabulary a lookup runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    /// Languages that can be detected as a source.
    Detection,
    /// Languages that can be picked as a translation target.
    Translation,
}

impl Vocabulary {
    /// Parses a raw selector coming from outside the crate.
    ///
    /// Accepts the names `detection`/`translation` (any case) and the numeric
    /// ids `1`/`2`. Anything else yields `None`.
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector.trim().to_lowercase().as_str() {
            "1" | "detection" | "source" | "from" => Some(Vocabulary::Detection),
            "2" | "translation" | "target" | "to" => Some(Vocabulary::Translation),
            _ => None,
        }
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vocabulary::Detection => write!(f, "detection"),
            Vocabulary::Translation => write!(f, "translation"),
        }
    }
}

impl FromStr for Vocabulary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vocabulary::from_selector(s).ok_or_else(|| format!("invalid vocabulary selector: {}", s))
    }
}

/// Immutable code/name tables for both vocabularies.
///
/// Built once with [`LanguageDictionary::new`] and shared by reference (usually
/// behind an `Arc`) with every consumer.
#[derive(Debug, Clone)]
pub struct LanguageDictionary {
    detection: Vec<(&'static str, &'static str)>,
    translation: Vec<(&'static str, &'static str)>,
}

impl Default for LanguageDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDictionary {
    pub fn new() -> Self {
        Self {
            detection: DETECTION_LANGUAGES.to_vec(),
            translation: TRANSLATION_LANGUAGES.to_vec(),
        }
    }

    fn entries(&self, vocabulary: Vocabulary) -> &[(&'static str, &'static str)] {
        match vocabulary {
            Vocabulary::Detection => &self.detection,
            Vocabulary::Translation => &self.translation,
        }
    }

    /// Returns the display name for `code`, or [`UNKNOWN_LANGUAGE`].
    pub fn name_for_code(&self, code: &str, vocabulary: Vocabulary) -> &'static str {
        self.entries(vocabulary)
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| *name)
            .unwrap_or(UNKNOWN_LANGUAGE)
    }

    /// Returns the code for a display name.
    ///
    /// `None` yields [`DEFAULT_LANGUAGE_CODE`] rather than the unknown
    /// sentinel; an unmatched name yields [`UNKNOWN_LANGUAGE`].
    pub fn code_for_name(&self, name: Option<&str>, vocabulary: Vocabulary) -> &'static str {
        let Some(name) = name else {
            return DEFAULT_LANGUAGE_CODE;
        };

        for (code, candidate) in self.entries(vocabulary) {
            if *candidate == name {
                return *code;
            }
        }
        UNKNOWN_LANGUAGE
    }

    /// Whether `code` belongs to the vocabulary.
    pub fn contains_code(&self, code: &str, vocabulary: Vocabulary) -> bool {
        self.entries(vocabulary).iter().any(|(c, _)| *c == code)
    }

    /// Whether `name` belongs to the vocabulary.
    pub fn contains_name(&self, name: &str, vocabulary: Vocabulary) -> bool {
        self.entries(vocabulary).iter().any(|(_, n)| *n == name)
    }

    /// All display names of a vocabulary, sorted alphabetically.
    pub fn all_names(&self, vocabulary: Vocabulary) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.entries(vocabulary).iter().map(|(_, name)| *name).collect();
        names.sort_unstable();
        names
    }

    /// All codes of a vocabulary, in table order.
    pub fn all_codes(&self, vocabulary: Vocabulary) -> Vec<&'static str> {
        self.entries(vocabulary).iter().map(|(code, _)| *code).collect()
    }

    /// Like [`all_names`](Self::all_names) for a raw selector.
    ///
    /// An invalid selector returns an empty list.
    pub fn names_for_selector(&self, selector: &str) -> Vec<&'static str> {
        match Vocabulary::from_selector(selector) {
            Some(vocabulary) => self.all_names(vocabulary),
            None => {
                warn!("Invalid vocabulary selector: {}", selector);
                Vec::new()
            }
        }
    }

    /// Like [`all_codes`](Self::all_codes) for a raw selector.
    ///
    /// An invalid selector returns an empty list.
    pub fn codes_for_selector(&self, selector: &str) -> Vec<&'static str> {
        match Vocabulary::from_selector(selector) {
            Some(vocabulary) => self.all_codes(vocabulary),
            None => {
                warn!("Invalid vocabulary selector: {}", selector);
                Vec::new()
            }
        }
    }
}
