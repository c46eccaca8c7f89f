//! Concrete detection and translation engines.
//!
//! Detection runs locally with `whatlang`. Translation goes over HTTP, either
//! through a Google Translate proxy or a LibreTranslate instance.

use crate::services::{LanguageDetector, ServiceError, TextTranslator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use whatlang::{detect, Lang};

/// Minimum detection confidence accepted by default.
pub const DEFAULT_DETECTION_CONFIDENCE: f64 = 0.6;

/// Translation backend to use.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TranslationBackend {
    /// Google Translate via a translation-api proxy server.
    #[default]
    Google,
    /// LibreTranslate - open-source translation.
    LibreTranslate,
}

impl FromStr for TranslationBackend {
    type Err = std::convert::Infallible;

    /// Parses the backend from a string.
    ///
    /// Accepts "libretranslate" or "libre" for LibreTranslate, defaults to Google.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "libretranslate" | "libre" => TranslationBackend::LibreTranslate,
            _ => TranslationBackend::Google,
        })
    }
}

/// Local language identification.
#[derive(Debug, Clone)]
pub struct WhatlangDetector {
    /// Results below this confidence are discarded.
    min_confidence: f64,
}

impl Default for WhatlangDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DETECTION_CONFIDENCE)
    }
}

impl WhatlangDetector {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Synchronous detection, shared by the async trait impl.
    pub fn detect_code(&self, text: &str) -> Option<&'static str> {
        let info = detect(text)?;
        let confidence = info.confidence();

        let Some(code) = lang_to_code(info.lang()) else {
            debug!("Detected unsupported language {:?}", info.lang());
            return None;
        };

        if confidence < self.min_confidence {
            debug!(
                "Discarding detection {} with confidence {:.2} (< {:.2})",
                code, confidence, self.min_confidence
            );
            return None;
        }

        debug!("Detected language {} with confidence {:.2}", code, confidence);
        Some(code)
    }
}

#[async_trait]
impl LanguageDetector for WhatlangDetector {
    async fn detect(&self, text: &str) -> Option<String> {
        self.detect_code(text).map(str::to_string)
    }
}

/// Request body for LibreTranslate API.
#[derive(Debug, Serialize)]
struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
}

/// Response from LibreTranslate API.
#[derive(Debug, Deserialize)]
struct LibreTranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Response from the Google proxy.
#[derive(Debug, Deserialize)]
struct ProxyResponse {
    translation: String,
}

/// Translation service talking to an HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    /// HTTP client for API requests.
    client: reqwest::Client,

    /// Base URL of the Google proxy, or the full LibreTranslate endpoint.
    api_url: String,

    /// Which backend to use.
    backend: TranslationBackend,
}

impl HttpTranslator {
    /// Creates a translator for `backend` at `api_url`.
    ///
    /// `request_timeout` bounds each HTTP request at the transport level; the
    /// session applies its own deadline on top.
    pub fn new(
        api_url: &str,
        backend: TranslationBackend,
        request_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            backend,
        })
    }

    pub fn backend(&self) -> &TranslationBackend {
        &self.backend
    }

    /// Translates text using the translation-api proxy server.
    async fn translate_with_google(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, ServiceError> {
        let url = proxy_url(&self.api_url, source, target, text);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Translation API error: {} - {}", status, body);
            return Err(ServiceError::Status {
                service: "translation proxy",
                status: status.as_u16(),
            });
        }

        let result: ProxyResponse = response.json().await?;

        debug!("Google Translate: '{}' -> '{}'", text, result.translation);
        Ok(result.translation)
    }

    /// Translates text using the LibreTranslate API.
    async fn translate_with_libretranslate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, ServiceError> {
        let request = LibreTranslateRequest {
            q: text,
            source,
            target,
        };

        let response = self.client.post(&self.api_url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("LibreTranslate API error: {} - {}", status, body);
            return Err(ServiceError::Status {
                service: "LibreTranslate",
                status: status.as_u16(),
            });
        }

        let result: LibreTranslateResponse = response.json().await?;
        Ok(result.translated_text)
    }
}

#[async_trait]
impl TextTranslator for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        source_code: &str,
        target_code: &str,
    ) -> Result<String, ServiceError> {
        match self.backend {
            TranslationBackend::Google => {
                self.translate_with_google(text, source_code, target_code).await
            }
            TranslationBackend::LibreTranslate => {
                self.translate_with_libretranslate(text, source_code, target_code)
                    .await
            }
        }
    }
}

/// Builds `{api_url}/translate/{source}/{target}/{text}` with the text encoded.
fn proxy_url(api_url: &str, source: &str, target: &str, text: &str) -> String {
    format!(
        "{}/translate/{}/{}/{}",
        api_url.trim_end_matches('/'),
        source,
        target,
        urlencoding::encode(text)
    )
}

/// Converts a `whatlang::Lang` to the ISO 639-1 code used by the dictionary.
fn lang_to_code(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Afr => "af",
        Lang::Amh => "am",
        Lang::Ara => "ar",
        Lang::Aze => "az",
        Lang::Bel => "be",
        Lang::Bul => "bg",
        Lang::Ben => "bn",
        Lang::Cat => "ca",
        Lang::Ces => "cs",
        Lang::Cmn => "zh",
        Lang::Dan => "da",
        Lang::Deu => "de",
        Lang::Ell => "el",
        Lang::Eng => "en",
        Lang::Epo => "eo",
        Lang::Spa => "es",
        Lang::Est => "et",
        Lang::Pes => "fa",
        Lang::Fin => "fi",
        Lang::Fra => "fr",
        Lang::Guj => "gu",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Hrv => "hr",
        Lang::Hun => "hu",
        Lang::Ind => "id",
        Lang::Ita => "it",
        Lang::Jpn => "ja",
        Lang::Jav => "jv",
        Lang::Kat => "ka",
        Lang::Khm => "km",
        Lang::Kan => "kn",
        Lang::Kor => "ko",
        Lang::Lat => "la",
        Lang::Lav => "lv",
        Lang::Lit => "lt",
        Lang::Mkd => "mk",
        Lang::Mal => "ml",
        Lang::Mar => "mr",
        Lang::Mya => "my",
        Lang::Nep => "ne",
        Lang::Nld => "nl",
        Lang::Nob => "no",
        Lang::Pan => "pa",
        Lang::Pol => "pl",
        Lang::Por => "pt",
        Lang::Ron => "ro",
        Lang::Rus => "ru",
        Lang::Sin => "si",
        Lang::Slk => "sk",
        Lang::Slv => "sl",
        Lang::Sna => "sn",
        Lang::Srp => "sr",
        Lang::Swe => "sv",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Tha => "th",
        Lang::Tur => "tr",
        Lang::Ukr => "uk",
        Lang::Urd => "ur",
        Lang::Uzb => "uz",
        Lang::Vie => "vi",
        Lang::Yid => "yi",
        Lang::Zul => "zu",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{LanguageDictionary, Vocabulary};

    #[test]
    fn test_backend_parsing() {
        assert_eq!(
            "LibreTranslate".parse::<TranslationBackend>().unwrap(),
            TranslationBackend::LibreTranslate
        );
        assert_eq!(
            "libre".parse::<TranslationBackend>().unwrap(),
            TranslationBackend::LibreTranslate
        );
        assert_eq!(
            "anything".parse::<TranslationBackend>().unwrap(),
            TranslationBackend::Google
        );
    }

    #[test]
    fn test_proxy_url_encodes_text() {
        let url = proxy_url("http://localhost:4000/", "en", "es", "Hello world?");
        assert_eq!(url, "http://localhost:4000/translate/en/es/Hello%20world%3F");
    }

    #[test]
    fn test_detected_codes_are_in_dictionary() {
        let dict = LanguageDictionary::new();
        for lang in Lang::all() {
            if let Some(code) = lang_to_code(*lang) {
                assert!(
                    dict.contains_code(code, Vocabulary::Detection),
                    "{} missing from detection vocabulary",
                    code
                );
            }
        }
    }

    #[test]
    fn test_detects_confident_text() {
        let detector = WhatlangDetector::default();
        let code = detector.detect_code(
            "Ich glaube, dass wir morgen früh mit dem Zug nach Berlin fahren werden.",
        );
        assert_eq!(code, Some("de"));
    }

    #[test]
    fn test_low_confidence_is_discarded() {
        let detector = WhatlangDetector::new(1.01);
        assert_eq!(
            detector.detect_code("The quick brown fox jumps over the lazy dog near the river."),
            None
        );
    }
}
