//! AI Translator
//!
//! Core of a text translation app: language dictionaries, a translation
//! session that detects, translates, and saves as the user types, and a
//! history dashboard with per-language-pair colors.

pub mod config;
pub mod dashboard;
pub mod events;
pub mod languages;
pub mod ocr;
pub mod palette;
pub mod quality;
pub mod services;
pub mod session;
pub mod share;
pub mod store;
pub mod timefmt;
pub mod translator;
