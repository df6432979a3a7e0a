//! Script-based language identification for the supported languages.
//!
//! Detection counts alphabetic characters per Unicode script and picks the
//! script holding a strict majority. Short inputs fall back to the default:
//! under three words there is rarely enough signal, and romanized
//! Hindi/Tamil/Telugu is indistinguishable from English anyway.

use serde::{Deserialize, Serialize};

/// Minimum whitespace-separated tokens before detection is attempted.
const MIN_DETECT_TOKENS: usize = 3;

/// Share of alphabetic chars a script must exceed to win.
const DOMINANCE_THRESHOLD: f64 = 0.5;

/// The closed set of supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    #[default]
    En,
    Hi,
    Ta,
    Te,
}

impl LanguageCode {
    /// ISO 639-1 tag, as used on the wire and in cache keys.
    pub fn tag(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Hi => "hi",
            LanguageCode::Ta => "ta",
            LanguageCode::Te => "te",
        }
    }

    /// English display name, used when instructing the chat model.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Hi => "Hindi",
            LanguageCode::Ta => "Tamil",
            LanguageCode::Te => "Telugu",
        }
    }

    /// Parse an ISO tag; `None` for anything outside the supported set.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Some(LanguageCode::En),
            "hi" => Some(LanguageCode::Hi),
            "ta" => Some(LanguageCode::Ta),
            "te" => Some(LanguageCode::Te),
            _ => None,
        }
    }

    /// The fixed answer returned when the indexed documents cannot support one.
    pub fn refusal(&self) -> &'static str {
        match self {
            LanguageCode::En => "Information not available in internal documents.",
            LanguageCode::Hi => "जानकारी आंतरिक दस्तावेज़ों में उपलब्ध नहीं है।",
            LanguageCode::Ta => "தகவல் உள் ஆவணங்களில் கிடைக்கவில்லை.",
            LanguageCode::Te => "సమాచారం అంతర్గత పత్రాలలో అందుబాటులో లేదు.",
        }
    }
}

/// Identify the dominant script of `text`, falling back to `default` when
/// the input is too short or no script holds a majority.
pub fn detect(text: &str, default: LanguageCode) -> LanguageCode {
    if text.split_whitespace().count() < MIN_DETECT_TOKENS {
        return default;
    }

    let mut latin = 0usize;
    let mut devanagari = 0usize;
    let mut tamil = 0usize;
    let mut telugu = 0usize;
    let mut total = 0usize;

    for ch in text.chars() {
        if !ch.is_alphabetic() {
            continue;
        }
        total += 1;
        match ch {
            '\u{0900}'..='\u{097F}' => devanagari += 1,
            '\u{0B80}'..='\u{0BFF}' => tamil += 1,
            '\u{0C00}'..='\u{0C7F}' => telugu += 1,
            'a'..='z' | 'A'..='Z' | '\u{00C0}'..='\u{024F}' => latin += 1,
            _ => {}
        }
    }

    if total == 0 {
        return default;
    }

    let threshold = (total as f64 * DOMINANCE_THRESHOLD) as usize;
    let best = [
        (devanagari, LanguageCode::Hi),
        (tamil, LanguageCode::Ta),
        (telugu, LanguageCode::Te),
        (latin, LanguageCode::En),
    ]
    .into_iter()
    .max_by_key(|(count, _)| *count);

    match best {
        Some((count, lang)) if count > threshold => lang,
        _ => default,
    }
}
