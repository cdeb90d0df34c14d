//! Response language selection
//!
//! A case's response language is decided once through a fixed fallback
//! chain: detected language, then the customer's stored preference, then
//! English. Every decision ends with exactly one terminal event.

use crate::events::{EventLog, SecurityEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Supported response language
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "EN",
            Self::Fr => "FR",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_language(s).ok_or_else(|| format!("Unsupported language: {}", s))
    }
}

/// Where a language decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LanguageSource {
    Detected,
    MemoryFallback,
    Default,
}

/// Outcome of language resolution for one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDecision {
    pub language: Language,
    pub source: LanguageSource,
}

const FRENCH_HINTS: &[&str] = &[
    "bonjour",
    "merci",
    "commande",
    "remboursement",
    "defectueux",
    "retard",
    "livraison",
    "echange",
    "escalade",
    "probleme",
];

const ENGLISH_HINTS: &[&str] = &[
    "hello", "thanks", "order", "refund", "defective", "delivery", "delay", "exchange", "issue",
    "support",
];

const FRENCH_ACCENTS: &str = "àâçéèêëîïôûùüÿœ";

/// Map a free-form language code to a supported language.
///
/// Accepts `EN`, `ENGLISH`, `FR` and `FRENCH`, trimmed and case-insensitive.
pub fn normalize_language(raw: &str) -> Option<Language> {
    match raw.trim().to_uppercase().as_str() {
        "EN" | "ENGLISH" => Some(Language::En),
        "FR" | "FRENCH" => Some(Language::Fr),
        _ => None,
    }
}

/// Lexical language detection.
///
/// Counts distinct hint words per language; any French accented letter adds
/// one to the French score. Ties return `default`.
pub fn detect_language(text: &str, default: Language) -> Language {
    let lowered = text.to_lowercase();
    let tokens: HashSet<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .collect();

    let mut fr_score = FRENCH_HINTS.iter().filter(|h| tokens.contains(*h)).count();
    let en_score = ENGLISH_HINTS.iter().filter(|h| tokens.contains(*h)).count();
    if lowered.chars().any(|c| FRENCH_ACCENTS.contains(c)) {
        fr_score += 1;
    }

    match fr_score.cmp(&en_score) {
        std::cmp::Ordering::Greater => Language::Fr,
        std::cmp::Ordering::Less => Language::En,
        std::cmp::Ordering::Equal => default,
    }
}

/// Pick the response language and record the decision.
///
/// Emits `LANGUAGE_DETECTED_<L>`, or `LANGUAGE_FALLBACK_TO_MEMORY` followed
/// by `LANGUAGE_SELECTED_<L>`, or `LANGUAGE_DEFAULTED_EN`.
pub fn choose_response_language(
    detected: Option<&str>,
    preferred: Option<&str>,
    events: &mut EventLog,
) -> LanguageDecision {
    if let Some(language) = detected.and_then(normalize_language) {
        events.record(SecurityEventKind::LanguageDetected(language));
        return LanguageDecision {
            language,
            source: LanguageSource::Detected,
        };
    }

    if let Some(language) = preferred.and_then(normalize_language) {
        events.record(SecurityEventKind::LanguageFallbackToMemory);
        events.record(SecurityEventKind::LanguageSelected(language));
        return LanguageDecision {
            language,
            source: LanguageSource::MemoryFallback,
        };
    }

    events.record(SecurityEventKind::LanguageDefaulted(Language::En));
    LanguageDecision {
        language: Language::En,
        source: LanguageSource::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(" fr "), Some(Language::Fr));
        assert_eq!(normalize_language("English"), Some(Language::En));
        assert_eq!(normalize_language("de"), None);
        assert_eq!(normalize_language(""), None);
        assert_eq!("FRENCH".parse::<Language>().unwrap(), Language::Fr);
    }

    #[test]
    fn test_detect_french() {
        let text = "Bonjour, ma commande est arrivée en retard, je demande un remboursement.";
        assert_eq!(detect_language(text, Language::En), Language::Fr);
    }

    #[test]
    fn test_detect_english() {
        let text = "Hello, my order is defective and I want a refund.";
        assert_eq!(detect_language(text, Language::Fr), Language::En);
    }

    #[test]
    fn test_detect_tie_returns_default() {
        assert_eq!(detect_language("12345", Language::Fr), Language::Fr);
        assert_eq!(detect_language("", Language::En), Language::En);
    }

    #[test]
    fn test_detected_wins() {
        let mut events = EventLog::new();
        let decision = choose_response_language(Some("FR"), Some("EN"), &mut events);
        assert_eq!(decision.language, Language::Fr);
        assert_eq!(decision.source, LanguageSource::Detected);
        assert_eq!(events.codes(), vec!["LANGUAGE_DETECTED_FR"]);
    }

    #[test]
    fn test_memory_fallback_precedes_selection() {
        let mut events = EventLog::new();
        let decision = choose_response_language(Some("xx"), Some("french"), &mut events);
        assert_eq!(decision.language, Language::Fr);
        assert_eq!(decision.source, LanguageSource::MemoryFallback);
        assert_eq!(
            events.codes(),
            vec!["LANGUAGE_FALLBACK_TO_MEMORY", "LANGUAGE_SELECTED_FR"]
        );
    }

    #[test]
    fn test_default_when_nothing_usable() {
        let mut events = EventLog::new();
        let decision = choose_response_language(None, Some("klingon"), &mut events);
        assert_eq!(decision.language, Language::En);
        assert_eq!(decision.source, LanguageSource::Default);
        assert_eq!(events.codes(), vec!["LANGUAGE_DEFAULTED_EN"]);
    }

    #[test]
    fn test_resolution_is_total() {
        let inputs = [None, Some(""), Some("EN"), Some("fr"), Some("es")];
        for detected in inputs {
            for preferred in inputs {
                let mut events = EventLog::new();
                choose_response_language(detected, preferred, &mut events);

                let terminal: Vec<usize> = events
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.kind.is_language_decision())
                    .map(|(i, _)| i)
                    .collect();
                assert_eq!(terminal.len(), 1, "{:?}/{:?}", detected, preferred);

                if let Some(fallback) = events.position(SecurityEventKind::LanguageFallbackToMemory)
                {
                    assert!(fallback < terminal[0]);
                }
            }
        }
    }
}
