//! PII redaction for inbound customer text
//!
//! Replaces PII-shaped substrings with `<<KIND>>` placeholders before the
//! text reaches the reasoning model or storage. Patterns run in a fixed
//! order over the progressively redacted text, so a span claimed by an
//! earlier pattern can never be matched again.

use crate::config::RedactionConfig;
use crate::error::{Error, Result};
use crate::events::{EventLog, SecurityEventKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Kind of PII entity the redactor recognises
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Email,
    Iban,
    NationalId,
    Card,
    Phone,
    CustomerName,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Iban => "IBAN",
            Self::NationalId => "NATIONAL_ID",
            Self::Card => "CARD",
            Self::Phone => "PHONE",
            Self::CustomerName => "CUSTOMER_NAME",
        }
    }

    /// Placeholder token written in place of a match
    pub fn placeholder(&self) -> String {
        format!("<<{}>>", self.as_str())
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of redacting one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionResult {
    /// Text with every match replaced by its placeholder
    pub redacted_text: String,
    /// Distinct entity kinds found
    pub found_entities: BTreeSet<EntityKind>,
    /// Placeholder used for each found kind
    pub placeholders: BTreeMap<EntityKind, String>,
    /// Total number of replaced occurrences
    pub redaction_count: usize,
}

impl RedactionResult {
    pub fn is_clean(&self) -> bool {
        self.redaction_count == 0
    }
}

/// Raw inbound email body.
///
/// The buffer is zeroized on drop and `Debug` never prints it. The only way
/// to get text out is [`Redactor::redact_raw`], which consumes the value.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RawEmail {
    body: String,
}

impl RawEmail {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl std::fmt::Debug for RawEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawEmail([REDACTED; {} bytes])", self.body.len())
    }
}

const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const IBAN_PATTERN: &str = r"\b[A-Z]{2}\d{2}[A-Z0-9]{10,30}\b";
// US SSN, or French NIR (13 digits + optional 2-digit key)
const NATIONAL_ID_PATTERN: &str =
    r"\b(?:\d{3}-\d{2}-\d{4}|[12] ?\d{2} ?\d{2} ?\d{2} ?\d{3} ?\d{3}(?: ?\d{2})?)\b";
const CARD_PATTERN: &str = r"\b(?:\d[ -]?){12,18}\d\b";
// International (+CC), trunk-prefixed (0...), or grouped local numbers.
// An ISO date has a 4-digit lead group and never takes the grouped form.
const PHONE_PATTERN: &str = concat!(
    r"\+\d{1,3}(?:[\s.-]?\d{1,4}){2,6}",
    r"|\b0\d{1,4}(?:[\s.-]?\d{2,4}){2,5}\b",
    r"|(?:\(\d{2,4}\)\s?|\b\d{2,3}[\s.-])\d{2,4}[\s.-]\d{2,4}\b",
);

struct CompiledEntity {
    kind: EntityKind,
    pattern: Regex,
}

impl CompiledEntity {
    /// Matches that survive the context check.
    ///
    /// The regex crate has no lookbehind, so a phone-shaped match glued to
    /// an identifier (`ORD-20240115`, `2024-01-15 12:30`) is rejected here.
    fn accepted<'t>(&'t self, text: &'t str) -> impl Iterator<Item = regex::Match<'t>> + 't {
        self.pattern
            .find_iter(text)
            .filter(move |m| {
                self.kind != EntityKind::Phone || !glued_to_identifier(text, m.start())
            })
    }
}

fn glued_to_identifier(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/'))
}

/// PII redactor
pub struct Redactor {
    entities: Vec<CompiledEntity>,
}

impl Redactor {
    /// Build a redactor; known customer names become a whole-word,
    /// case-insensitive `CUSTOMER_NAME` pattern.
    pub fn new(config: &RedactionConfig) -> Result<Self> {
        let mut specs: Vec<(EntityKind, String)> = vec![
            (EntityKind::Email, EMAIL_PATTERN.to_string()),
            (EntityKind::Iban, IBAN_PATTERN.to_string()),
            (EntityKind::NationalId, NATIONAL_ID_PATTERN.to_string()),
            (EntityKind::Card, CARD_PATTERN.to_string()),
            (EntityKind::Phone, PHONE_PATTERN.to_string()),
        ];

        let names: Vec<String> = config
            .known_customer_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(regex::escape)
            .collect();
        if !names.is_empty() {
            specs.push((
                EntityKind::CustomerName,
                format!(r"(?i)\b(?:{})\b", names.join("|")),
            ));
        }

        let entities = specs
            .into_iter()
            .map(|(kind, source)| {
                let pattern = Regex::new(&source).map_err(|e| {
                    Error::Config(format!("Invalid redaction pattern for {}: {}", kind, e))
                })?;
                Ok(CompiledEntity { kind, pattern })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entities })
    }

    /// Redact PII from `text` and record the outcome.
    ///
    /// Emits `PII_REDACTION_NOT_NEEDED` when nothing matched, otherwise
    /// `PII_REDACTED` followed by one `PII_<KIND>_REDACTED` per distinct kind.
    pub fn redact(&self, text: &str, events: &mut EventLog) -> RedactionResult {
        let mut redacted_text = text.to_string();
        let mut found_entities = BTreeSet::new();
        let mut placeholders = BTreeMap::new();
        let mut redaction_count = 0;

        for entity in &self.entities {
            let spans: Vec<(usize, usize)> = entity
                .accepted(&redacted_text)
                .map(|m| (m.start(), m.end()))
                .collect();
            if spans.is_empty() {
                continue;
            }
            let placeholder = entity.kind.placeholder();
            redacted_text = replace_spans(&redacted_text, &spans, &placeholder);
            redaction_count += spans.len();
            found_entities.insert(entity.kind);
            placeholders.insert(entity.kind, placeholder);
        }

        if redaction_count == 0 {
            events.record(SecurityEventKind::PiiRedactionNotNeeded);
        } else {
            events.record_with_detail(
                SecurityEventKind::PiiRedacted,
                format!("{} occurrence(s)", redaction_count),
            );
            for kind in &found_entities {
                events.record(SecurityEventKind::PiiEntityRedacted(*kind));
            }
        }

        tracing::debug!(
            redaction_count,
            entities = ?found_entities,
            "Redaction complete"
        );

        RedactionResult {
            redacted_text,
            found_entities,
            placeholders,
            redaction_count,
        }
    }

    /// Redact a raw email body. The raw buffer is wiped when this returns.
    pub fn redact_raw(&self, raw: RawEmail, events: &mut EventLog) -> RedactionResult {
        self.redact(&raw.body, events)
    }

    /// Whether `text` contains anything this redactor would replace
    pub fn contains_pii(&self, text: &str) -> bool {
        self.entities.iter().any(|e| e.accepted(text).next().is_some())
    }
}

/// Replace ordered, non-overlapping byte spans with `placeholder`
fn replace_spans(text: &str, spans: &[(usize, usize)], placeholder: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for &(start, end) in spans {
        out.push_str(&text[last..start]);
        out.push_str(placeholder);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}
