//! Security event types
//!
//! Each event kind renders to a stable upper-snake code such as
//! `PII_EMAIL_REDACTED` or `LANGUAGE_DETECTED_FR`. Codes are what operators
//! grep for, so they never change once shipped.

use crate::leakage::ViolationKind;
use crate::privacy::{EntityKind, Language};
use serde::{Deserialize, Serialize};

/// Kind of security event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// At least one PII entity was redacted
    PiiRedacted,
    /// An entity kind was present in the redacted text (one per kind)
    PiiEntityRedacted(EntityKind),
    /// Input carried no PII
    PiiRedactionNotNeeded,
    /// Response language taken from detection
    LanguageDetected(Language),
    /// Detection unusable, falling back to the stored preference
    LanguageFallbackToMemory,
    /// Response language taken from the stored preference
    LanguageSelected(Language),
    /// Neither source usable, default language applied
    LanguageDefaulted(Language),
    /// Customer-facing text cleared the leakage check
    OutputGuardPassed,
    /// Customer-facing text failed the leakage check
    OutputGuardFailed,
    /// A distinct violation kind found by the leakage check
    OutputGuardViolation(ViolationKind),
    /// Offending spans were stripped
    OutputGuardSanitized,
    /// Guarded text must not be sent
    OutputGuardFallbackRequired,
    /// The pre-approved template replaced the guarded text
    OutputGuardFallbackTemplateUsed,
    /// A tool call completed and its output validated
    ToolCallSucceeded,
    /// A tool call was refused before the handler ran
    ToolCallRejected,
    /// A tool call failed during or after execution
    ToolCallFailed,
}

impl SecurityEventKind {
    /// Stable event code
    pub fn code(&self) -> String {
        match self {
            Self::PiiRedacted => "PII_REDACTED".to_string(),
            Self::PiiEntityRedacted(entity) => format!("PII_{}_REDACTED", entity.as_str()),
            Self::PiiRedactionNotNeeded => "PII_REDACTION_NOT_NEEDED".to_string(),
            Self::LanguageDetected(lang) => format!("LANGUAGE_DETECTED_{}", lang.as_str()),
            Self::LanguageFallbackToMemory => "LANGUAGE_FALLBACK_TO_MEMORY".to_string(),
            Self::LanguageSelected(lang) => format!("LANGUAGE_SELECTED_{}", lang.as_str()),
            Self::LanguageDefaulted(lang) => format!("LANGUAGE_DEFAULTED_{}", lang.as_str()),
            Self::OutputGuardPassed => "OUTPUT_GUARD_PASSED".to_string(),
            Self::OutputGuardFailed => "OUTPUT_GUARD_FAILED".to_string(),
            Self::OutputGuardViolation(kind) => format!("OUTPUT_GUARD_{}", kind.as_str()),
            Self::OutputGuardSanitized => "OUTPUT_GUARD_SANITIZED".to_string(),
            Self::OutputGuardFallbackRequired => "OUTPUT_GUARD_FALLBACK_REQUIRED".to_string(),
            Self::OutputGuardFallbackTemplateUsed => {
                "OUTPUT_GUARD_FALLBACK_TEMPLATE_USED".to_string()
            }
            Self::ToolCallSucceeded => "TOOL_CALL_SUCCEEDED".to_string(),
            Self::ToolCallRejected => "TOOL_CALL_REJECTED".to_string(),
            Self::ToolCallFailed => "TOOL_CALL_FAILED".to_string(),
        }
    }

    /// Whether this event concludes a language decision
    pub fn is_language_decision(&self) -> bool {
        matches!(
            self,
            Self::LanguageDetected(_) | Self::LanguageSelected(_) | Self::LanguageDefaulted(_)
        )
    }
}

impl std::fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code())
    }
}

/// A single entry of a case's event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: SecurityEventKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }
}

impl std::fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.kind, detail),
            None => write!(f, "{}", self.kind),
        }
    }
}
