//! Privacy protection for inbound customer text
//!
//! - PII redaction with stable `<<KIND>>` placeholders
//! - Response language resolution
//! - Persistence gate that keeps raw email out of stored summaries

pub mod language;
pub mod persistence;
pub mod redactor;

pub use language::{
    choose_response_language, detect_language, normalize_language, Language, LanguageDecision,
    LanguageSource,
};
pub use persistence::ensure_no_raw_email;
pub use redactor::{EntityKind, RawEmail, RedactionResult, Redactor};
