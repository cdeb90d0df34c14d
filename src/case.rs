//! Per-case runtime state
//!
//! A `CaseContext` is created for each case run and handed by `&mut` to
//! every guard component. It owns the case's event log, so events from
//! different cases can never interleave.

use crate::events::EventLog;
use crate::privacy::{choose_response_language, Language, LanguageDecision};
use uuid::Uuid;

/// Runtime state of one case run
#[derive(Debug)]
pub struct CaseContext {
    /// Business identifier of the case
    pub case_id: String,
    /// Unique identifier of this run
    pub run_id: Uuid,
    /// Append-only security event log
    pub events: EventLog,
    /// Whether the last output guard run allows sending generated text
    pub output_guard_passed: bool,
    /// Language customer-facing text is written in
    pub response_language: Language,
}

impl CaseContext {
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            run_id: Uuid::new_v4(),
            events: EventLog::new(),
            output_guard_passed: false,
            response_language: Language::default(),
        }
    }

    /// Resolve and store the response language
    pub fn resolve_language(
        &mut self,
        detected: Option<&str>,
        preferred: Option<&str>,
    ) -> LanguageDecision {
        let decision = choose_response_language(detected, preferred, &mut self.events);
        self.response_language = decision.language;
        decision
    }
}
