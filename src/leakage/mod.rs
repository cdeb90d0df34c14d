//! Leakage prevention at the trust boundary
//!
//! ## Architecture
//!
//! ```text
//! Untrusted text (documents, queries) → Sanitizer → drop if suspicious
//!
//! Composed email → OutputGuard (check)
//!                      ↓ violations
//!                  Sanitizer-backed strip + one recheck
//!                      ↓ still failing
//!                  fallback template
//! ```

pub mod output_guard;
pub mod sanitizer;

pub use output_guard::{fallback_email, GuardVerdict, GuardedEmail, OutputGuard, ViolationKind};
pub use sanitizer::{Finding, InjectionCategory, SanitizeOutcome, Sanitizer};
