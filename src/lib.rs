//! CaseGuard - Trust-boundary pipeline for LLM-driven complaint resolution
//!
//! CaseGuard sits between untrusted inputs (customer emails, retrieved
//! policy documents) and the sensitive surfaces of a complaint-resolution
//! workflow: the reasoning model, the customer-facing reply and the
//! back-office tools that move money.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Case run                                │
//! │                                                                   │
//! │  inbound email ─► Redactor ─► Language Resolver ─► (workflow)     │
//! │                                                        │          │
//! │                     candidate reply ◄──────────────────┘          │
//! │                            │                                      │
//! │                     Output Guard ─► reply or fallback template    │
//! │                                                                   │
//! │  every step appends to the case's EventLog                        │
//! └──────────────────────────────────────────────────────────────────┘
//!
//! tool request ─► ToolRegistry (role, input schema, retry, output schema)
//!
//! policy docs ─► IndexBuilder (allowlist, sanitize) ─► VectorIndex
//! query       ─► PolicyRetriever (sanitize, filter, re-sanitize) ─► snippets
//! ```
//!
//! ## Guarantees
//!
//! - PII never reaches the model or storage unredacted
//! - Internal scores, policy ids, tool payloads and retrieval metadata never
//!   reach the customer
//! - Tools run only for authorized roles and only with schema-valid payloads
//! - Retrieved document content cannot carry injected instructions
//!
//! ## Modules
//!
//! - [`privacy`]: PII redaction, language resolution, persistence gate
//! - [`leakage`]: Shared sanitizer and customer-facing output guard
//! - [`tools`]: Role-checked, schema-validated tool dispatch with retry
//! - [`rag`]: Sanitized document indexing and retrieval
//! - [`events`]: Append-only security event log
//! - [`case`]: Per-case runtime state
//! - [`config`]: Configuration management

pub mod case;
pub mod config;
pub mod error;
pub mod events;
pub mod leakage;
pub mod logging;
pub mod privacy;
pub mod rag;
pub mod tools;

pub use case::CaseContext;
pub use config::CaseGuardConfig;
pub use error::{Error, Result, ToolError};
pub use events::{EventLog, SecurityEvent, SecurityEventKind};
pub use logging::init_logging;
