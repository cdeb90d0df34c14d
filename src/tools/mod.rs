//! Role-checked, schema-validated tool dispatch
//!
//! Tools are the only way the workflow touches back-office systems. The
//! [`ToolRegistry`] owns every tool and enforces, per call:
//!
//! - the caller's [`Role`] is in the tool's allowlist
//! - the input parses against the tool's input schema
//! - transient handler failures are retried with backoff under a deadline
//! - the output parses against the tool's output schema
//!
//! Read tools (customer, order, case history) belong to the
//! `context_policy` role. Action tools (compensation, refund, ticket)
//! belong to `resolution`.

pub mod handlers;
pub mod registry;
pub mod retry;
pub mod role;
pub mod schema;

pub use handlers::{BackOfficeData, BackOfficeHandler, HandlerError, ToolHandler, ToolKind};
pub use registry::{ToolRecord, ToolRegistry, ToolRegistryBuilder};
pub use retry::RetryPolicy;
pub use role::Role;
pub use schema::SchemaSpec;
