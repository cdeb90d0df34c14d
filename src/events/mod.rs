//! Per-case security event log
//!
//! Guard components never talk to a global sink. The case that owns an
//! [`EventLog`] passes it explicitly to every component, and components can
//! only append to it.

mod log;
pub mod types;

pub use log::EventLog;
pub use types::{SecurityEvent, SecurityEventKind};
