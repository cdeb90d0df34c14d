//! Caller roles

use serde::{Deserialize, Serialize};

/// Workflow role making a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Classifies the inbound complaint; no tool access
    Triage,
    /// Gathers customer, order and case context (read-only)
    ContextPolicy,
    /// Decides and executes the resolution (side effects)
    Resolution,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::ContextPolicy => "context_policy",
            Self::Resolution => "resolution",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.strip_suffix("_node").unwrap_or(&normalized) {
            "triage" => Ok(Self::Triage),
            "context_policy" => Ok(Self::ContextPolicy),
            "resolution" => Ok(Self::Resolution),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}
