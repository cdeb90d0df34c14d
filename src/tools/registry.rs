//! Tool registry with role permissions and schema validation
//!
//! The registry is built once at startup and never mutated afterwards, so
//! it can be shared across concurrent case runs behind an `Arc` without
//! locking. Each call walks a fixed gate sequence:
//!
//! ```text
//! lookup → role check → input schema → handler (retry, deadline) → output schema → audit
//! ```
//!
//! Exiting at any gate produces a terminal [`ToolError`].

use super::handlers::{BackOfficeData, BackOfficeHandler, ToolHandler, ToolKind};
use super::retry::RetryPolicy;
use super::role::Role;
use super::schema::SchemaSpec;
use crate::config::ToolsConfig;
use crate::error::{Error, Result, ToolError};
use crate::events::{EventLog, SecurityEventKind};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Authorization and schema metadata bound to a tool name
#[derive(Clone)]
pub struct ToolRecord {
    pub name: String,
    pub allowed_roles: HashSet<Role>,
    pub input_schema: SchemaSpec,
    pub output_schema: SchemaSpec,
    pub is_idempotent: bool,
    handler: Arc<dyn ToolHandler>,
}

impl ToolRecord {
    pub fn new(
        name: impl Into<String>,
        allowed_roles: impl IntoIterator<Item = Role>,
        input_schema: SchemaSpec,
        output_schema: SchemaSpec,
        is_idempotent: bool,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            allowed_roles: allowed_roles.into_iter().collect(),
            input_schema,
            output_schema,
            is_idempotent,
            handler,
        }
    }

    /// Record for one of the built-in back-office tools
    pub fn back_office(kind: ToolKind, data: Arc<BackOfficeData>) -> Self {
        Self::new(
            kind.name(),
            [kind.allowed_role()],
            kind.input_schema(),
            kind.output_schema(),
            kind.is_idempotent(),
            Arc::new(BackOfficeHandler::new(kind, data)),
        )
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

impl std::fmt::Debug for ToolRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRecord")
            .field("name", &self.name)
            .field("allowed_roles", &self.allowed_roles)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .field("is_idempotent", &self.is_idempotent)
            .finish()
    }
}

/// Per-call bookkeeping, dropped when the call returns
struct ToolInvocation<'a> {
    tool_name: &'a str,
    caller_role: Role,
    attempt_count: u32,
}

impl ToolInvocation<'_> {
    fn describe(&self) -> String {
        format!(
            "tool={} role={} attempts={}",
            self.tool_name, self.caller_role, self.attempt_count
        )
    }
}

/// Builder for an immutable [`ToolRegistry`]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, ToolRecord>,
    retry: RetryPolicy,
}

impl ToolRegistryBuilder {
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Add a tool; a duplicate name is a configuration error
    pub fn register(mut self, record: ToolRecord) -> Result<Self> {
        if self.tools.contains_key(&record.name) {
            return Err(Error::Config(format!(
                "Tool '{}' registered twice",
                record.name
            )));
        }
        self.tools.insert(record.name.clone(), record);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        tracing::info!(tools = self.tools.len(), "Tool registry built");
        ToolRegistry {
            tools: self.tools,
            retry: self.retry,
        }
    }
}

/// Central dispatch table for tool calls
#[derive(Debug)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolRecord>,
    retry: RetryPolicy,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder {
            tools: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Registry holding the six back-office tools
    pub fn back_office(data: Arc<BackOfficeData>, config: &ToolsConfig) -> Result<Self> {
        ToolKind::ALL
            .iter()
            .try_fold(
                Self::builder().retry_policy(RetryPolicy::from_config(config)),
                |builder, kind| builder.register(ToolRecord::back_office(*kind, Arc::clone(&data))),
            )
            .map(ToolRegistryBuilder::build)
    }

    pub fn get(&self, name: &str) -> Option<&ToolRecord> {
        self.tools.get(name)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sorted names of all registered tools
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Sorted names of the tools `role` may call
    pub fn list_tools_for_role(&self, role: Role) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .values()
            .filter(|record| record.allows(role))
            .map(|record| record.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Dispatch a tool call.
    ///
    /// Returns the output normalized by the tool's output schema. Every
    /// outcome is recorded on `events`.
    pub async fn call_tool(
        &self,
        role: Role,
        tool_name: &str,
        payload: Value,
        events: &mut EventLog,
    ) -> std::result::Result<Value, ToolError> {
        let mut invocation = ToolInvocation {
            tool_name,
            caller_role: role,
            attempt_count: 0,
        };

        let Some(record) = self.tools.get(tool_name) else {
            return Err(reject(
                events,
                &invocation,
                ToolError::NotFound {
                    tool: tool_name.to_string(),
                },
            ));
        };

        if !record.allows(role) {
            return Err(reject(
                events,
                &invocation,
                ToolError::PermissionDenied {
                    role: role.to_string(),
                    tool: tool_name.to_string(),
                },
            ));
        }

        let input = match record.input_schema.validate(&payload) {
            Ok(input) => input,
            Err(reason) => {
                return Err(reject(
                    events,
                    &invocation,
                    ToolError::InvalidInput {
                        tool: tool_name.to_string(),
                        reason,
                    },
                ));
            }
        };

        let raw_output = self
            .retry
            .run(tool_name, record.is_idempotent, |attempt| {
                invocation.attempt_count = attempt;
                tracing::debug!(tool = tool_name, role = %role, attempt, "Invoking tool handler");
                let handler = Arc::clone(&record.handler);
                let input = input.clone();
                async move { handler.invoke(input).await }
            })
            .await;

        let raw_output = match raw_output {
            Ok(output) => output,
            Err(err) => return Err(fail(events, &invocation, err)),
        };

        let output = match record.output_schema.validate(&raw_output) {
            Ok(output) => output,
            Err(reason) => {
                return Err(fail(
                    events,
                    &invocation,
                    ToolError::InvalidOutput {
                        tool: tool_name.to_string(),
                        reason,
                    },
                ));
            }
        };

        let fields: Vec<&str> = output
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default();
        events.record_with_detail(
            SecurityEventKind::ToolCallSucceeded,
            format!("{} fields=[{}]", invocation.describe(), fields.join(",")),
        );
        tracing::info!(
            tool = tool_name,
            role = %role,
            attempts = invocation.attempt_count,
            "Tool call succeeded"
        );

        Ok(output)
    }
}

/// Record a call refused before the handler ran
fn reject(events: &mut EventLog, invocation: &ToolInvocation<'_>, err: ToolError) -> ToolError {
    tracing::warn!(
        tool = invocation.tool_name,
        role = %invocation.caller_role,
        code = err.code(),
        "Tool call rejected: {err}"
    );
    events.record_with_detail(
        SecurityEventKind::ToolCallRejected,
        format!("{} code={}", invocation.describe(), err.code()),
    );
    err
}

/// Record a call that failed during or after execution
fn fail(events: &mut EventLog, invocation: &ToolInvocation<'_>, err: ToolError) -> ToolError {
    tracing::error!(
        tool = invocation.tool_name,
        role = %invocation.caller_role,
        attempts = invocation.attempt_count,
        code = err.code(),
        "Tool call failed: {err}"
    );
    events.record_with_detail(
        SecurityEventKind::ToolCallFailed,
        format!("{} code={}", invocation.describe(), err.code()),
    );
    err
}
