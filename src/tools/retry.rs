//! Bounded retry with exponential backoff and an overall deadline

use super::handlers::HandlerError;
use crate::config::ToolsConfig;
use crate::error::ToolError;
use std::future::Future;
use std::time::Duration;

/// Retry policy shared by every tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on the whole call, backoff included
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ToolsConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            deadline: config.call_deadline(),
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, runs out of attempts
    /// or hits the deadline.
    ///
    /// `op` receives the 1-based attempt number. `Transient` is always
    /// retried; `Timeout` only when `idempotent`, since a timed-out action
    /// may already have taken effect.
    pub async fn run<T, F, Fut>(&self, tool: &str, idempotent: bool, op: F) -> Result<T, ToolError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, HandlerError>>,
    {
        match tokio::time::timeout(self.deadline, self.attempt_loop(tool, idempotent, op)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = tool,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Tool call deadline exceeded"
                );
                Err(ToolError::DeadlineExceeded {
                    tool: tool.to_string(),
                    deadline_ms: self.deadline.as_millis() as u64,
                })
            }
        }
    }

    async fn attempt_loop<T, F, Fut>(
        &self,
        tool: &str,
        idempotent: bool,
        mut op: F,
    ) -> Result<T, ToolError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, HandlerError>>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(tool = tool, attempt, "Tool recovered after retries");
                    }
                    return Ok(value);
                }
                Err(HandlerError::Permanent(reason)) => {
                    return Err(ToolError::Failed {
                        tool: tool.to_string(),
                        reason,
                    });
                }
                Err(HandlerError::Timeout(reason)) if !idempotent => {
                    return Err(ToolError::Failed {
                        tool: tool.to_string(),
                        reason: format!("timed out with unknown outcome: {}", reason),
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        let delay = self.backoff_for(attempt);
                        tracing::warn!(
                            tool = tool,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            "Transient tool failure, retrying: {e}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ToolError::RetriesExhausted {
            tool: tool.to_string(),
            attempts: self.max_attempts,
            last_error,
        })
    }
}
