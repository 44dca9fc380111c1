//! Per-task tool-call guard.
//!
//! Every external call a task makes goes through its `ToolCallGuard`, which
//! checks the task's capability list and the shared counter before handing
//! the call to the provider.

use crate::core::TaskId;
use crate::providers::{ToolError, ToolProvider};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use super::SharedState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("tool-call limit of {limit} reached for {task}")]
    LimitReached { task: String, limit: u32 },

    #[error("{task} may not call {tool}")]
    NotPermitted { task: String, tool: String },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Guarded access to the tool provider for one task.
#[derive(Clone)]
pub struct ToolCallGuard {
    task: TaskId,
    capabilities: Vec<String>,
    limit: u32,
    state: Arc<SharedState>,
    provider: Arc<dyn ToolProvider>,
}

impl ToolCallGuard {
    pub fn new(
        task: TaskId,
        capabilities: Vec<String>,
        limit: u32,
        state: Arc<SharedState>,
        provider: Arc<dyn ToolProvider>,
    ) -> Self {
        Self {
            task,
            capabilities,
            limit,
            state,
            provider,
        }
    }

    /// Whether the task has used up its allowance.
    pub fn exhausted(&self) -> bool {
        self.state.is_over_limit(&self.task, self.limit)
    }

    pub fn calls_made(&self) -> u32 {
        self.state.tool_calls(&self.task)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Call `tool`, counting the attempt against the task's limit.
    ///
    /// A failed call still counts.
    pub async fn call(&self, tool: &str, args: Value) -> Result<Value, GuardError> {
        if !self.capabilities.iter().any(|t| t == tool) {
            return Err(GuardError::NotPermitted {
                task: self.task.to_string(),
                tool: tool.to_string(),
            });
        }
        if self.exhausted() {
            tracing::debug!(task = %self.task, tool, limit = self.limit, "tool-call limit reached");
            return Err(GuardError::LimitReached {
                task: self.task.to_string(),
                limit: self.limit,
            });
        }

        let count = self.state.increment_tool_calls(&self.task);
        tracing::debug!(task = %self.task, tool, count, "tool call");
        Ok(self.provider.invoke(tool, args).await?)
    }
}

impl std::fmt::Debug for ToolCallGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallGuard")
            .field("task", &self.task)
            .field("capabilities", &self.capabilities)
            .field("limit", &self.limit)
            .finish()
    }
}
