//! Collaborator interfaces for external data.
//!
//! Concrete data providers and LLM backends live outside this crate. The
//! pipeline only sees them through [`ToolProvider`] and [`HealthStatus`].

mod fixture;
mod health;

pub use fixture::FixtureProvider;
pub use health::HealthRegistry;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a tool provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("tool {0} is not available")]
    Unavailable(String),

    #[error("tool {tool} failed: {message}")]
    Failed { tool: String, message: String },

    #[error("tool {0} was rate limited")]
    RateLimited(String),

    #[error("tool {tool} returned malformed output: {message}")]
    Malformed { tool: String, message: String },
}

/// Invokes a named tool on behalf of a task.
///
/// Every call is fallible; callers decide how failure degrades their output.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn invoke(&self, tool: &str, args: Value) -> Result<Value, ToolError>;
}

/// Provider used when nothing is configured: every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

#[async_trait]
impl ToolProvider for OfflineProvider {
    async fn invoke(&self, tool: &str, _args: Value) -> Result<Value, ToolError> {
        Err(ToolError::Unavailable(tool.to_string()))
    }
}

/// Reports whether a data source is currently usable.
#[async_trait]
pub trait HealthStatus: Send + Sync {
    async fn is_healthy(&self, source: &str) -> bool;
}
