//! Replay tool responses from a JSON document.
//!
//! The document maps tool names to responses:
//!
//! ```json
//! {
//!   "stock_data": { "signal": 0.4, "summary": "uptrend" },
//!   "llm": { "signal": 0.1, "argument": "..." },
//!   "global_news": { "error": "feed down" }
//! }
//! ```
//!
//! A response object with an `error` field is replayed as a failure. Tools
//! missing from the document are unavailable.

use super::{ToolError, ToolProvider};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;

/// [`ToolProvider`] backed by canned responses.
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    responses: Map<String, Value>,
}

impl FixtureProvider {
    pub fn new(responses: Map<String, Value>) -> Self {
        Self { responses }
    }

    /// Parse a fixture document.
    pub fn from_json(json: &str) -> Result<Self> {
        let responses: Map<String, Value> = serde_json::from_str(json)?;
        Ok(Self::new(responses))
    }

    /// Load a fixture document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading tool fixtures");
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn tools(&self) -> Vec<&str> {
        self.responses.keys().map(String::as_str).collect()
    }
}

#[async_trait]
impl ToolProvider for FixtureProvider {
    async fn invoke(&self, tool: &str, _args: Value) -> std::result::Result<Value, ToolError> {
        let response = self
            .responses
            .get(tool)
            .ok_or_else(|| ToolError::Unavailable(tool.to_string()))?;

        match response.get("error").and_then(Value::as_str) {
            Some(message) => Err(ToolError::Failed {
                tool: tool.to_string(),
                message: message.to_string(),
            }),
            None => Ok(response.clone()),
        }
    }
}
