//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Scripted tool providers with per-tool delays and panics
//! - A cache store that is always down
//! - An orchestrator harness with event capture

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use tribunal::cache::{BoundedCache, CacheEntry, CacheStore, StoreError};
use tribunal::config::Config;
use tribunal::providers::{HealthRegistry, ToolError, ToolProvider};
use tribunal::workflow::ResearchDepth;
use tribunal::{AnalysisRequest, Orchestrator, OrchestratorEvent};

/// Every tool the built-in catalog and the debate/risk nodes use.
pub const ALL_TOOLS: [&str; 8] = [
    "stock_data",
    "indicators",
    "social_sentiment",
    "company_news",
    "global_news",
    "financials",
    "balance_sheet",
    "llm",
];

pub fn trade_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

pub fn request(analysts: &[&str], depth: ResearchDepth) -> AnalysisRequest {
    AnalysisRequest::new("ACME", trade_date())
        .with_analysts(analysts.iter().copied())
        .with_depth(depth)
}

#[derive(Debug, Clone)]
enum Behavior {
    Respond(Value),
    Fail(String),
    Sleep(Duration, Value),
    Panic,
}

/// Tool provider driven by a per-tool script. Unscripted tools are
/// unavailable.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: HashMap<String, Behavior>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known tool answers with `signal`.
    pub fn uniform(signal: f64) -> Self {
        ALL_TOOLS
            .iter()
            .fold(Self::new(), |p, tool| p.respond(tool, json!({ "signal": signal })))
    }

    pub fn respond(mut self, tool: &str, response: Value) -> Self {
        self.script.insert(tool.to_string(), Behavior::Respond(response));
        self
    }

    pub fn fail(mut self, tool: &str, message: &str) -> Self {
        self.script
            .insert(tool.to_string(), Behavior::Fail(message.to_string()));
        self
    }

    pub fn sleep(mut self, tool: &str, delay: Duration) -> Self {
        let response = match self.script.remove(tool) {
            Some(Behavior::Respond(v)) | Some(Behavior::Sleep(_, v)) => v,
            _ => json!({ "signal": 0.0 }),
        };
        self.script
            .insert(tool.to_string(), Behavior::Sleep(delay, response));
        self
    }

    pub fn panic(mut self, tool: &str) -> Self {
        self.script.insert(tool.to_string(), Behavior::Panic);
        self
    }

    pub fn calls(&self, tool: &str) -> u32 {
        self.calls.lock().get(tool).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl ToolProvider for ScriptedProvider {
    async fn invoke(&self, tool: &str, _args: Value) -> Result<Value, ToolError> {
        *self.calls.lock().entry(tool.to_string()).or_insert(0) += 1;

        match self.script.get(tool).cloned() {
            Some(Behavior::Respond(value)) => Ok(value),
            Some(Behavior::Fail(message)) => Err(ToolError::Failed {
                tool: tool.to_string(),
                message,
            }),
            Some(Behavior::Sleep(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Behavior::Panic) => panic!("scripted panic in {}", tool),
            None => Err(ToolError::Unavailable(tool.to_string())),
        }
    }
}

/// A cache store whose backend is always down.
#[derive(Debug, Default)]
pub struct UnavailableStore {
    attempts: Mutex<u32>,
}

impl UnavailableStore {
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock()
    }
}

#[async_trait]
impl CacheStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, StoreError> {
        *self.attempts.lock() += 1;
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn put(&self, _key: &str, _entry: CacheEntry, _ttl: Duration) -> Result<(), StoreError> {
        *self.attempts.lock() += 1;
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// An orchestrator over a scripted provider, with its events captured.
pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub orchestrator: Orchestrator,
    pub event_rx: mpsc::Receiver<OrchestratorEvent>,
}

impl Harness {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::with_config(provider, Config::default())
    }

    pub fn with_config(provider: ScriptedProvider, config: Config) -> Self {
        let provider = Arc::new(provider);
        let (event_tx, event_rx) = mpsc::channel(1024);
        let orchestrator = Orchestrator::new(
            &config,
            provider.clone(),
            Arc::new(HealthRegistry::new()),
        )
        .with_events(event_tx);
        Self {
            provider,
            orchestrator,
            event_rx,
        }
    }

    pub fn with_cache(mut self, cache: BoundedCache) -> Self {
        self.orchestrator = self.orchestrator.with_cache(cache);
        self
    }

    /// Events emitted so far.
    pub fn drain_events(&mut self) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Config with a custom tool-call limit and task timeout.
pub fn config_with(limit: u32, timeout_secs: u64) -> Config {
    let mut config = Config::default();
    config.pipeline.tool_call_limit = limit;
    config.pipeline.task_timeout_secs = timeout_secs;
    config
}
