//! Analyst tasks.
//!
//! Every node in the graph is an [`AnalystTask`]. A task's normal path may
//! fail; [`execute`] turns any failure into the task's degraded report, writes
//! the report to the node's output key and never returns an error. That is
//! the only way tasks are run.

pub mod catalog;
mod collector;
mod data;
mod debater;
mod reviewer;
mod verdict;

pub use catalog::{AnalystCatalog, AnalystProfile};
pub use collector::Collector;
pub use data::DataAnalyst;
pub use debater::Debater;
pub use reviewer::RiskReviewer;
pub use verdict::{decide, weighted_inputs, Aggregator, Judge};

use crate::aggregate::AggregationConfig;
use crate::cache::BoundedCache;
use crate::config::PipelineConfig;
use crate::core::{DegradeReason, Report, TaskKind, TaskSpec};
use crate::providers::{HealthStatus, ToolError, ToolProvider};
use crate::state::{GuardError, SharedState, ToolCallGuard};
use crate::workflow::{PromptStrength, RequestId};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Why a task's normal path gave up.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("missing upstream report: {0}")]
    MissingUpstream(String),

    #[error("no usable evidence")]
    NoEvidence,

    #[error("malformed output from {tool}: {message}")]
    Malformed { tool: String, message: String },

    #[error("unknown analyst: {0}")]
    UnknownAnalyst(String),
}

impl From<ToolError> for TaskError {
    fn from(err: ToolError) -> Self {
        TaskError::Guard(GuardError::Tool(err))
    }
}

impl TaskError {
    pub fn degrade_reason(&self) -> DegradeReason {
        match self {
            TaskError::Guard(GuardError::LimitReached { .. }) => DegradeReason::ToolLimit,
            TaskError::MissingUpstream(key) => DegradeReason::MissingUpstream { key: key.clone() },
            other => DegradeReason::Error {
                message: other.to_string(),
            },
        }
    }

    /// Whether the task had nothing to reason from, as opposed to failing
    /// while gathering it.
    pub fn lacks_evidence(&self) -> bool {
        matches!(self, TaskError::MissingUpstream(_) | TaskError::NoEvidence)
    }
}

/// Everything tasks of one request share.
pub struct RequestEnv {
    pub request_id: RequestId,
    pub subject: String,
    pub as_of: NaiveDate,
    pub prompt_strength: PromptStrength,
    pub state: Arc<SharedState>,
    pub provider: Arc<dyn ToolProvider>,
    pub health: Arc<dyn HealthStatus>,
    pub cache: Option<BoundedCache>,
    pub catalog: Arc<AnalystCatalog>,
    pub pipeline: PipelineConfig,
    pub aggregation: AggregationConfig,
}

impl std::fmt::Debug for RequestEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEnv")
            .field("request_id", &self.request_id)
            .field("subject", &self.subject)
            .field("as_of", &self.as_of)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// One task's view of the request.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub spec: TaskSpec,
    pub env: Arc<RequestEnv>,
    pub guard: ToolCallGuard,
}

impl TaskContext {
    pub fn new(spec: TaskSpec, env: Arc<RequestEnv>) -> Self {
        let guard = ToolCallGuard::new(
            spec.id.clone(),
            spec.capabilities.clone(),
            env.pipeline.tool_call_limit,
            Arc::clone(&env.state),
            Arc::clone(&env.provider),
        );
        Self { spec, env, guard }
    }

    pub fn id(&self) -> &str {
        self.spec.id.as_str()
    }

    pub fn state(&self) -> &SharedState {
        &self.env.state
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.env.pipeline
    }

    /// Read a declared upstream report.
    pub fn upstream(&self, key: &str) -> Result<Report, TaskError> {
        self.env
            .state
            .get_report(key)
            .ok_or_else(|| TaskError::MissingUpstream(key.to_string()))
    }

    /// Read every declared upstream report, failing on the first absent one.
    pub fn require_upstream(&self) -> Result<Vec<(String, Report)>, TaskError> {
        self.spec
            .depends_on
            .iter()
            .map(|key| Ok((key.clone(), self.upstream(key)?)))
            .collect()
    }

    /// Base arguments passed to every tool, merged with `extra`.
    pub fn tool_args(&self, extra: Value) -> Value {
        let mut args = json!({
            "task": self.id(),
            "subject": self.env.subject,
            "as_of": self.env.as_of.to_string(),
            "prompt_strength": self.env.prompt_strength.to_string(),
        });
        if let (Some(base), Value::Object(extra)) = (args.as_object_mut(), extra) {
            base.extend(extra);
        }
        args
    }
}

/// Behavior of one node kind.
#[async_trait]
pub trait AnalystTask: Send + Sync {
    /// Normal path.
    async fn run(&self, ctx: &TaskContext) -> Result<Report, TaskError>;

    /// Degraded path. Must not fail and must claim less confidence than any
    /// normal-path report.
    fn degraded(&self, ctx: &TaskContext, error: &TaskError) -> Report {
        let confidence = if error.lacks_evidence() {
            0.0
        } else {
            ctx.pipeline().degraded_confidence
        };
        Report::degraded(ctx.id(), error.degrade_reason(), confidence, 0.0)
            .with_note(error.to_string())
    }
}

/// The implementation for a node kind.
pub fn task_for(spec: &TaskSpec) -> Arc<dyn AnalystTask> {
    match &spec.kind {
        TaskKind::Collector => Arc::new(Collector),
        TaskKind::Analyst { analyst } => Arc::new(DataAnalyst::new(analyst)),
        TaskKind::Debater { round, role } => Arc::new(Debater::new(*round, *role)),
        TaskKind::Aggregator => Arc::new(Aggregator),
        TaskKind::RiskReviewer { stance } => Arc::new(RiskReviewer::new(*stance)),
        TaskKind::Judge => Arc::new(Judge),
    }
}

/// Run `task`, falling back to its degraded path, and publish the result.
///
/// Never fails. If the output key was already written, the existing report
/// wins and is returned.
pub async fn execute(task: &dyn AnalystTask, ctx: &TaskContext) -> Report {
    let report = match task.run(ctx).await {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(task = %ctx.spec.id, error = %err, "task degraded");
            task.degraded(ctx, &err)
        }
    };

    let key = &ctx.spec.output_key;
    match ctx.state().put_report(key, report.clone()) {
        Ok(()) => {
            tracing::trace!(task = %ctx.spec.id, key = %key, "report written");
            report
        }
        Err(e) => {
            tracing::warn!(task = %ctx.spec.id, error = %e, "report already present, keeping first");
            ctx.state().get_report(key).unwrap_or(report)
        }
    }
}

/// Mean of `values`, or `None` when empty.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Numeric `signal` field of a tool response.
fn signal_of(tool: &str, response: &Value) -> Result<f64, TaskError> {
    response
        .get("signal")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite())
        .ok_or_else(|| TaskError::Malformed {
            tool: tool.to_string(),
            message: "missing numeric 'signal'".to_string(),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::providers::{HealthRegistry, OfflineProvider};
    use crate::workflow::WorkflowPhase;

    pub fn env_with(
        provider: Arc<dyn ToolProvider>,
        state: Arc<SharedState>,
        pipeline: PipelineConfig,
    ) -> Arc<RequestEnv> {
        Arc::new(RequestEnv {
            request_id: RequestId::new(),
            subject: "ACME".to_string(),
            as_of: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            prompt_strength: PromptStrength::Standard,
            state,
            provider,
            health: Arc::new(HealthRegistry::new()),
            cache: None,
            catalog: Arc::new(AnalystCatalog::builtin()),
            pipeline,
            aggregation: AggregationConfig::default(),
        })
    }

    pub fn offline_env() -> Arc<RequestEnv> {
        env_with(
            Arc::new(OfflineProvider),
            Arc::new(SharedState::new(2)),
            PipelineConfig::default(),
        )
    }

    pub fn spec(id: &str, kind: TaskKind, phase: WorkflowPhase) -> TaskSpec {
        TaskSpec::new(crate::core::TaskId::new(id), kind, phase)
    }
}
