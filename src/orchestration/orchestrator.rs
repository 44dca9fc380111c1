//! Request orchestrator.
//!
//! The orchestrator builds the graph for a request, then walks the router's
//! phases. Within a phase it dispatches every ready task concurrently, waits
//! for the wave to settle and repeats until the phase's tasks are all done.
//! A phase is a barrier: no task of the next phase starts before every task
//! of the current one has published a report, degraded or not.

use crate::aggregate::{AggregationConfig, Decision};
use crate::analysts::{self, decide, RequestEnv, TaskContext};
use crate::cache::BoundedCache;
use crate::config::{Config, PipelineConfig};
use crate::core::{DegradeReason, Report, TaskId, TaskSpec, JUDGE_ID};
use crate::error::{Error, Result};
use crate::providers::{HealthStatus, ToolProvider};
use crate::state::SharedState;
use crate::workflow::{GraphBuilder, GraphInstance, RequestId, ResearchDepth, Router, WorkflowPhase};
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

/// What the caller asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Instrument or company under analysis.
    pub subject: String,
    /// Trade date the analysis is for.
    pub as_of: NaiveDate,
    /// Selected analyst identifiers. Unknown ids are dropped with a warning.
    #[serde(default)]
    pub analysts: Vec<String>,
    #[serde(default)]
    pub depth: ResearchDepth,
}

impl AnalysisRequest {
    pub fn new(subject: &str, as_of: NaiveDate) -> Self {
        Self {
            subject: subject.trim().to_string(),
            as_of,
            analysts: Vec::new(),
            depth: ResearchDepth::default(),
        }
    }

    pub fn with_analysts<I, S>(mut self, analysts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analysts = analysts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_depth(mut self, depth: ResearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(Error::Validation("subject must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Lifecycle events emitted while a request runs.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    PhaseEntered {
        request_id: RequestId,
        phase: WorkflowPhase,
    },
    TaskStarted {
        task_id: TaskId,
    },
    TaskCompleted {
        task_id: TaskId,
        degraded: bool,
    },
    /// The orchestrator itself replaced the task's report, after a timeout or
    /// a panic.
    TaskDegraded {
        task_id: TaskId,
        reason: DegradeReason,
    },
    Finished {
        request_id: RequestId,
        final_sentiment: f64,
        low_confidence: bool,
    },
}

type WaveOutcome = std::result::Result<std::result::Result<Report, Elapsed>, JoinError>;

/// Runs analysis requests end to end.
///
/// One orchestrator can serve any number of requests; each gets its own
/// shared state, so concurrent requests never see each other's reports.
pub struct Orchestrator {
    builder: GraphBuilder,
    pipeline: PipelineConfig,
    aggregation: AggregationConfig,
    provider: Arc<dyn ToolProvider>,
    health: Arc<dyn HealthStatus>,
    cache: Option<BoundedCache>,
    event_tx: Option<mpsc::Sender<OrchestratorEvent>>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        provider: Arc<dyn ToolProvider>,
        health: Arc<dyn HealthStatus>,
    ) -> Self {
        Self {
            builder: GraphBuilder::with_catalog(config.catalog()),
            pipeline: config.pipeline.clone(),
            aggregation: config.aggregation.clone(),
            provider,
            health,
            cache: None,
            event_tx: None,
        }
    }

    pub fn with_cache(mut self, cache: BoundedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_builder(mut self, builder: GraphBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Send lifecycle events to `tx`. A closed receiver is ignored.
    pub fn with_events(mut self, tx: mpsc::Sender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Run one request to a decision.
    ///
    /// Task failures, timeouts and panics degrade the affected node but never
    /// fail the request. Only an invalid request or a malformed graph is an
    /// error.
    pub async fn run(&self, request: AnalysisRequest) -> Result<Decision> {
        request.validate()?;
        let request_id = RequestId::new();
        let instance = self.builder.build(&request.analysts, request.depth)?;
        let profile = *instance.profile();
        let rounds = instance.debate_rounds();

        info!(
            request = %request_id.short(),
            subject = %request.subject,
            as_of = %request.as_of,
            depth = %request.depth,
            analysts = ?instance.analysts(),
            tasks = instance.graph().task_count(),
            debate_rounds = rounds,
            "request started"
        );
        for warning in instance.warnings() {
            warn!(request = %request_id.short(), "{}", warning);
        }

        let env = Arc::new(RequestEnv {
            request_id,
            subject: request.subject.clone(),
            as_of: request.as_of,
            prompt_strength: profile.prompt_strength,
            state: Arc::new(SharedState::new(rounds)),
            provider: Arc::clone(&self.provider),
            health: Arc::clone(&self.health),
            cache: self.cache.clone(),
            catalog: Arc::new(self.builder.catalog().clone()),
            pipeline: self.pipeline.clone(),
            aggregation: self.aggregation.clone(),
        });

        let mut router = Router::new(rounds);
        let mut completed: HashSet<TaskId> = HashSet::new();
        let mut nodes_run: Vec<String> = Vec::new();

        while !router.is_done() {
            let phase = router.current_phase();
            self.emit(OrchestratorEvent::PhaseEntered { request_id, phase })
                .await;
            if let WorkflowPhase::DebateRound(_) = phase {
                env.state.advance_debate_round()?;
            }
            self.run_phase(&instance, phase, &env, &mut completed, &mut nodes_run)
                .await;
            router.advance()?;
        }

        let mut decision = match env.state.take_decision() {
            Some(decision) => decision,
            None => {
                warn!(request = %request_id.short(), "judge left no decision, aggregating its inputs");
                let keys = instance
                    .graph()
                    .get_task(&TaskId::new(JUDGE_ID))
                    .map(|judge| judge.depends_on.clone())
                    .unwrap_or_default();
                decide(&env.state, &self.aggregation, &keys)
            }
        };

        let audit = &mut decision.audit;
        audit.request_id = Some(request_id);
        audit.subject = request.subject.clone();
        audit.as_of = Some(request.as_of);
        audit.depth = Some(request.depth);
        audit.degraded = env
            .state
            .reports()
            .into_iter()
            .filter_map(|(key, report)| report.degraded.map(|reason| (key, reason.to_string())))
            .collect();
        audit.nodes_run = nodes_run;
        audit.cache_hits = env.state.cache_hits();
        audit.cache_misses = env.state.cache_misses();
        audit.tool_calls = env.state.all_tool_calls();
        audit.warnings = instance.warnings().to_vec();
        audit.phases = router.phase_history().to_vec();
        audit.debate_rounds = router.debate_round();

        info!(
            request = %request_id.short(),
            sentiment = decision.final_sentiment,
            band = %decision.position.label,
            low_confidence = decision.low_confidence,
            degraded = decision.audit.degraded.len(),
            "request finished"
        );
        self.emit(OrchestratorEvent::Finished {
            request_id,
            final_sentiment: decision.final_sentiment,
            low_confidence: decision.low_confidence,
        })
        .await;

        Ok(decision)
    }

    /// Run every task of `phase`, wave by wave, until all have reported.
    async fn run_phase(
        &self,
        instance: &GraphInstance,
        phase: WorkflowPhase,
        env: &Arc<RequestEnv>,
        completed: &mut HashSet<TaskId>,
        nodes_run: &mut Vec<String>,
    ) {
        let mut pending: HashSet<TaskId> = instance
            .graph()
            .tasks_in_phase(phase)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        debug!(%phase, tasks = pending.len(), "phase started");

        while !pending.is_empty() {
            let wave: Vec<TaskSpec> = instance
                .graph()
                .ready_tasks(completed)
                .into_iter()
                .filter(|t| pending.contains(&t.id))
                .cloned()
                .collect();

            if wave.is_empty() {
                // Inputs that can never arrive; publish so the barrier releases.
                let mut stuck: Vec<TaskId> = pending.drain().collect();
                stuck.sort();
                for id in stuck {
                    let key = instance
                        .graph()
                        .get_dependencies(&id)
                        .into_iter()
                        .find(|dep| !completed.contains(&dep.id))
                        .map(|dep| dep.output_key.clone())
                        .unwrap_or_default();
                    if let Some(spec) = instance.graph().get_task(&id) {
                        self.settle_synthetic(env, spec, DegradeReason::MissingUpstream { key })
                            .await;
                    }
                    nodes_run.push(id.to_string());
                    completed.insert(id);
                }
                break;
            }

            let outcomes = self.run_wave(&wave, env).await;
            for (spec, outcome) in wave.iter().zip(outcomes) {
                self.settle(env, spec, outcome).await;
                pending.remove(&spec.id);
                nodes_run.push(spec.id.to_string());
                completed.insert(spec.id.clone());
            }
        }
    }

    /// Spawn every task of `wave` and wait for all of them.
    async fn run_wave(&self, wave: &[TaskSpec], env: &Arc<RequestEnv>) -> Vec<WaveOutcome> {
        let timeout = self.pipeline.task_timeout();
        let mut handles = Vec::with_capacity(wave.len());

        for spec in wave {
            self.emit(OrchestratorEvent::TaskStarted {
                task_id: spec.id.clone(),
            })
            .await;
            let task = analysts::task_for(spec);
            let ctx = TaskContext::new(spec.clone(), Arc::clone(env));
            handles.push(tokio::spawn(async move {
                tokio::time::timeout(timeout, async { analysts::execute(task.as_ref(), &ctx).await })
                    .await
            }));
        }

        join_all(handles).await
    }

    async fn settle(&self, env: &Arc<RequestEnv>, spec: &TaskSpec, outcome: WaveOutcome) {
        match outcome {
            Ok(Ok(report)) => {
                self.emit(OrchestratorEvent::TaskCompleted {
                    task_id: spec.id.clone(),
                    degraded: report.is_degraded(),
                })
                .await;
            }
            Ok(Err(_)) => {
                let err = Error::Timeout(self.pipeline.task_timeout());
                warn!(task = %spec.id, error = %err, "task timed out");
                self.settle_synthetic(env, spec, DegradeReason::Timeout).await;
            }
            Err(join_err) => {
                let err = Error::TaskJoin(join_err.to_string());
                warn!(task = %spec.id, error = %err, "task aborted");
                let reason = if join_err.is_panic() {
                    DegradeReason::Panicked
                } else {
                    DegradeReason::Error {
                        message: err.to_string(),
                    }
                };
                self.settle_synthetic(env, spec, reason).await;
            }
        }
    }

    /// Publish a degraded report on a task's behalf.
    ///
    /// Timed-out and panicked tasks are treated like tasks that exhausted
    /// their tool budget. A report the task managed to write first is kept.
    async fn settle_synthetic(&self, env: &Arc<RequestEnv>, spec: &TaskSpec, reason: DegradeReason) {
        let confidence = match reason {
            DegradeReason::MissingUpstream { .. } => 0.0,
            _ => self.pipeline.degraded_confidence,
        };
        let report = Report::degraded(spec.id.as_str(), reason.clone(), confidence, 0.0)
            .with_note(format!("{} on {}", reason, spec.phase));

        if let Err(e) = env.state.put_report(&spec.output_key, report) {
            debug!(task = %spec.id, error = %e, "task reported before it was cut off");
        }
        self.emit(OrchestratorEvent::TaskDegraded {
            task_id: spec.id.clone(),
            reason,
        })
        .await;
    }

    async fn emit(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
