//! Per-request graph construction.
//!
//! `GraphBuilder::build` is a pure function of the analyst selection, the
//! research depth and the catalog. It never touches shared state, so graph
//! shape can be tested without running anything.

use crate::analysts::AnalystCatalog;
use crate::core::{
    TaskGraph, TaskId, TaskKind, TaskSpec, AGGREGATOR_ID, COLLECTOR_ID, JUDGE_ID,
};
use crate::error::{Error, Result};

use super::{DebateRole, DepthProfile, ResearchDepth, RiskStance, Router, WorkflowPhase};

/// Tool used by every debate and risk-panel node.
pub const LLM_TOOL: &str = "llm";

/// A built graph plus what the builder decided along the way.
pub struct GraphInstance {
    graph: TaskGraph,
    profile: DepthProfile,
    debate_rounds: u32,
    analysts: Vec<String>,
    warnings: Vec<String>,
}

impl GraphInstance {
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn profile(&self) -> &DepthProfile {
        &self.profile
    }

    /// Debate rounds actually unrolled. Zero when no analyst was selected,
    /// whatever the depth asked for.
    pub fn debate_rounds(&self) -> u32 {
        self.debate_rounds
    }

    /// Selected analysts that made it into the graph, in request order.
    pub fn analysts(&self) -> &[String] {
        &self.analysts
    }

    /// Selection warnings, one per dropped identifier.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Proponent/opponent node ids, one pair per round.
    pub fn debate_pairs(&self) -> Vec<(TaskId, TaskId)> {
        (1..=self.debate_rounds)
            .map(|round| {
                (
                    TaskId::debater(round, DebateRole::Proponent),
                    TaskId::debater(round, DebateRole::Opponent),
                )
            })
            .filter(|(p, o)| self.graph.contains_task(p) && self.graph.contains_task(o))
            .collect()
    }

    /// Risk-panel nodes, in graph order.
    pub fn reviewers(&self) -> Vec<&TaskSpec> {
        self.graph
            .all_tasks()
            .into_iter()
            .filter(|t| matches!(t.kind, TaskKind::RiskReviewer { .. }))
            .collect()
    }

    /// Nodes that exist only because of the caller's selection or depth.
    pub fn optional_count(&self) -> usize {
        self.graph
            .all_tasks()
            .iter()
            .filter(|t| !t.kind.is_skeleton())
            .count()
    }

    /// Tasks grouped by phase, in execution order. Empty phases are included
    /// so callers can see every barrier.
    pub fn layers(&self) -> Vec<(WorkflowPhase, Vec<&TaskSpec>)> {
        Router::new(self.debate_rounds)
            .plan()
            .into_iter()
            .filter(|phase| *phase != WorkflowPhase::Done)
            .map(|phase| (phase, self.graph.tasks_in_phase(phase)))
            .collect()
    }
}

impl std::fmt::Debug for GraphInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphInstance")
            .field("depth", &self.profile.depth)
            .field("analysts", &self.analysts)
            .field("tasks", &self.graph.task_count())
            .field("edges", &self.graph.dependency_count())
            .field("warnings", &self.warnings)
            .finish()
    }
}

/// Builds graph instances against a catalog.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    catalog: AnalystCatalog,
}

impl GraphBuilder {
    /// Builder over the built-in catalog.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: AnalystCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &AnalystCatalog {
        &self.catalog
    }

    /// Build the graph for `selected` analysts at `depth`.
    ///
    /// Unknown identifiers are dropped with a warning and duplicates collapse
    /// to their first occurrence. An empty filtered selection yields the
    /// skeleton alone: collector, aggregator and judge. Fails only when a node
    /// reads a report key nothing upstream produces.
    pub fn build<S: AsRef<str>>(&self, selected: &[S], depth: ResearchDepth) -> Result<GraphInstance> {
        let profile = depth.profile();
        let (analysts, warnings) = self.resolve_selection(selected);
        for warning in &warnings {
            tracing::warn!(%warning, "analyst selection");
        }

        let specs = self.plan_specs(&analysts, &profile)?;
        let graph = wire(specs)?;
        let debate_rounds = if analysts.is_empty() {
            0
        } else {
            profile.debate_rounds
        };

        tracing::debug!(
            depth = %depth,
            analysts = ?analysts,
            debate_rounds,
            tasks = graph.task_count(),
            edges = graph.dependency_count(),
            "graph built"
        );

        Ok(GraphInstance {
            graph,
            profile,
            debate_rounds,
            analysts,
            warnings,
        })
    }

    fn resolve_selection<S: AsRef<str>>(&self, selected: &[S]) -> (Vec<String>, Vec<String>) {
        let mut analysts: Vec<String> = Vec::new();
        let mut warnings = Vec::new();

        for raw in selected {
            let id = raw.as_ref().trim().to_lowercase();
            if id.is_empty() {
                continue;
            }
            if !self.catalog.contains(&id) {
                warnings.push(format!("unknown analyst '{}' ignored", raw.as_ref().trim()));
                continue;
            }
            if !analysts.contains(&id) {
                analysts.push(id);
            }
        }

        (analysts, warnings)
    }

    fn plan_specs(&self, analysts: &[String], profile: &DepthProfile) -> Result<Vec<TaskSpec>> {
        let mut specs = vec![TaskSpec::new(
            TaskId::new(COLLECTOR_ID),
            TaskKind::Collector,
            WorkflowPhase::Init,
        )];

        for id in analysts {
            let entry = self
                .catalog
                .get(id)
                .ok_or_else(|| Error::Configuration(format!("analyst {} missing from catalog", id)))?;
            specs.push(
                TaskSpec::new(
                    TaskId::new(id),
                    TaskKind::Analyst {
                        analyst: id.clone(),
                    },
                    WorkflowPhase::ParallelAnalysis,
                )
                .with_capabilities(entry.tools.iter().cloned())
                .with_dependencies(entry.depends_on.iter().cloned()),
            );
        }

        if analysts.is_empty() {
            specs.push(
                TaskSpec::new(
                    TaskId::new(AGGREGATOR_ID),
                    TaskKind::Aggregator,
                    WorkflowPhase::RiskPanel,
                )
                .with_dependencies([COLLECTOR_ID]),
            );
            specs.push(
                TaskSpec::new(TaskId::new(JUDGE_ID), TaskKind::Judge, WorkflowPhase::Terminal)
                    .with_dependencies([COLLECTOR_ID]),
            );
            return Ok(specs);
        }

        let mut debate_keys = Vec::new();
        let mut previous_turn: Option<String> = None;
        for round in 1..=profile.debate_rounds {
            for role in [DebateRole::Proponent, DebateRole::Opponent] {
                let id = TaskId::debater(round, role);
                let mut deps = analysts.to_vec();
                if let Some(prev) = previous_turn.take() {
                    deps.push(prev);
                }
                let spec = TaskSpec::new(
                    id,
                    TaskKind::Debater { round, role },
                    WorkflowPhase::DebateRound(round),
                )
                .with_capabilities([LLM_TOOL])
                .with_dependencies(deps);
                previous_turn = Some(spec.output_key.clone());
                debate_keys.push(spec.output_key.clone());
                specs.push(spec);
            }
        }

        let mut aggregator_deps = analysts.to_vec();
        aggregator_deps.extend(debate_keys.iter().cloned());
        specs.push(
            TaskSpec::new(
                TaskId::new(AGGREGATOR_ID),
                TaskKind::Aggregator,
                WorkflowPhase::RiskPanel,
            )
            .with_dependencies(aggregator_deps.clone()),
        );

        let mut reviewer_keys = Vec::new();
        for stance in RiskStance::ALL.into_iter().take(profile.risk_reviewers) {
            let spec = TaskSpec::new(
                TaskId::reviewer(stance),
                TaskKind::RiskReviewer { stance },
                WorkflowPhase::RiskPanel,
            )
            .with_capabilities([LLM_TOOL])
            .with_dependencies([AGGREGATOR_ID]);
            reviewer_keys.push(spec.output_key.clone());
            specs.push(spec);
        }

        let mut judge_deps = aggregator_deps;
        judge_deps.push(AGGREGATOR_ID.to_string());
        judge_deps.extend(reviewer_keys);
        specs.push(
            TaskSpec::new(TaskId::new(JUDGE_ID), TaskKind::Judge, WorkflowPhase::Terminal)
                .with_dependencies(judge_deps),
        );

        Ok(specs)
    }
}

/// Validate declared dependencies and turn specs into a graph.
fn wire(specs: Vec<TaskSpec>) -> Result<TaskGraph> {
    for (i, spec) in specs.iter().enumerate() {
        if specs[..i].iter().any(|s| s.output_key == spec.output_key) {
            return Err(Error::Configuration(format!(
                "report key '{}' is written by more than one task",
                spec.output_key
            )));
        }
    }

    let mut graph = TaskGraph::new();
    for spec in specs {
        graph.add_task(spec);
    }

    let mut edges = Vec::new();
    for task in graph.all_tasks() {
        for key in &task.depends_on {
            let producer = graph
                .producer_of(key)
                .filter(|producer| producer.id != task.id)
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "task '{}' reads '{}' but no upstream task produces it",
                        task.id, key
                    ))
                })?;
            if producer.phase > task.phase {
                return Err(Error::Configuration(format!(
                    "task '{}' in {} reads '{}' produced later in {}",
                    task.id, task.phase, key, producer.phase
                )));
            }
            edges.push((producer.id.clone(), task.id.clone(), key.clone()));
        }
    }

    for (from, to, key) in edges {
        graph
            .add_dependency(&from, &to, &key)
            .map_err(|e| Error::Configuration(e.to_string()))?;
    }

    Ok(graph)
}
