//! Task specifications for the execution graph.
//!
//! A [`TaskSpec`] is the immutable description of one node: what it is,
//! which tools it may call, which report keys it reads and which key it
//! writes. Specs are produced by the graph builder and never modified once
//! the graph is built.

use crate::workflow::{DebateRole, RiskStance, WorkflowPhase};
use serde::{Deserialize, Serialize};

/// Identifier of the always-present health-check node.
pub const COLLECTOR_ID: &str = "collector";
/// Identifier of the always-present aggregation node.
pub const AGGREGATOR_ID: &str = "aggregator";
/// Identifier of the always-present terminal node.
pub const JUDGE_ID: &str = "judge";

/// Stable identifier for a task within a graph.
///
/// Unlike request ids these are deterministic strings, so the same selection
/// and depth always produce the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier of the debate node for `round` and `role`.
    pub fn debater(round: u32, role: DebateRole) -> Self {
        Self(format!("debate.r{}.{}", round, role))
    }

    /// Identifier of the risk reviewer with `stance`.
    pub fn reviewer(stance: RiskStance) -> Self {
        Self(format!("risk.{}", stance))
    }
}

/// Round and role encoded in a debate node id or report key.
pub fn debate_turn(key: &str) -> Option<(u32, DebateRole)> {
    let rest = key.strip_prefix("debate.r")?;
    let (round, role) = rest.split_once('.')?;
    let round = round.parse().ok()?;
    let role = match role {
        "proponent" => DebateRole::Proponent,
        "opponent" => DebateRole::Opponent,
        _ => return None,
    };
    Some((round, role))
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What a node does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TaskKind {
    /// Health check over all configured data sources.
    Collector,
    /// An optional analyst selected by the caller.
    Analyst {
        /// Catalog identifier, e.g. `market`.
        analyst: String,
    },
    /// One side of one debate round.
    Debater {
        /// 1-based round number.
        round: u32,
        /// Which side this node argues.
        role: DebateRole,
    },
    /// Combines analyst and debate output into an interim verdict.
    Aggregator,
    /// One member of the risk panel.
    RiskReviewer {
        /// The reviewer's stance.
        stance: RiskStance,
    },
    /// Produces the final decision.
    Judge,
}

impl TaskKind {
    /// Skeleton nodes exist regardless of the caller's selection.
    pub fn is_skeleton(&self) -> bool {
        matches!(
            self,
            TaskKind::Collector | TaskKind::Aggregator | TaskKind::Judge
        )
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Collector => write!(f, "collector"),
            TaskKind::Analyst { analyst } => write!(f, "analyst({})", analyst),
            TaskKind::Debater { round, role } => write!(f, "debater(r{}, {})", round, role),
            TaskKind::Aggregator => write!(f, "aggregator"),
            TaskKind::RiskReviewer { stance } => write!(f, "risk_reviewer({})", stance),
            TaskKind::Judge => write!(f, "judge"),
        }
    }
}

/// Immutable description of one node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique identifier.
    pub id: TaskId,
    /// What the node does.
    pub kind: TaskKind,
    /// Phase in which the node runs.
    pub phase: WorkflowPhase,
    /// Tools the node may call.
    pub capabilities: Vec<String>,
    /// Report keys the node reads.
    pub depends_on: Vec<String>,
    /// Report key the node writes.
    pub output_key: String,
}

impl TaskSpec {
    /// Create a spec whose output key equals its id.
    pub fn new(id: TaskId, kind: TaskKind, phase: WorkflowPhase) -> Self {
        let output_key = id.0.clone();
        Self {
            id,
            kind,
            phase,
            capabilities: Vec::new(),
            depends_on: Vec::new(),
            output_key,
        }
    }

    pub fn with_capabilities<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the node may call `tool`.
    pub fn may_call(&self, tool: &str) -> bool {
        self.capabilities.iter().any(|t| t == tool)
    }
}
