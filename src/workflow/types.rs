//! Core workflow type definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on debate rounds for any depth level.
pub const MAX_DEBATE_ROUNDS: u32 = 5;

/// Unique identifier for one pipeline request.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new unique request identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How much prompting effort analyst tasks should spend.
///
/// The graph builder only forwards this; analyst tasks pass it on to their
/// tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStrength {
    Light,
    Standard,
    Deep,
}

impl std::fmt::Display for PromptStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptStrength::Light => write!(f, "light"),
            PromptStrength::Standard => write!(f, "standard"),
            PromptStrength::Deep => write!(f, "deep"),
        }
    }
}

/// Research depth requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResearchDepth {
    /// Analysts only.
    Quick,
    /// One debate round and the risk panel.
    Basic,
    /// Two debate rounds and the risk panel.
    #[default]
    Standard,
    /// Three debate rounds, deep prompts.
    Deep,
    /// Maximum debate rounds, deep prompts.
    Comprehensive,
}

impl ResearchDepth {
    /// All depth levels, shallowest first.
    pub const ALL: [ResearchDepth; 5] = [
        ResearchDepth::Quick,
        ResearchDepth::Basic,
        ResearchDepth::Standard,
        ResearchDepth::Deep,
        ResearchDepth::Comprehensive,
    ];

    /// The graph shape this depth maps to.
    pub fn profile(&self) -> DepthProfile {
        let (debate_rounds, risk_reviewers, prompt_strength) = match self {
            ResearchDepth::Quick => (0, 0, PromptStrength::Light),
            ResearchDepth::Basic => (1, RiskStance::ALL.len(), PromptStrength::Light),
            ResearchDepth::Standard => (2, RiskStance::ALL.len(), PromptStrength::Standard),
            ResearchDepth::Deep => (3, RiskStance::ALL.len(), PromptStrength::Deep),
            ResearchDepth::Comprehensive => {
                (MAX_DEBATE_ROUNDS, RiskStance::ALL.len(), PromptStrength::Deep)
            }
        };
        DepthProfile {
            depth: *self,
            debate_rounds,
            risk_reviewers,
            prompt_strength,
        }
    }
}

impl std::fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchDepth::Quick => write!(f, "quick"),
            ResearchDepth::Basic => write!(f, "basic"),
            ResearchDepth::Standard => write!(f, "standard"),
            ResearchDepth::Deep => write!(f, "deep"),
            ResearchDepth::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

impl std::str::FromStr for ResearchDepth {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "quick" => Ok(ResearchDepth::Quick),
            "2" | "basic" => Ok(ResearchDepth::Basic),
            "3" | "standard" => Ok(ResearchDepth::Standard),
            "4" | "deep" => Ok(ResearchDepth::Deep),
            "5" | "comprehensive" => Ok(ResearchDepth::Comprehensive),
            other => Err(crate::Error::Validation(format!(
                "unknown research depth: {}",
                other
            ))),
        }
    }
}

/// Concrete graph sizing derived from a [`ResearchDepth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthProfile {
    /// The depth this profile was derived from.
    pub depth: ResearchDepth,
    /// Number of proponent/opponent round pairs.
    pub debate_rounds: u32,
    /// Number of risk-panel reviewers.
    pub risk_reviewers: usize,
    /// Prompt strength forwarded to analyst tasks.
    pub prompt_strength: PromptStrength,
}

/// The two sides of a debate round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateRole {
    /// Argues for the position (bull).
    Proponent,
    /// Argues against the position (bear).
    Opponent,
}

impl DebateRole {
    /// Sign applied to the role's stance.
    pub fn bias(&self) -> f64 {
        match self {
            DebateRole::Proponent => 1.0,
            DebateRole::Opponent => -1.0,
        }
    }
}

impl std::fmt::Display for DebateRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebateRole::Proponent => write!(f, "proponent"),
            DebateRole::Opponent => write!(f, "opponent"),
        }
    }
}

/// Stance of a risk-panel reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStance {
    Aggressive,
    Conservative,
    Neutral,
}

impl RiskStance {
    /// The full reviewer set, in graph order.
    pub const ALL: [RiskStance; 3] = [
        RiskStance::Aggressive,
        RiskStance::Conservative,
        RiskStance::Neutral,
    ];
}

impl std::fmt::Display for RiskStance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStance::Aggressive => write!(f, "aggressive"),
            RiskStance::Conservative => write!(f, "conservative"),
            RiskStance::Neutral => write!(f, "neutral"),
        }
    }
}

/// Phases of one pipeline request.
///
/// 1. Init - collector / health check
/// 2. ParallelAnalysis - selected analysts, behind one barrier
/// 3. DebateRound(n) - proponent then opponent, strictly sequential
/// 4. RiskPanel - aggregator, then reviewers behind one barrier
/// 5. Terminal - judge
/// 6. Done - decision returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Init,
    ParallelAnalysis,
    DebateRound(u32),
    RiskPanel,
    Terminal,
    Done,
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowPhase::Init => write!(f, "init"),
            WorkflowPhase::ParallelAnalysis => write!(f, "parallel_analysis"),
            WorkflowPhase::DebateRound(n) => write!(f, "debate_round({})", n),
            WorkflowPhase::RiskPanel => write!(f, "risk_panel"),
            WorkflowPhase::Terminal => write!(f, "terminal"),
            WorkflowPhase::Done => write!(f, "done"),
        }
    }
}
