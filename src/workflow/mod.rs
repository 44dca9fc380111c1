//! Workflow types for the analysis pipeline.
//!
//! This module provides the phase model, the per-request graph builder and
//! the router that walks a request through its phases.

pub mod builder;
pub mod router;
mod types;

pub use builder::{GraphBuilder, GraphInstance, LLM_TOOL};
pub use router::{PhaseHistoryEntry, Router};
pub use types::{
    DebateRole, DepthProfile, PromptStrength, RequestId, ResearchDepth, RiskStance,
    WorkflowPhase, MAX_DEBATE_ROUNDS,
};
