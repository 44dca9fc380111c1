//! Request orchestration.
//!
//! Drives one analysis request from graph construction through the phase
//! barriers to the final decision.

mod orchestrator;

pub use orchestrator::{AnalysisRequest, Orchestrator, OrchestratorEvent};
