pub mod aggregate;
pub mod analysts;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod providers;
pub mod state;
pub mod workflow;

pub use error::{Error, Result};
pub use orchestration::{AnalysisRequest, Orchestrator, OrchestratorEvent};
