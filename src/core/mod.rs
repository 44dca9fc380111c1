//! Core domain models for the analysis pipeline.
//!
//! This module contains the fundamental data structures used throughout
//! the orchestration system: task specifications, the task graph and the
//! reports tasks produce.

pub mod dag;
pub mod report;
pub mod task;

pub use dag::{Dependency, TaskGraph};
pub use report::{DegradeReason, Report};
pub use task::{debate_turn, TaskId, TaskKind, TaskSpec, AGGREGATOR_ID, COLLECTOR_ID, JUDGE_ID};
