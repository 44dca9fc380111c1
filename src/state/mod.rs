//! Request-scoped state shared between tasks.
//!
//! This module provides the report store, tool-call counters and debate
//! history for one request, plus the guard tasks use to reach external
//! tools.

mod debate;
mod guard;
mod shared;

pub use debate::{DebateEntry, DebateRecord};
pub use guard::{GuardError, ToolCallGuard};
pub use shared::SharedState;
