//! Phase routing with transition validation.
//!
//! The `Router` tracks which phase a request is in and enforces the
//! ordering:
//!
//! Init -> ParallelAnalysis -> DebateRound(1..=n) -> RiskPanel -> Terminal -> Done
//!
//! With zero debate rounds ParallelAnalysis goes straight to RiskPanel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{WorkflowPhase, MAX_DEBATE_ROUNDS};

/// A record of a phase transition with timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    /// The phase that was entered.
    pub phase: WorkflowPhase,
    /// When this phase was entered.
    pub entered_at: DateTime<Utc>,
}

/// Drives one request through its phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Router {
    /// Configured debate rounds, never above `MAX_DEBATE_ROUNDS`.
    rounds: u32,
    /// The phase currently executing.
    current: WorkflowPhase,
    /// History of all phases visited, in order.
    phase_history: Vec<PhaseHistoryEntry>,
}

impl Router {
    /// Create a router at `Init` for a request with `rounds` debate rounds.
    ///
    /// Rounds above `MAX_DEBATE_ROUNDS` are clamped.
    pub fn new(rounds: u32) -> Self {
        if rounds > MAX_DEBATE_ROUNDS {
            tracing::warn!(rounds, max = MAX_DEBATE_ROUNDS, "debate rounds clamped");
        }
        Self {
            rounds: rounds.min(MAX_DEBATE_ROUNDS),
            current: WorkflowPhase::Init,
            phase_history: vec![PhaseHistoryEntry {
                phase: WorkflowPhase::Init,
                entered_at: Utc::now(),
            }],
        }
    }

    /// The phase that must follow the current one, or `None` once done.
    pub fn next_phase(&self) -> Option<WorkflowPhase> {
        match self.current {
            WorkflowPhase::Init => Some(WorkflowPhase::ParallelAnalysis),
            WorkflowPhase::ParallelAnalysis if self.rounds == 0 => Some(WorkflowPhase::RiskPanel),
            WorkflowPhase::ParallelAnalysis => Some(WorkflowPhase::DebateRound(1)),
            WorkflowPhase::DebateRound(n) if n < self.rounds => {
                Some(WorkflowPhase::DebateRound(n + 1))
            }
            WorkflowPhase::DebateRound(_) => Some(WorkflowPhase::RiskPanel),
            WorkflowPhase::RiskPanel => Some(WorkflowPhase::Terminal),
            WorkflowPhase::Terminal => Some(WorkflowPhase::Done),
            WorkflowPhase::Done => None,
        }
    }

    /// Check if a transition to `target` is valid from the current phase.
    ///
    /// Exactly one successor is valid from every phase except `Done`.
    pub fn can_transition(&self, target: WorkflowPhase) -> bool {
        self.next_phase() == Some(target)
    }

    /// Attempt to transition to `target`.
    pub fn transition(&mut self, target: WorkflowPhase) -> Result<()> {
        if !self.can_transition(target) {
            return Err(Error::InvalidPhaseTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }

        tracing::debug!(from = %self.current, to = %target, "phase transition");
        self.current = target;
        self.phase_history.push(PhaseHistoryEntry {
            phase: target,
            entered_at: Utc::now(),
        });

        Ok(())
    }

    /// Move to the next phase and return it.
    pub fn advance(&mut self) -> Result<WorkflowPhase> {
        let target = self.next_phase().ok_or_else(|| Error::InvalidPhaseTransition {
            from: self.current.to_string(),
            to: "none".to_string(),
        })?;
        self.transition(target)?;
        Ok(target)
    }

    /// The full phase sequence for this request, `Init` through `Done`.
    pub fn plan(&self) -> Vec<WorkflowPhase> {
        let mut probe = Router::new(self.rounds);
        let mut phases = vec![probe.current];
        while let Ok(phase) = probe.advance() {
            phases.push(phase);
        }
        phases
    }

    /// Get the current phase.
    pub fn current_phase(&self) -> WorkflowPhase {
        self.current
    }

    /// The debate round currently executing, or the last one reached.
    pub fn debate_round(&self) -> u32 {
        self.phase_history
            .iter()
            .filter_map(|entry| match entry.phase {
                WorkflowPhase::DebateRound(n) => Some(n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Whether the request has finished.
    pub fn is_done(&self) -> bool {
        self.current == WorkflowPhase::Done
    }

    /// Get the history of all phases visited, in order.
    pub fn phase_history(&self) -> &[PhaseHistoryEntry] {
        &self.phase_history
    }
}
