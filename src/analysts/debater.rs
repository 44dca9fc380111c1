//! Debate participants.

use super::{mean, signal_of, AnalystTask, TaskContext, TaskError};
use crate::core::{debate_turn, Report, COLLECTOR_ID};
use crate::workflow::{DebateRole, LLM_TOOL};
use async_trait::async_trait;
use serde_json::{json, Value};

/// One side of one debate round.
///
/// Argues from the analyst reports and the transcript of earlier turns, then
/// appends its argument to the debate record.
#[derive(Debug, Clone, Copy)]
pub struct Debater {
    round: u32,
    role: DebateRole,
}

impl Debater {
    pub fn new(round: u32, role: DebateRole) -> Self {
        Self { round, role }
    }
}

#[async_trait]
impl AnalystTask for Debater {
    async fn run(&self, ctx: &TaskContext) -> Result<Report, TaskError> {
        let upstream = ctx.require_upstream()?;
        let evidence: Vec<(String, Report)> = upstream
            .into_iter()
            .filter(|(key, report)| {
                key != COLLECTOR_ID
                    && debate_turn(key).is_none()
                    && report.is_scorable()
                    && !report.is_degraded()
            })
            .collect();
        if evidence.is_empty() {
            return Err(TaskError::NoEvidence);
        }

        let briefs: Vec<Value> = evidence
            .iter()
            .map(|(key, r)| {
                json!({
                    "analyst": key,
                    "sentiment": r.sentiment,
                    "confidence": r.confidence,
                    "narrative": r.narrative,
                })
            })
            .collect();
        let args = ctx.tool_args(json!({
            "role": self.role.to_string(),
            "bias": self.role.bias(),
            "round": self.round,
            "evidence": briefs,
            "history": ctx.state().debate_transcript(),
        }));

        let response = ctx.guard.call(LLM_TOOL, args).await?;
        let signal = signal_of(LLM_TOOL, &response)?;
        let argument = response
            .get("argument")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} case for {}", self.role, ctx.env.subject));

        let confidences: Vec<f64> = evidence.iter().filter_map(|(_, r)| r.confidence).collect();
        let quality = mean(&confidences).unwrap_or(0.0);
        let report = Report::new(
            ctx.id(),
            &argument,
            ctx.pipeline().normal_confidence(quality),
            signal,
        );

        if let Err(e) = ctx.state().append_debate(self.round, self.role, report.clone()) {
            tracing::warn!(task = %ctx.spec.id, error = %e, "debate record rejected argument");
        }
        Ok(report)
    }
}
