//! Risk panel reviewers.

use super::{signal_of, AnalystTask, TaskContext, TaskError};
use crate::core::{Report, AGGREGATOR_ID};
use crate::workflow::{RiskStance, LLM_TOOL};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Reviews the aggregator's interim verdict from one stance.
#[derive(Debug, Clone, Copy)]
pub struct RiskReviewer {
    stance: RiskStance,
}

impl RiskReviewer {
    pub fn new(stance: RiskStance) -> Self {
        Self { stance }
    }
}

#[async_trait]
impl AnalystTask for RiskReviewer {
    async fn run(&self, ctx: &TaskContext) -> Result<Report, TaskError> {
        ctx.require_upstream()?;
        let verdict = ctx.upstream(AGGREGATOR_ID)?;
        let verdict_confidence = match verdict.confidence {
            Some(c) if c > 0.0 => c,
            _ => return Err(TaskError::NoEvidence),
        };

        let args = ctx.tool_args(json!({
            "stance": self.stance.to_string(),
            "verdict": {
                "sentiment": verdict.sentiment,
                "confidence": verdict.confidence,
                "narrative": verdict.narrative,
            },
        }));
        let response = ctx.guard.call(LLM_TOOL, args).await?;
        let signal = signal_of(LLM_TOOL, &response)?;
        let assessment = response
            .get("assessment")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} review of {}", self.stance, ctx.env.subject));

        Ok(Report::new(
            ctx.id(),
            &assessment,
            ctx.pipeline().normal_confidence(verdict_confidence),
            signal,
        ))
    }
}
