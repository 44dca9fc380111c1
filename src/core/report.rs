//! Structured task output.
//!
//! Every node in the graph produces exactly one [`Report`]. Scores are kept
//! optional so that malformed or partial output can be represented and then
//! ignored by aggregation instead of being coerced to zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a task took its degraded path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum DegradeReason {
    /// The per-task tool-call limit was reached.
    ToolLimit,
    /// The orchestrator's per-task timeout fired.
    Timeout,
    /// A required upstream report was absent.
    MissingUpstream {
        /// The report key that was expected.
        key: String,
    },
    /// The normal path returned an error.
    Error {
        /// Error message from the normal path.
        message: String,
    },
    /// The task panicked and the orchestrator synthesized its report.
    Panicked,
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::ToolLimit => write!(f, "tool_limit"),
            DegradeReason::Timeout => write!(f, "timeout"),
            DegradeReason::MissingUpstream { key } => write!(f, "missing_upstream: {}", key),
            DegradeReason::Error { message } => write!(f, "error: {}", message),
            DegradeReason::Panicked => write!(f, "panicked"),
        }
    }
}

/// Output of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Identifier of the task that produced this report.
    pub produced_by: String,
    /// Free-form narrative.
    pub narrative: String,
    /// Confidence in `[0, 1]`.
    pub confidence: Option<f64>,
    /// Sentiment in `[-1, 1]`.
    pub sentiment: Option<f64>,
    /// Set when the report came from a degraded path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradeReason>,
    /// Explanatory notes, e.g. which data source was used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// When the report was produced.
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Create a normal-path report. Scores are clamped into range.
    pub fn new(produced_by: &str, narrative: &str, confidence: f64, sentiment: f64) -> Self {
        Self {
            produced_by: produced_by.to_string(),
            narrative: narrative.to_string(),
            confidence: Some(clamp_confidence(confidence)),
            sentiment: Some(clamp_sentiment(sentiment)),
            degraded: None,
            notes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a degraded report.
    pub fn degraded(
        produced_by: &str,
        reason: DegradeReason,
        confidence: f64,
        sentiment: f64,
    ) -> Self {
        let narrative = format!("{} produced a degraded result ({})", produced_by, reason);
        Self {
            produced_by: produced_by.to_string(),
            narrative,
            confidence: Some(clamp_confidence(confidence)),
            sentiment: Some(clamp_sentiment(sentiment)),
            degraded: Some(reason),
            notes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Both scores are present and finite.
    pub fn is_scorable(&self) -> bool {
        matches!(
            (self.confidence, self.sentiment),
            (Some(c), Some(s)) if c.is_finite() && s.is_finite()
        )
    }

    /// Whether the report came from a degraded path.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn clamp_sentiment(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}
