//! Aggregation engine.
//!
//! Combines a set of reports into one confidence-weighted sentiment and maps
//! it onto a position band:
//!
//! ```text
//! final = Σ(sentiment_i × weight_i × confidence_i) / Σ(weight_i × confidence_i)
//! ```
//!
//! Reports missing either score, or whose identifier has no weight, carry
//! zero weight. A zero denominator yields `final = 0` and flags the decision
//! as low confidence.

mod bands;

pub use bands::{BandTable, PositionBand};

use crate::core::Report;
use crate::error::{Error, Result};
use crate::workflow::{PhaseHistoryEntry, RequestId, ResearchDepth};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Denominators at or below this are treated as zero.
const WEIGHT_EPSILON: f64 = 1e-9;

/// Fixed per-identifier weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(pub BTreeMap<String, f64>);

impl Weights {
    /// Weight for `id`, zero when not configured.
    pub fn get(&self, id: &str) -> f64 {
        self.0.get(id).copied().unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<()> {
        for (id, weight) in &self.0 {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::Validation(format!(
                    "weight for {} must be a non-negative number, got {}",
                    id, weight
                )));
            }
        }
        Ok(())
    }
}

impl Default for Weights {
    fn default() -> Self {
        let pairs = [
            ("market", 0.25),
            ("fundamentals", 0.25),
            ("news", 0.15),
            ("social", 0.15),
            ("proponent", 0.05),
            ("opponent", 0.05),
            ("risk.aggressive", 0.03),
            ("risk.conservative", 0.04),
            ("risk.neutral", 0.03),
        ];
        Self(
            pairs
                .into_iter()
                .map(|(id, w)| (id.to_string(), w))
                .collect(),
        )
    }
}

/// Aggregation settings: weights plus band breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregationConfig {
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub bands: BandTable,
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.bands.validate()
    }
}

/// One report's share of the final sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Identifier the report was submitted under.
    pub id: String,
    /// Configured weight.
    pub weight: f64,
    /// Report confidence, if present.
    pub confidence: Option<f64>,
    /// Report sentiment, if present.
    pub sentiment: Option<f64>,
    /// `weight × confidence`, zero when excluded.
    pub effective_weight: f64,
    /// Whether the report entered the weighted sum.
    pub included: bool,
    /// Whether the report came from a degraded path.
    pub degraded: bool,
}

/// Audit metadata attached by the orchestrator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Audit {
    pub request_id: Option<RequestId>,
    pub subject: String,
    pub as_of: Option<NaiveDate>,
    pub depth: Option<ResearchDepth>,
    /// Nodes that ran, in execution order.
    pub nodes_run: Vec<String>,
    /// Nodes whose report came from a degraded path, with the reason.
    pub degraded: BTreeMap<String, String>,
    /// Cache hits during the request.
    pub cache_hits: u64,
    /// Cache misses (including store outages) during the request.
    pub cache_misses: u64,
    /// Tool calls issued per task.
    pub tool_calls: BTreeMap<String, u32>,
    /// Selection warnings from the graph builder.
    pub warnings: Vec<String>,
    /// Phases entered, in order, with timestamps.
    pub phases: Vec<PhaseHistoryEntry>,
    /// Debate rounds completed.
    pub debate_rounds: u32,
}

/// Output of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Confidence-weighted sentiment in `[-1, 1]`.
    pub final_sentiment: f64,
    /// Band selected for `final_sentiment`.
    pub position: PositionBand,
    /// Set when no report carried any effective weight.
    pub low_confidence: bool,
    /// Every submitted report and whether it counted.
    pub contributions: Vec<Contribution>,
    /// Per-analyst reports, for auditability.
    #[serde(default)]
    pub reports: BTreeMap<String, Report>,
    /// Filled in by the orchestrator.
    #[serde(default)]
    pub audit: Audit,
}

impl Decision {
    /// Identifiers of the reports that entered the weighted sum.
    pub fn contributors(&self) -> Vec<&str> {
        self.contributions
            .iter()
            .filter(|c| c.included)
            .map(|c| c.id.as_str())
            .collect()
    }
}

/// Stateless aggregation over a band table.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    bands: BandTable,
}

impl AggregationEngine {
    pub fn new(bands: BandTable) -> Self {
        Self { bands }
    }

    pub fn from_config(config: &AggregationConfig) -> Self {
        Self::new(config.bands.clone())
    }

    pub fn bands(&self) -> &BandTable {
        &self.bands
    }

    /// Combine `reports` into a decision using `weights`.
    pub fn aggregate(&self, reports: &BTreeMap<String, Report>, weights: &Weights) -> Decision {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        let mut contributions = Vec::with_capacity(reports.len());

        for (id, report) in reports {
            let weight = weights.get(id);
            let scored = match (report.confidence, report.sentiment) {
                (Some(c), Some(s)) if c.is_finite() && s.is_finite() => Some((c, s)),
                _ => None,
            };

            let effective_weight = match scored {
                Some((confidence, sentiment)) => {
                    let w = weight * confidence;
                    numerator += sentiment * w;
                    denominator += w;
                    w
                }
                None => {
                    tracing::debug!(report = %id, "report missing confidence or sentiment, excluded");
                    0.0
                }
            };

            contributions.push(Contribution {
                id: id.clone(),
                weight,
                confidence: report.confidence,
                sentiment: report.sentiment,
                effective_weight,
                included: effective_weight > WEIGHT_EPSILON,
                degraded: report.is_degraded(),
            });
        }

        let low_confidence = denominator <= WEIGHT_EPSILON;
        let final_sentiment = if low_confidence {
            0.0
        } else {
            (numerator / denominator).clamp(-1.0, 1.0)
        };

        Decision {
            final_sentiment,
            position: self.bands.band_for(final_sentiment).clone(),
            low_confidence,
            contributions,
            reports: BTreeMap::new(),
            audit: Audit::default(),
        }
    }
}
