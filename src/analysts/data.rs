//! Data-gathering analysts: market, social, news, fundamentals.

use super::{mean, signal_of, AnalystProfile, AnalystTask, TaskContext, TaskError};
use crate::cache::{cache_key, BoundedCache, Computed, TimeBucket};
use crate::core::Report;
use crate::state::GuardError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// An analyst driven by its catalog profile.
///
/// Calls each of its tools once against the healthiest configured source,
/// averages the returned signals and reuses results through the cache when
/// the profile allows it. Only reports backed by every tool are cached; a
/// partial one is recomputed on the next request.
#[derive(Debug, Clone)]
pub struct DataAnalyst {
    analyst: String,
}

impl DataAnalyst {
    pub fn new(analyst: &str) -> Self {
        Self {
            analyst: analyst.to_string(),
        }
    }

    fn profile<'a>(&self, ctx: &'a TaskContext) -> Result<&'a AnalystProfile, TaskError> {
        ctx.env
            .catalog
            .get(&self.analyst)
            .ok_or_else(|| TaskError::UnknownAnalyst(self.analyst.clone()))
    }

    /// Call every tool once. The flag is `true` when no tool failed.
    async fn gather(&self, ctx: &TaskContext, source: &str) -> Result<(Report, bool), TaskError> {
        let mut signals = Vec::new();
        let mut summaries = Vec::new();
        let mut last_error = None;
        let attempts = ctx.spec.capabilities.len();

        for tool in &ctx.spec.capabilities {
            let args = ctx.tool_args(json!({ "analyst": self.analyst, "source": source }));
            let outcome = match ctx.guard.call(tool, args).await {
                Ok(response) => signal_of(tool, &response).map(|s| (s, response)),
                Err(e @ GuardError::LimitReached { .. }) => return Err(e.into()),
                Err(e) => Err(e.into()),
            };

            match outcome {
                Ok((signal, response)) => {
                    signals.push(signal);
                    if let Some(summary) = response.get("summary").and_then(Value::as_str) {
                        summaries.push(summary.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!(task = %ctx.spec.id, tool = %tool, error = %e, "tool call failed");
                    last_error = Some(e);
                }
            }
        }

        let sentiment = match mean(&signals) {
            Some(s) => s,
            None => return Err(last_error.unwrap_or(TaskError::NoEvidence)),
        };
        let quality = signals.len() as f64 / attempts.max(1) as f64;

        let narrative = if summaries.is_empty() {
            format!("{} analysis of {}", self.analyst, ctx.env.subject)
        } else {
            summaries.join("; ")
        };
        let mut report = Report::new(
            ctx.id(),
            &narrative,
            ctx.pipeline().normal_confidence(quality),
            sentiment,
        )
        .with_note(format!("source: {}", source));
        let complete = last_error.is_none();
        if let Some(e) = last_error {
            report = report.with_note(format!("partial: {}", e));
        }
        Ok((report, complete))
    }

    /// Serve from the cache, or gather and store a complete report.
    async fn gather_cached(
        &self,
        ctx: &TaskContext,
        source: &str,
        cache: &BoundedCache,
        ttl: Duration,
    ) -> Result<Report, TaskError> {
        let key = cache_key(
            ctx.id(),
            &ctx.env.subject,
            ctx.env.as_of,
            TimeBucket::for_ttl(ttl),
        );

        let outcome = cache
            .get_or_compute(&key, Some(ttl), || async move {
                let (report, complete) = self.gather(ctx, source).await?;
                let value = serde_json::to_value(&report).map_err(|e| TaskError::Malformed {
                    tool: ctx.id().to_string(),
                    message: e.to_string(),
                })?;
                Ok::<_, TaskError>(if complete {
                    Computed::keep(value)
                } else {
                    Computed::transient(value)
                })
            })
            .await;

        let (value, hit) = match outcome {
            Ok(found) => found,
            Err(e) => {
                ctx.state().record_cache_lookup(false);
                return Err(e);
            }
        };
        ctx.state().record_cache_lookup(hit);

        match serde_json::from_value::<Report>(value) {
            Ok(report) if hit => Ok(report.with_note("served from cache")),
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "ignoring malformed cache entry");
                self.gather(ctx, source).await.map(|(report, _)| report)
            }
        }
    }
}

#[async_trait]
impl AnalystTask for DataAnalyst {
    async fn run(&self, ctx: &TaskContext) -> Result<Report, TaskError> {
        let profile = self.profile(ctx)?;
        ctx.require_upstream()?;

        let source = if ctx.state().is_source_healthy(&profile.primary_source) {
            profile.primary_source.clone()
        } else {
            tracing::info!(
                task = %ctx.spec.id,
                primary = %profile.primary_source,
                fallback = %profile.fallback_source,
                "primary source unhealthy, using fallback"
            );
            profile.fallback_source.clone()
        };

        match (&ctx.env.cache, profile.cache_ttl) {
            (Some(cache), Some(ttl)) => self.gather_cached(ctx, &source, cache, ttl).await,
            _ => self.gather(ctx, &source).await.map(|(report, _)| report),
        }
    }
}
