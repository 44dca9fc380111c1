//! Health-check node.

use super::{AnalystTask, TaskContext, TaskError};
use crate::core::Report;
use async_trait::async_trait;

/// Probes every catalog data source and records the flags in shared state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collector;

#[async_trait]
impl AnalystTask for Collector {
    async fn run(&self, ctx: &TaskContext) -> Result<Report, TaskError> {
        let sources = ctx.env.catalog.sources();
        let mut down = Vec::new();

        for source in &sources {
            let healthy = ctx.env.health.is_healthy(source).await;
            ctx.state().set_source_health(source, healthy);
            if !healthy {
                down.push(source.clone());
            }
        }

        let up = sources.len() - down.len();
        let ratio = if sources.is_empty() {
            1.0
        } else {
            up as f64 / sources.len() as f64
        };
        tracing::info!(healthy = up, total = sources.len(), "data sources probed");

        let mut report = Report::new(
            ctx.id(),
            &format!("{} of {} data sources healthy", up, sources.len()),
            ratio,
            0.0,
        );
        if !down.is_empty() {
            report = report.with_note(format!("unhealthy: {}", down.join(", ")));
        }
        Ok(report)
    }
}
