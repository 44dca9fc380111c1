//! Data source health registry.
//!
//! The `HealthRegistry` is shared across requests. Sources default to
//! healthy; flags are flipped by whoever observes an outage, or pinned from
//! configuration.

use super::HealthStatus;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-process [`HealthStatus`] implementation.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    flags: RwLock<HashMap<String, bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the given sources pinned unhealthy.
    pub fn with_unhealthy<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        for source in sources {
            registry.mark(&source.into(), false);
        }
        registry
    }

    /// Record the health of `source`.
    pub fn mark(&self, source: &str, healthy: bool) {
        let previous = self.flags.write().insert(source.to_string(), healthy);
        if previous != Some(healthy) {
            tracing::info!(source, healthy, "source health changed");
        }
    }

    pub fn get(&self, source: &str) -> bool {
        self.flags.read().get(source).copied().unwrap_or(true)
    }

    /// Sources currently flagged unhealthy, sorted.
    pub fn unhealthy(&self) -> Vec<String> {
        let mut down: Vec<String> = self
            .flags
            .read()
            .iter()
            .filter(|(_, healthy)| !**healthy)
            .map(|(source, _)| source.clone())
            .collect();
        down.sort();
        down
    }
}

#[async_trait]
impl HealthStatus for HealthRegistry {
    async fn is_healthy(&self, source: &str) -> bool {
        self.get(source)
    }
}
