use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::AggregationConfig;
use crate::analysts::AnalystCatalog;
use crate::{Error, Result};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Limits and confidence levels applied to every task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// External calls allowed per task per request.
    #[serde(default = "default_tool_call_limit")]
    pub tool_call_limit: u32,
    /// Per-task timeout enforced by the orchestrator.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Lowest confidence a normal-path report may claim.
    #[serde(default = "default_normal_confidence_floor")]
    pub normal_confidence_floor: f64,
    /// Confidence assigned to degraded reports.
    #[serde(default = "default_degraded_confidence")]
    pub degraded_confidence: f64,
}

fn default_tool_call_limit() -> u32 {
    3
}

fn default_task_timeout_secs() -> u64 {
    120
}

fn default_normal_confidence_floor() -> f64 {
    0.5
}

fn default_degraded_confidence() -> f64 {
    0.25
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tool_call_limit: default_tool_call_limit(),
            task_timeout_secs: default_task_timeout_secs(),
            normal_confidence_floor: default_normal_confidence_floor(),
            degraded_confidence: default_degraded_confidence(),
        }
    }
}

impl PipelineConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Confidence for a normal-path report whose evidence quality is
    /// `quality` in `[0, 1]`. Never below the floor.
    pub fn normal_confidence(&self, quality: f64) -> f64 {
        let quality = if quality.is_nan() { 0.0 } else { quality.clamp(0.0, 1.0) };
        self.normal_confidence_floor + (1.0 - self.normal_confidence_floor) * quality
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Default entry lifetime in days.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
    /// Store directory; `~/.tribunal/cache` when unset.
    pub dir: Option<String>,
    /// Per-analyst lifetime in days. Zero disables caching for that analyst.
    #[serde(default)]
    pub ttl_overrides: BTreeMap<String, u64>,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_ttl_days() -> u64 {
    7
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_days: default_ttl_days(),
            dir: None,
            ttl_overrides: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(SECS_PER_DAY))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Config::tribunal_dir()?.join("cache")),
        }
    }
}

/// Primary and fallback data source names for one analyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePair {
    pub primary: String,
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    /// Per-analyst source overrides.
    #[serde(default)]
    pub analysts: BTreeMap<String, SourcePair>,
    /// Sources pinned unhealthy regardless of probes.
    #[serde(default)]
    pub unhealthy: Vec<String>,
}

impl Config {
    pub fn tribunal_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".tribunal"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::tribunal_dir()?.join("tribunal.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Config::load");
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        tracing::debug!(
            tool_call_limit = config.pipeline.tool_call_limit,
            task_timeout_secs = config.pipeline.task_timeout_secs,
            cache_enabled = config.cache.enabled,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tracing::debug!(dir = %parent.display(), "Creating config directory");
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_toml()?)?;
        tracing::debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        if !(p.normal_confidence_floor > 0.0 && p.normal_confidence_floor <= 1.0) {
            return Err(Error::Validation(format!(
                "normal_confidence_floor must be in (0, 1], got {}",
                p.normal_confidence_floor
            )));
        }
        if !(p.degraded_confidence >= 0.0 && p.degraded_confidence < p.normal_confidence_floor) {
            return Err(Error::Validation(format!(
                "degraded_confidence must be in [0, {}), got {}",
                p.normal_confidence_floor, p.degraded_confidence
            )));
        }
        if p.task_timeout_secs == 0 {
            return Err(Error::Validation(
                "task_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.ttl_days == 0 {
            return Err(Error::Validation(
                "cache.ttl_days must be greater than zero when the cache is enabled".to_string(),
            ));
        }
        self.aggregation.validate()
    }

    /// The built-in catalog with source and TTL overrides applied.
    pub fn catalog(&self) -> AnalystCatalog {
        let mut catalog = AnalystCatalog::builtin();
        for (id, pair) in &self.sources.analysts {
            match catalog.get_mut(id) {
                Some(profile) => {
                    profile.primary_source = pair.primary.clone();
                    profile.fallback_source = pair.fallback.clone();
                }
                None => tracing::warn!(analyst = %id, "source override for unknown analyst"),
            }
        }
        for (id, days) in &self.cache.ttl_overrides {
            match catalog.get_mut(id) {
                Some(profile) => {
                    profile.cache_ttl = if *days == 0 {
                        None
                    } else {
                        Some(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
                    };
                }
                None => tracing::warn!(analyst = %id, "cache TTL override for unknown analyst"),
            }
        }
        catalog
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
