//! Known analysts and what they need.
//!
//! The catalog is the only place analyst identities are defined. The graph
//! builder resolves the caller's selection against it, and analyst tasks read
//! their tools, data sources and cache policy from it.

use crate::core::COLLECTOR_ID;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Seconds in one day.
const DAY_SECS: u64 = 24 * 60 * 60;

/// Static description of one analyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystProfile {
    /// Identifier used in selections and as the report key.
    pub id: String,
    /// One-line description.
    pub description: String,
    /// Tools the analyst may call, in call order.
    pub tools: Vec<String>,
    /// Report keys the analyst reads.
    pub depends_on: Vec<String>,
    /// Preferred data source.
    pub primary_source: String,
    /// Source used when the primary is unhealthy.
    pub fallback_source: String,
    /// How long results may be reused; `None` disables caching.
    #[serde(default, with = "ttl_secs")]
    pub cache_ttl: Option<Duration>,
}

impl AnalystProfile {
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            tools: Vec::new(),
            depends_on: vec![COLLECTOR_ID.to_string()],
            primary_source: String::new(),
            fallback_source: String::new(),
            cache_ttl: None,
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_sources(mut self, primary: &str, fallback: &str) -> Self {
        self.primary_source = primary.to_string();
        self.fallback_source = fallback.to_string();
        self
    }

    pub fn with_dependencies(mut self, keys: &[&str]) -> Self {
        self.depends_on = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// The set of analysts a request may select from.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalystCatalog {
    entries: Vec<AnalystProfile>,
}

impl AnalystCatalog {
    /// Create an empty catalog.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The four built-in analysts.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.insert(
            AnalystProfile::new("market", "Price action and technical indicators")
                .with_tools(&["stock_data", "indicators"])
                .with_sources("exchange_feed", "delayed_quotes"),
        );
        catalog.insert(
            AnalystProfile::new("social", "Social media and retail sentiment")
                .with_tools(&["social_sentiment"])
                .with_sources("social_api", "forum_scrape"),
        );
        catalog.insert(
            AnalystProfile::new("news", "Company and macro news flow")
                .with_tools(&["company_news", "global_news"])
                .with_sources("news_api", "rss_feed")
                .with_cache_ttl(Some(Duration::from_secs(DAY_SECS))),
        );
        catalog.insert(
            AnalystProfile::new("fundamentals", "Financial statements and valuation")
                .with_tools(&["financials", "balance_sheet"])
                .with_sources("filings", "data_vendor")
                .with_cache_ttl(Some(Duration::from_secs(7 * DAY_SECS))),
        );
        catalog
    }

    /// Add or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, profile: AnalystProfile) {
        match self.entries.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.entries.push(profile),
        }
    }

    pub fn get(&self, id: &str) -> Option<&AnalystProfile> {
        self.entries.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut AnalystProfile> {
        self.entries.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Identifiers in catalog order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn profiles(&self) -> &[AnalystProfile] {
        &self.entries
    }

    /// Every distinct data source referenced, in first-seen order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for profile in &self.entries {
            for source in [&profile.primary_source, &profile.fallback_source] {
                if !source.is_empty() && !sources.contains(source) {
                    sources.push(source.clone());
                }
            }
        }
        sources
    }
}

impl Default for AnalystCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        ttl.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
