//! Cache reuse across requests and behavior when the store is down.

use std::sync::Arc;

use tempfile::TempDir;
use tribunal::cache::{BoundedCache, FileStore, MemoryStore};
use tribunal::workflow::ResearchDepth;

use crate::fixtures::{request, Harness, ScriptedProvider, UnavailableStore};

const CACHED: [&str; 2] = ["fundamentals", "news"];

#[tokio::test]
async fn test_second_request_reuses_cached_reports() {
    let cache = BoundedCache::new(Arc::new(MemoryStore::new()));

    let first = Harness::new(ScriptedProvider::uniform(0.35)).with_cache(cache.clone());
    let cold = first
        .orchestrator
        .run(request(&CACHED, ResearchDepth::Quick))
        .await
        .unwrap();
    assert_eq!(cold.audit.cache_hits, 0);
    assert_eq!(cold.audit.cache_misses, 2);
    assert_eq!(first.provider.total_calls(), 4);

    let second = Harness::new(ScriptedProvider::uniform(-0.9)).with_cache(cache);
    let warm = second
        .orchestrator
        .run(request(&CACHED, ResearchDepth::Quick))
        .await
        .unwrap();

    assert_eq!(warm.audit.cache_hits, 2);
    assert_eq!(warm.audit.cache_misses, 0);
    assert_eq!(second.provider.total_calls(), 0);
    assert_eq!(warm.final_sentiment, cold.final_sentiment);
    for id in CACHED {
        assert_eq!(warm.reports[id].sentiment, cold.reports[id].sentiment);
        assert_eq!(warm.reports[id].confidence, cold.reports[id].confidence);
    }
}

#[tokio::test]
async fn test_cache_is_keyed_by_subject() {
    let cache = BoundedCache::new(Arc::new(MemoryStore::new()));
    let harness = Harness::new(ScriptedProvider::uniform(0.2)).with_cache(cache);

    harness
        .orchestrator
        .run(request(&["fundamentals"], ResearchDepth::Quick))
        .await
        .unwrap();
    let mut other = request(&["fundamentals"], ResearchDepth::Quick);
    other.subject = "GLOBEX".to_string();
    let decision = harness.orchestrator.run(other).await.unwrap();

    assert_eq!(decision.audit.cache_hits, 0);
    assert_eq!(harness.provider.calls("financials"), 2);
}

#[tokio::test]
async fn test_unavailable_store_falls_back_to_computation() {
    let store = Arc::new(UnavailableStore::default());
    let cached = Harness::new(ScriptedProvider::uniform(0.6))
        .with_cache(BoundedCache::new(store.clone()));
    let uncached = Harness::new(ScriptedProvider::uniform(0.6));

    let with_outage = cached
        .orchestrator
        .run(request(&CACHED, ResearchDepth::Quick))
        .await
        .unwrap();
    let baseline = uncached
        .orchestrator
        .run(request(&CACHED, ResearchDepth::Quick))
        .await
        .unwrap();

    assert_eq!(with_outage.final_sentiment, baseline.final_sentiment);
    assert!(with_outage.audit.degraded.is_empty());
    assert_eq!(with_outage.audit.cache_misses, 2);
    assert_eq!(with_outage.audit.cache_hits, 0);
    for id in CACHED {
        assert_eq!(with_outage.reports[id].confidence, Some(1.0));
    }
    // One read and one write attempt per cacheable analyst.
    assert_eq!(store.attempts(), 4);
}

#[tokio::test]
async fn test_file_store_survives_orchestrator_restart() {
    let dir = TempDir::new().unwrap();

    let first = Harness::new(ScriptedProvider::uniform(0.1))
        .with_cache(BoundedCache::new(Arc::new(FileStore::new(dir.path()))));
    first
        .orchestrator
        .run(request(&["news"], ResearchDepth::Quick))
        .await
        .unwrap();

    let second = Harness::new(ScriptedProvider::uniform(0.1))
        .with_cache(BoundedCache::new(Arc::new(FileStore::new(dir.path()))));
    let decision = second
        .orchestrator
        .run(request(&["news"], ResearchDepth::Quick))
        .await
        .unwrap();

    assert_eq!(decision.audit.cache_hits, 1);
    assert_eq!(second.provider.total_calls(), 0);
}

#[tokio::test]
async fn test_uncached_analysts_never_touch_the_store() {
    let store = Arc::new(UnavailableStore::default());
    let harness = Harness::new(ScriptedProvider::uniform(0.3))
        .with_cache(BoundedCache::new(store.clone()));

    let decision = harness
        .orchestrator
        .run(request(&["market", "social"], ResearchDepth::Quick))
        .await
        .unwrap();

    assert_eq!(store.attempts(), 0);
    assert_eq!(decision.audit.cache_hits + decision.audit.cache_misses, 0);
}

#[tokio::test]
async fn test_partial_report_is_retried_next_request() {
    let cache = BoundedCache::new(Arc::new(MemoryStore::new()));
    let flaky = || ScriptedProvider::uniform(0.4).fail("balance_sheet", "vendor timeout");

    for _ in 0..2 {
        let harness = Harness::new(flaky()).with_cache(cache.clone());
        let decision = harness
            .orchestrator
            .run(request(&["fundamentals"], ResearchDepth::Quick))
            .await
            .unwrap();

        assert_eq!(decision.audit.cache_hits, 0);
        assert_eq!(decision.audit.cache_misses, 1);
        assert_eq!(harness.provider.calls("balance_sheet"), 1);
    }

    let recovered = Harness::new(ScriptedProvider::uniform(0.4)).with_cache(cache.clone());
    recovered
        .orchestrator
        .run(request(&["fundamentals"], ResearchDepth::Quick))
        .await
        .unwrap();
    let warm = Harness::new(ScriptedProvider::uniform(0.4)).with_cache(cache);
    let decision = warm
        .orchestrator
        .run(request(&["fundamentals"], ResearchDepth::Quick))
        .await
        .unwrap();
    assert_eq!(decision.audit.cache_hits, 1);
    assert_eq!(warm.provider.total_calls(), 0);
}
