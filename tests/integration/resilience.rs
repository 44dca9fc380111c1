//! Degradation inside a phase never stops the request.

use std::time::Duration;

use tribunal::config::Config;
use tribunal::core::{DegradeReason, TaskId};
use tribunal::workflow::ResearchDepth;
use tribunal::OrchestratorEvent;

use crate::fixtures::{config_with, request, Harness, ScriptedProvider};

#[tokio::test]
async fn test_tool_limit_zero_degrades_without_error() {
    let harness = Harness::with_config(ScriptedProvider::uniform(0.7), config_with(0, 120));
    let decision = harness
        .orchestrator
        .run(request(&["market", "news"], ResearchDepth::Quick))
        .await
        .unwrap();

    let floor = Config::default().pipeline.normal_confidence_floor;
    for id in ["market", "news"] {
        let report = &decision.reports[id];
        assert_eq!(report.degraded, Some(DegradeReason::ToolLimit));
        assert!(report.confidence.unwrap() < floor);
        assert_eq!(decision.audit.degraded[id], "tool_limit");
    }
    assert_eq!(harness.provider.total_calls(), 0);
    assert_eq!(decision.final_sentiment, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_barrier_advances_when_one_parallel_task_times_out() {
    let provider = ScriptedProvider::uniform(0.5).sleep("social_sentiment", Duration::from_secs(600));
    let mut harness = Harness::with_config(provider, config_with(3, 30));

    let decision = harness
        .orchestrator
        .run(request(&["market", "social", "news"], ResearchDepth::Quick))
        .await
        .unwrap();

    let social = &decision.reports["social"];
    assert_eq!(social.degraded, Some(DegradeReason::Timeout));
    assert_eq!(
        social.confidence,
        Some(Config::default().pipeline.degraded_confidence)
    );
    assert!(!decision.reports["market"].is_degraded());
    assert!(!decision.reports["news"].is_degraded());
    assert_eq!(decision.audit.degraded.len(), 1);
    assert_eq!(decision.audit.nodes_run.last().map(String::as_str), Some("judge"));
    assert!(decision.final_sentiment > 0.4);

    let events = harness.drain_events();
    assert!(events.contains(&OrchestratorEvent::TaskDegraded {
        task_id: TaskId::new("social"),
        reason: DegradeReason::Timeout,
    }));
}

#[tokio::test]
async fn test_panicking_task_is_contained() {
    let provider = ScriptedProvider::uniform(0.5).panic("company_news");
    let harness = Harness::new(provider);

    let decision = harness
        .orchestrator
        .run(request(&["market", "news"], ResearchDepth::Quick))
        .await
        .unwrap();

    assert_eq!(decision.reports["news"].degraded, Some(DegradeReason::Panicked));
    assert_eq!(decision.audit.degraded["news"], "panicked");
    assert!(!decision.reports["market"].is_degraded());
    assert!(decision.contributors().contains(&"market"));
}

#[tokio::test]
async fn test_failing_tools_degrade_downstream_debate() {
    let provider = ScriptedProvider::new()
        .fail("stock_data", "feed down")
        .fail("indicators", "feed down")
        .respond("llm", serde_json::json!({"signal": 0.9}));
    let harness = Harness::new(provider);

    let decision = harness
        .orchestrator
        .run(request(&["market"], ResearchDepth::Basic))
        .await
        .unwrap();

    assert!(decision.reports["market"].is_degraded());
    // A debate without usable evidence claims no confidence.
    assert_eq!(decision.reports["proponent"].confidence, Some(0.0));
    assert_eq!(decision.reports["opponent"].confidence, Some(0.0));
    assert_eq!(harness.provider.calls("llm"), 3);
}
