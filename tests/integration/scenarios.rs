//! End-to-end requests from selection to decision.

use tribunal::workflow::{GraphBuilder, ResearchDepth, WorkflowPhase, MAX_DEBATE_ROUNDS};
use tribunal::OrchestratorEvent;

use crate::fixtures::{request, Harness, ScriptedProvider};

/// Selection {market, news} at the lowest depth: two analysts, no debate, no
/// risk panel, and exactly those two reports contribute.
#[tokio::test]
async fn test_two_analysts_at_lowest_depth() {
    let instance = GraphBuilder::new()
        .build(&["market", "news"], ResearchDepth::Quick)
        .unwrap();
    assert_eq!(instance.optional_count(), 2);
    assert!(instance.debate_pairs().is_empty());
    assert!(instance.reviewers().is_empty());

    let harness = Harness::new(ScriptedProvider::uniform(0.4));
    let decision = harness
        .orchestrator
        .run(request(&["market", "news"], ResearchDepth::Quick))
        .await
        .unwrap();

    assert_eq!(decision.contributors(), vec!["market", "news"]);
    assert!(!decision.low_confidence);
    assert!((decision.final_sentiment - 0.4).abs() < 1e-9);
    assert_eq!(decision.position.label, "moderate");
    assert_eq!(
        decision.audit.nodes_run,
        vec!["collector", "market", "news", "aggregator", "judge"]
    );
    assert!(decision.audit.degraded.is_empty());
    assert_eq!(decision.audit.tool_calls.get("market"), Some(&2));
    assert_eq!(decision.audit.tool_calls.get("news"), Some(&2));
    assert_eq!(decision.audit.debate_rounds, 0);
    assert_eq!(decision.audit.subject, "ACME");
    assert!(decision.audit.request_id.is_some());
    assert_eq!(decision.reports.len(), 2);
}

/// Empty selection: skeleton only at every depth, and the decision is
/// flagged low confidence with a neutral sentiment.
#[tokio::test]
async fn test_empty_selection_is_low_confidence() {
    for depth in ResearchDepth::ALL {
        let instance = GraphBuilder::new().build::<&str>(&[], depth).unwrap();
        assert_eq!(instance.optional_count(), 0, "depth {}", depth);
        assert_eq!(instance.graph().task_count(), 3, "depth {}", depth);

        let harness = Harness::new(ScriptedProvider::uniform(0.9));
        let decision = harness
            .orchestrator
            .run(request(&[], depth))
            .await
            .unwrap();

        assert!(decision.low_confidence, "depth {}", depth);
        assert_eq!(decision.final_sentiment, 0.0);
        assert!(decision.contributors().is_empty());
        assert!(decision.reports.is_empty());
        assert!(decision.audit.degraded.is_empty(), "depth {}", depth);
        assert_eq!(decision.audit.nodes_run, vec!["collector", "aggregator", "judge"]);
        assert_eq!(decision.audit.debate_rounds, 0);
        assert!(decision
            .audit
            .phases
            .iter()
            .all(|e| !matches!(e.phase, WorkflowPhase::DebateRound(_))));
        assert_eq!(harness.provider.total_calls(), 0);
    }
}

/// Highest depth: every debate round and the full risk panel run, in phase
/// order, before the judge.
#[tokio::test]
async fn test_highest_depth_runs_full_pipeline() {
    let mut harness = Harness::new(
        ScriptedProvider::uniform(0.3)
            .respond("llm", serde_json::json!({"signal": 0.3, "argument": "steady", "assessment": "ok"})),
    );
    let decision = harness
        .orchestrator
        .run(request(
            &["market", "social", "news", "fundamentals"],
            ResearchDepth::Comprehensive,
        ))
        .await
        .unwrap();

    assert_eq!(decision.audit.debate_rounds, MAX_DEBATE_ROUNDS);
    assert!(decision.audit.degraded.is_empty());
    assert_eq!(decision.contributors().len(), 4 + 2 + 3);
    assert!((decision.final_sentiment - 0.3).abs() < 1e-9);
    for key in ["proponent", "opponent", "risk.aggressive", "risk.conservative", "risk.neutral"] {
        assert!(decision.reports.contains_key(key), "missing {}", key);
    }
    assert_eq!(harness.provider.calls("llm"), MAX_DEBATE_ROUNDS * 2 + 3);

    let phases: Vec<WorkflowPhase> = decision.audit.phases.iter().map(|e| e.phase).collect();
    let mut expected = vec![WorkflowPhase::Init, WorkflowPhase::ParallelAnalysis];
    expected.extend((1..=MAX_DEBATE_ROUNDS).map(WorkflowPhase::DebateRound));
    expected.extend([WorkflowPhase::RiskPanel, WorkflowPhase::Terminal, WorkflowPhase::Done]);
    assert_eq!(phases, expected);

    let nodes = &decision.audit.nodes_run;
    let position = |id: &str| nodes.iter().position(|n| n == id).unwrap();
    assert!(position("debate.r1.proponent") < position("debate.r1.opponent"));
    assert!(position("debate.r5.opponent") < position("aggregator"));
    assert!(position("aggregator") < position("risk.neutral"));
    assert_eq!(nodes.last().map(String::as_str), Some("judge"));

    let events = harness.drain_events();
    let entered = events
        .iter()
        .filter(|e| matches!(e, OrchestratorEvent::PhaseEntered { .. }))
        .count();
    assert_eq!(entered as u32, 4 + MAX_DEBATE_ROUNDS);
    assert!(matches!(events.last(), Some(OrchestratorEvent::Finished { .. })));
}

#[tokio::test]
async fn test_unknown_analysts_are_reported_not_fatal() {
    let harness = Harness::new(ScriptedProvider::uniform(-0.6));
    let decision = harness
        .orchestrator
        .run(request(&["Market", "tarot", "market"], ResearchDepth::Quick))
        .await
        .unwrap();

    assert_eq!(decision.contributors(), vec!["market"]);
    assert_eq!(decision.audit.warnings.len(), 1);
    assert!(decision.audit.warnings[0].contains("tarot"));
    assert_eq!(decision.position.label, "defensive");
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let bull = Harness::new(ScriptedProvider::uniform(0.8));
    let bear = Harness::new(ScriptedProvider::uniform(-0.8));

    let (up, down) = tokio::join!(
        bull.orchestrator.run(request(&["market"], ResearchDepth::Basic)),
        bear.orchestrator.run(request(&["market"], ResearchDepth::Basic)),
    );
    let (up, down) = (up.unwrap(), down.unwrap());

    assert!(up.final_sentiment > 0.5);
    assert!(down.final_sentiment < -0.5);
    assert_ne!(up.audit.request_id, down.audit.request_id);
}
