//! Aggregator and judge nodes.
//!
//! Both run the aggregation engine over their upstream reports. The
//! aggregator publishes an interim verdict for the risk panel; the judge
//! produces the request's final decision.

use super::{AnalystTask, TaskContext, TaskError};
use crate::aggregate::{AggregationConfig, AggregationEngine, Decision};
use crate::core::{debate_turn, Report, AGGREGATOR_ID, COLLECTOR_ID, JUDGE_ID};
use crate::state::SharedState;
use crate::workflow::DebateRole;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

/// Reports named by `keys`, keyed by the identifier weights are configured
/// under.
///
/// Skeleton reports carry no weight and are skipped. Debate turns collapse to
/// the latest argument per role, keyed `proponent` / `opponent`. Keys with no
/// report yet are skipped.
pub fn weighted_inputs(state: &SharedState, keys: &[String]) -> BTreeMap<String, Report> {
    let mut inputs = BTreeMap::new();
    let mut latest: HashMap<DebateRole, u32> = HashMap::new();

    for key in keys {
        if key == COLLECTOR_ID || key == AGGREGATOR_ID || key == JUDGE_ID {
            continue;
        }
        let Some(report) = state.get_report(key) else {
            continue;
        };
        match debate_turn(key) {
            Some((round, role)) => {
                if latest.get(&role).map_or(true, |seen| round > *seen) {
                    latest.insert(role, round);
                    inputs.insert(role.to_string(), report);
                }
            }
            None => {
                inputs.insert(key.clone(), report);
            }
        }
    }

    inputs
}

/// Aggregate the reports named by `keys`.
pub fn decide(state: &SharedState, config: &AggregationConfig, keys: &[String]) -> Decision {
    let inputs = weighted_inputs(state, keys);
    let engine = AggregationEngine::from_config(config);
    let mut decision = engine.aggregate(&inputs, &config.weights);
    decision.reports = inputs;
    decision
}

/// Weighted mean confidence of the contributions that counted.
fn blended_confidence(decision: &Decision) -> f64 {
    let (weighted, total) = decision
        .contributions
        .iter()
        .filter(|c| c.included)
        .fold((0.0, 0.0), |(w, t), c| (w + c.effective_weight, t + c.weight));
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

fn summary_report(id: &str, label: &str, decision: &Decision) -> Report {
    if decision.low_confidence {
        return Report::new(id, &format!("{}: insufficient evidence", label), 0.0, 0.0)
            .with_note("low confidence");
    }
    Report::new(
        id,
        &format!(
            "{}: sentiment {:+.2}, {} position ({:.0}% exposure)",
            label,
            decision.final_sentiment,
            decision.position.label,
            decision.position.exposure * 100.0
        ),
        blended_confidence(decision),
        decision.final_sentiment,
    )
    .with_note(format!("contributors: {}", decision.contributors().join(", ")))
}

/// Combines analyst and debate output into an interim verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator;

#[async_trait]
impl AnalystTask for Aggregator {
    async fn run(&self, ctx: &TaskContext) -> Result<Report, TaskError> {
        ctx.require_upstream()?;
        let decision = decide(ctx.state(), &ctx.env.aggregation, &ctx.spec.depends_on);

        // The debate record is only needed up to this point.
        let debate = ctx.state().take_debate();
        tracing::debug!(
            turns = debate.len(),
            sentiment = decision.final_sentiment,
            low_confidence = decision.low_confidence,
            "interim verdict"
        );

        let mut report = summary_report(ctx.id(), "interim verdict", &decision);
        if !debate.is_empty() {
            report = report.with_note(format!("debate turns: {}", debate.len()));
        }
        Ok(report)
    }
}

/// Produces the final decision. Never calls tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct Judge;

#[async_trait]
impl AnalystTask for Judge {
    async fn run(&self, ctx: &TaskContext) -> Result<Report, TaskError> {
        ctx.require_upstream()?;
        let decision = decide(ctx.state(), &ctx.env.aggregation, &ctx.spec.depends_on);
        let report = summary_report(ctx.id(), "final verdict", &decision);

        tracing::info!(
            sentiment = decision.final_sentiment,
            band = %decision.position.label,
            low_confidence = decision.low_confidence,
            "final decision"
        );
        ctx.state().set_decision(decision);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::execute;
    use super::*;
    use crate::core::{TaskId, TaskKind, TaskSpec};
    use crate::workflow::WorkflowPhase;
    use std::sync::Arc;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_weighted_inputs_keeps_latest_debate_turn() {
        let state = SharedState::new(2);
        state.put_report(COLLECTOR_ID, Report::new(COLLECTOR_ID, "ok", 1.0, 0.0)).unwrap();
        state.put_report("market", Report::new("market", "m", 0.8, 0.4)).unwrap();
        state.put_report("debate.r1.proponent", Report::new("p1", "p1", 0.6, 0.5)).unwrap();
        state.put_report("debate.r2.proponent", Report::new("p2", "p2", 0.6, 0.9)).unwrap();
        state.put_report("debate.r1.opponent", Report::new("o1", "o1", 0.6, -0.5)).unwrap();

        let inputs = weighted_inputs(
            &state,
            &keys(&[
                COLLECTOR_ID,
                "market",
                "debate.r2.proponent",
                "debate.r1.proponent",
                "debate.r1.opponent",
            ]),
        );

        assert_eq!(
            inputs.keys().collect::<Vec<_>>(),
            vec!["market", "opponent", "proponent"]
        );
        assert_eq!(inputs["proponent"].narrative, "p2");
    }

    #[test]
    fn test_decide_with_no_inputs_is_low_confidence() {
        let state = SharedState::new(0);
        let decision = decide(&state, &AggregationConfig::default(), &keys(&[COLLECTOR_ID]));

        assert!(decision.low_confidence);
        assert_eq!(decision.final_sentiment, 0.0);
        assert!(decision.reports.is_empty());
    }

    #[tokio::test]
    async fn test_aggregator_discards_debate_record() {
        let env = offline_env();
        let state = Arc::clone(&env.state);
        state.put_report("market", Report::new("market", "m", 0.8, 0.6)).unwrap();
        let argument = Report::new("debate.r1.proponent", "p", 0.7, 0.8);
        state.put_report("debate.r1.proponent", argument.clone()).unwrap();
        state.append_debate(1, DebateRole::Proponent, argument).unwrap();

        let spec = TaskSpec::new(TaskId::new(AGGREGATOR_ID), TaskKind::Aggregator, WorkflowPhase::RiskPanel)
            .with_dependencies(["market", "debate.r1.proponent"]);
        let ctx = TaskContext::new(spec, env);

        let report = execute(&Aggregator, &ctx).await;

        assert!(!report.is_degraded());
        assert!(report.sentiment.unwrap() > 0.6);
        assert!(report.confidence.unwrap() > 0.0);
        assert_eq!(state.debate_len(), 0);
        assert!(state.take_decision().is_none());
    }

    #[tokio::test]
    async fn test_judge_sets_decision_without_tools() {
        let env = offline_env();
        let state = Arc::clone(&env.state);
        state.put_report("news", Report::new("news", "n", 1.0, -0.8)).unwrap();
        state.put_report(AGGREGATOR_ID, Report::new(AGGREGATOR_ID, "a", 1.0, 0.9)).unwrap();

        let spec = TaskSpec::new(TaskId::new(JUDGE_ID), TaskKind::Judge, WorkflowPhase::Terminal)
            .with_dependencies(["news", AGGREGATOR_ID]);
        let ctx = TaskContext::new(spec, env);

        let report = execute(&Judge, &ctx).await;
        let decision = state.take_decision().unwrap();

        assert_eq!(report.sentiment, Some(-0.8));
        assert_eq!(decision.contributors(), vec!["news"]);
        assert_eq!(decision.position.label, "defensive");
        assert!(decision.reports.contains_key("news"));
        assert_eq!(ctx.guard.calls_made(), 0);
    }

    #[tokio::test]
    async fn test_judge_low_confidence_report() {
        let env = offline_env();
        let state = Arc::clone(&env.state);
        state.put_report(COLLECTOR_ID, Report::new(COLLECTOR_ID, "ok", 1.0, 0.0)).unwrap();
        state.put_report(AGGREGATOR_ID, Report::new(AGGREGATOR_ID, "a", 0.0, 0.0)).unwrap();

        let spec = TaskSpec::new(TaskId::new(JUDGE_ID), TaskKind::Judge, WorkflowPhase::Terminal)
            .with_dependencies([COLLECTOR_ID, AGGREGATOR_ID]);
        let ctx = TaskContext::new(spec, env);

        let report = execute(&Judge, &ctx).await;

        assert_eq!(report.confidence, Some(0.0));
        assert!(state.take_decision().unwrap().low_confidence);
    }
}
