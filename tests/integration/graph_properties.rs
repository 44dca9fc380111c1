//! Graph shape properties over every selection and depth.

use tribunal::analysts::{AnalystCatalog, AnalystProfile};
use tribunal::core::{TaskId, TaskKind, AGGREGATOR_ID, COLLECTOR_ID, JUDGE_ID};
use tribunal::workflow::{GraphBuilder, ResearchDepth, WorkflowPhase, MAX_DEBATE_ROUNDS};
use tribunal::Error;

const KNOWN: [&str; 4] = ["market", "social", "news", "fundamentals"];

/// Every subset of the known analysts, plus an unknown id mixed in.
fn selections() -> Vec<Vec<&'static str>> {
    (0..(1u32 << KNOWN.len()))
        .map(|mask| {
            let mut selection: Vec<&str> = KNOWN
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, id)| *id)
                .collect();
            if mask % 3 == 0 {
                selection.push("astrology");
            }
            selection
        })
        .collect()
}

#[test]
fn test_every_selection_builds_with_skeleton() {
    let builder = GraphBuilder::new();

    for depth in ResearchDepth::ALL {
        for selection in selections() {
            let instance = builder.build(&selection, depth).unwrap();
            let graph = instance.graph();

            for id in [COLLECTOR_ID, AGGREGATOR_ID, JUDGE_ID] {
                assert!(
                    graph.contains_task(&TaskId::new(id)),
                    "{} missing for {:?} at {}",
                    id,
                    selection,
                    depth
                );
            }
            assert!(graph.is_acyclic());
            assert_eq!(instance.analysts().len(), selection.iter().filter(|id| KNOWN.contains(id)).count());
            assert_eq!(
                instance.warnings().len(),
                usize::from(selection.contains(&"astrology"))
            );
        }
    }
}

#[test]
fn test_debate_pairs_equal_rounds_for_depth() {
    let builder = GraphBuilder::new();

    for depth in ResearchDepth::ALL {
        let rounds = depth.profile().debate_rounds;
        let instance = builder.build(&["market", "news"], depth).unwrap();

        assert_eq!(instance.debate_pairs().len() as u32, rounds, "depth {}", depth);
        assert_eq!(
            instance
                .graph()
                .all_tasks()
                .iter()
                .filter(|t| matches!(t.kind, TaskKind::Debater { .. }))
                .count() as u32,
            rounds * 2
        );
        assert_eq!(instance.reviewers().len(), depth.profile().risk_reviewers);
    }
}

#[test]
fn test_every_task_waits_only_on_earlier_phases() {
    let builder = GraphBuilder::new();

    for depth in ResearchDepth::ALL {
        let instance = builder.build(&KNOWN, depth).unwrap();
        let graph = instance.graph();

        for task in graph.all_tasks() {
            for dep in graph.get_dependencies(&task.id) {
                assert!(
                    dep.phase <= task.phase,
                    "{} ({}) reads {} ({})",
                    task.id,
                    task.phase,
                    dep.id,
                    dep.phase
                );
                assert!(task.depends_on.contains(&dep.output_key));
            }
        }
    }
}

#[test]
fn test_judge_has_no_tools_and_reads_everything_that_counts() {
    let instance = GraphBuilder::new()
        .build(&KNOWN, ResearchDepth::Standard)
        .unwrap();
    let judge = instance.graph().get_task(&TaskId::new(JUDGE_ID)).unwrap();

    assert!(judge.capabilities.is_empty());
    assert_eq!(judge.phase, WorkflowPhase::Terminal);
    for key in KNOWN
        .iter()
        .copied()
        .chain(["debate.r2.proponent", "debate.r2.opponent", AGGREGATOR_ID])
        .chain(["risk.aggressive", "risk.conservative", "risk.neutral"])
    {
        assert!(judge.depends_on.iter().any(|d| d == key), "judge ignores {}", key);
    }
}

#[test]
fn test_highest_depth_is_fully_unrolled() {
    let instance = GraphBuilder::new()
        .build(&["market"], ResearchDepth::Comprehensive)
        .unwrap();

    let layers = instance.layers();
    let debate_layers = layers
        .iter()
        .filter(|(phase, _)| matches!(phase, WorkflowPhase::DebateRound(_)))
        .count() as u32;

    assert_eq!(debate_layers, MAX_DEBATE_ROUNDS);
    assert_eq!(instance.reviewers().len(), 3);
    assert_eq!(layers.last().unwrap().0, WorkflowPhase::Terminal);
    assert_eq!(layers.last().unwrap().1.len(), 1);
}

#[test]
fn test_misconfigured_catalog_fails_only_when_selected() {
    let mut catalog = AnalystCatalog::builtin();
    catalog.insert(
        AnalystProfile::new("options", "options flow")
            .with_tools(&["options_chain"])
            .with_sources("options_feed", "options_delayed")
            .with_dependencies(&[COLLECTOR_ID, "dark_pool"]),
    );
    let builder = GraphBuilder::with_catalog(catalog);

    assert!(builder.build(&["market"], ResearchDepth::Basic).is_ok());
    assert!(matches!(
        builder.build(&["market", "options"], ResearchDepth::Basic),
        Err(Error::Configuration(_))
    ));
}
