//! Reasoning scenarios
//!
//! The four-stream coordinator under timeouts, dissent preservation, and
//! the full think pipeline with memory priming and metacognition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engram_core::{
    AnalyticalStream, CallScope, CreativeStream, CriticalStream, ParallelReasoningCoordinator,
    ReasoningConfig, ReasoningInput, ReasoningStream, StreamKind, SyntheticStream,
};
use engram_e2e_tests::{fixture, store, SlowStream};

fn slow(inner: impl ReasoningStream + 'static, secs: u64) -> Arc<dyn ReasoningStream> {
    Arc::new(SlowStream {
        inner,
        delay: Duration::from_secs(secs),
    })
}

#[tokio::test(start_paused = true)]
async fn one_stream_timeout_yields_partial_not_degraded() {
    // Analytical 2s, Creative 2s, Critical 12s, Synthetic 3s against a 10s
    // per-stream deadline.
    let mut config = ReasoningConfig::default();
    config.per_stream_deadline_ms = 10_000;
    config.total_deadline_ms = 30_000;

    let coordinator = ParallelReasoningCoordinator::with_streams(
        vec![
            slow(AnalyticalStream, 2),
            slow(CreativeStream, 2),
            slow(CriticalStream, 12),
            slow(SyntheticStream, 3),
        ],
        config,
    );

    let result = coordinator
        .reason(ReasoningInput {
            problem: "should the replication factor change for the event log".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let critical = result
        .stream_results
        .iter()
        .find(|r| r.kind == StreamKind::Critical)
        .unwrap();
    assert!(critical.timed_out);
    assert!(!critical.failed);
    assert!(!result.degraded, "a timeout is not a failure");

    for kind in [StreamKind::Analytical, StreamKind::Creative, StreamKind::Synthetic] {
        let stream = result.stream_results.iter().find(|r| r.kind == kind).unwrap();
        assert!(!stream.timed_out);
        assert!(!stream.claims.is_empty());
    }
}

#[tokio::test]
async fn dissent_is_preserved_exactly() {
    let coordinator = ParallelReasoningCoordinator::new(ReasoningConfig::default());
    let result = coordinator
        .reason(ReasoningInput {
            problem: "make the overall developer experience nicer somehow".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    // Count how many streams produced each normalized claim
    let mut support: HashMap<String, usize> = HashMap::new();
    for stream in &result.stream_results {
        let mut seen = std::collections::HashSet::new();
        for claim in &stream.claims {
            if seen.insert(claim.text.to_lowercase()) {
                *support.entry(claim.text.to_lowercase()).or_insert(0) += 1;
            }
        }
    }

    for (text, streams) in &support {
        let merged = result
            .merged_claims
            .iter()
            .any(|c| c.text.to_lowercase() == *text);
        let dissenting = result
            .dissenting_claims
            .iter()
            .any(|c| c.text.to_lowercase() == *text);
        if *streams == 1 {
            assert!(dissenting, "lone claim '{text}' missing from dissent");
            assert!(!merged, "lone claim '{text}' wrongly merged");
        } else {
            assert!(merged, "shared claim '{text}' missing from merged set");
            assert!(!dissenting, "shared claim '{text}' wrongly in dissent");
        }
    }
    // Nothing was silently dropped
    assert_eq!(
        support.len(),
        result.merged_claims.len() + result.dissenting_claims.len()
    );
}

#[tokio::test]
async fn think_pipeline_primes_memories_and_assesses() {
    let fx = fixture();
    let scope = CallScope::tenant("t");
    store(
        &fx,
        "t",
        "export job deadlock caused by workers sharing an advisory lock",
    )
    .await;

    let output = fx
        .engine
        .think(
            &scope,
            "why export job deadlock with workers holding advisory lock?",
            None,
        )
        .await
        .unwrap();

    // The selector saw a causal problem
    assert!(!output.plan.frameworks.is_empty());
    // All four streams reported
    assert_eq!(output.reasoning.stream_results.len(), 4);
    // Metacognition attached a calibrated confidence and an emotion read
    assert!((0.0..=1.0).contains(&output.assessment.calibrated_confidence));
    assert!((-1.0..=1.0).contains(&output.assessment.emotion.valence));
    // Evidence flowed from the primed memory into at least one stream
    let evidence_total: usize = output
        .reasoning
        .stream_results
        .iter()
        .map(|r| r.evidence.len())
        .sum();
    assert!(evidence_total > 0, "no memory evidence reached the streams");
}

#[tokio::test]
async fn think_parallel_returns_coordinator_output_directly() {
    let fx = fixture();
    let result = fx
        .engine
        .think_parallel(
            &CallScope::tenant("t"),
            "compare queueing strategies for burst traffic",
        )
        .await
        .unwrap();
    assert_eq!(result.stream_results.len(), 4);
    assert!(!result.final_recommendation.is_empty());
}

#[tokio::test]
async fn decompose_problem_splits_into_subproblems() {
    let fx = fixture();
    let decomposition = fx
        .engine
        .decompose_problem(
            &CallScope::tenant("t"),
            "profile the hot path. cache the lookups and then measure the regression suite.",
        )
        .unwrap();
    assert!(decomposition.sub_problems.len() >= 3);
    for sub in &decomposition.sub_problems {
        assert!(sub.split_whitespace().count() >= 3);
    }
}

#[tokio::test]
async fn outcome_feedback_reaches_selector_and_calibrator() {
    let fx = fixture();
    let scope = CallScope::tenant("t");
    let output = fx
        .engine
        .think(&scope, "why did the canary fail its probes?", None)
        .await
        .unwrap();

    fx.engine
        .record_outcome(
            &scope,
            &output.plan.plan_id,
            "why did the canary fail its probes?",
            0.9,
        )
        .unwrap();

    // Out-of-range observed scores are rejected
    assert!(fx
        .engine
        .record_outcome(&scope, &output.plan.plan_id, "p", 1.4)
        .is_err());
}
