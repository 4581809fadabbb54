//! Scheduler scenarios
//!
//! Convergence of the decay sweep, cursor resumption, and idempotence over
//! the full engine.

use engram_core::{CallScope, PersistencePort, SchedulerConfig, StoreInput};
use engram_e2e_tests::{fixture, fixture_with_config, store};
use tokio::sync::watch;

#[tokio::test]
async fn sweep_converges_weak_memories_to_zero() {
    let fx = fixture();
    let scope = CallScope::tenant("t");

    // W weak memories: low importance, then left idle far past the
    // protection window
    let weak_count = 9;
    let mut weak_ids = Vec::new();
    for i in 0..weak_count {
        let id = fx
            .engine
            .store_memory(
                &scope,
                StoreInput {
                    content: format!("disposable scratch note number {i}"),
                    importance: Some(0.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .id;
        weak_ids.push(id);
    }
    fx.clock.advance_days(60);

    // Two strong memories: reinforced right before the sweep
    let strong_a = store(&fx, "t", "load bearing production runbook").await;
    let strong_b = store(&fx, "t", "root certificate rotation schedule").await;

    let scheduler = fx.engine.scheduler();
    let (_tx, mut rx) = watch::channel(false);
    let report = scheduler.run_once(fx.clock.now(), &mut rx).await.unwrap();

    assert_eq!(report.memories_pruned, weak_count);
    assert!(!report.aborted);
    for id in &weak_ids {
        assert!(fx.store.get_memory(id).unwrap().is_none(), "{id} survived");
    }
    assert!(fx.store.get_memory(&strong_a).unwrap().is_some());
    assert!(fx.store.get_memory(&strong_b).unwrap().is_some());

    // Delete count equals W in the pruning log
    let pruned = fx.store.pruning_log().unwrap();
    assert_eq!(pruned.len(), weak_count);

    // No weak memories remain: a second run prunes nothing
    let again = scheduler.run_once(fx.clock.now(), &mut rx).await.unwrap();
    assert_eq!(again.memories_pruned, 0);
}

#[tokio::test]
async fn retrieval_reinforcement_rescues_a_weak_memory() {
    let fx = fixture();
    let scope = CallScope::tenant("t");

    let id = fx
        .engine
        .store_memory(
            &scope,
            StoreInput {
                content: "nearly forgotten but suddenly relevant".into(),
                importance: Some(0.0),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id;
    fx.clock.advance_days(60);

    // The retrieval's reinforcement lands before the sweep: its write wins
    fx.engine
        .retrieve_memories(&scope, "nearly forgotten but suddenly relevant", None)
        .await
        .unwrap();

    let scheduler = fx.engine.scheduler();
    let (_tx, mut rx) = watch::channel(false);
    let report = scheduler.run_once(fx.clock.now(), &mut rx).await.unwrap();

    assert_eq!(report.memories_pruned, 0);
    assert!(fx.store.get_memory(&id).unwrap().is_some());
}

#[tokio::test]
async fn small_batches_still_converge() {
    let mut config = engram_core::EngineConfig::default();
    config.scheduler = SchedulerConfig {
        batch_size: 2,
        ..Default::default()
    };
    let fx = fixture_with_config(config);
    let scope = CallScope::tenant("t");

    for i in 0..7 {
        fx.engine
            .store_memory(
                &scope,
                StoreInput {
                    content: format!("ephemeral thought {i}"),
                    importance: Some(0.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    fx.clock.advance_days(60);

    let scheduler = fx.engine.scheduler();
    let (_tx, mut rx) = watch::channel(false);
    let report = scheduler.run_once(fx.clock.now(), &mut rx).await.unwrap();

    assert_eq!(report.memories_pruned, 7);
    assert!(scheduler.cursor().is_none(), "cursor cleared after a full pass");
}
