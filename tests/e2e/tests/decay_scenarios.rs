//! Decay and reinforcement scenarios
//!
//! Sector-dependent decay rates and the access-boost bound, driven through
//! the public tool surface with a logical clock.

use engram_core::{CallScope, PersistencePort, ReinforcementKind, Sector, StoreInput};
use engram_e2e_tests::{fixture, store};

#[tokio::test]
async fn episodic_decays_faster_than_semantic() {
    let fx = fixture();
    let scope = CallScope::tenant("t");

    // Same content, same initial strength, different sector of record
    let episodic = fx
        .engine
        .store_memory(
            &scope,
            StoreInput {
                content: "the deployment window moved to friday".into(),
                primary_sector: Some(Sector::Episodic),
                importance: Some(1.0),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id;
    let semantic = fx
        .engine
        .store_memory(
            &scope,
            StoreInput {
                content: "the deployment window moved to friday".into(),
                primary_sector: Some(Sector::Semantic),
                importance: Some(1.0),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id;

    fx.clock.advance_hours(48);

    let results = fx
        .engine
        .retrieve_memories(&scope, "the deployment window moved to friday", None)
        .await
        .unwrap();

    let strength_of = |id: &str| {
        results
            .results
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.effective_strength)
            .expect("memory returned")
    };
    let s_episodic = strength_of(&episodic);
    let s_semantic = strength_of(&semantic);

    assert!(
        s_episodic < s_semantic,
        "episodic {s_episodic} should decay below semantic {s_semantic}"
    );
    assert!(s_episodic >= 0.1);
    assert!(s_semantic >= 0.1);
}

#[tokio::test]
async fn reinforcement_boosts_and_caps_at_one() {
    let fx = fixture();
    let scope = CallScope::tenant("t");

    let id = store(&fx, "t", "reinforcement bound check").await;

    // Pin the starting strength at 0.4
    let mut record = fx.store.get_memory(&id).unwrap().unwrap();
    record.base_strength = 0.4;
    fx.store.update_memory(&record, None).unwrap();

    // Two retrievals in the same logical second
    fx.engine
        .retrieve_memories(&scope, "reinforcement bound check", None)
        .await
        .unwrap();
    let after_first = fx.store.get_memory(&id).unwrap().unwrap().base_strength;
    assert!((after_first - 0.7).abs() < 1e-9, "got {after_first}");

    fx.engine
        .retrieve_memories(&scope, "reinforcement bound check", None)
        .await
        .unwrap();
    let after_second = fx.store.get_memory(&id).unwrap().unwrap().base_strength;
    assert!((after_second - 1.0).abs() < 1e-9, "got {after_second}");

    let log = fx.store.reinforcement_log(&id).unwrap();
    let access_events: Vec<_> = log
        .iter()
        .filter(|e| e.kind == ReinforcementKind::Access)
        .collect();
    assert_eq!(access_events.len(), 2);
    assert!((access_events[0].strength_after - 0.7).abs() < 1e-9);
    assert!((access_events[1].strength_after - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn strength_never_decays_below_floor_and_is_monotone() {
    let fx = fixture();
    let id = store(&fx, "t", "slow fade into the floor").await;
    let record = fx.store.get_memory(&id).unwrap().unwrap();
    let config = fx.engine.config().decay.clone();

    // No access happens: effective strength only falls, and never past the
    // floor.
    let mut last = f64::INFINITY;
    for _ in 0..6 {
        fx.clock.advance_days(15);
        let strength = engram_core::effective_strength(&record, &config, fx.clock.now());
        assert!(strength >= config.minimum_strength);
        assert!(strength <= last);
        last = strength;
    }
    assert_eq!(last, config.minimum_strength);
}

#[tokio::test]
async fn at_most_one_access_event_per_retrieval_call() {
    let fx = fixture();
    let scope = CallScope::tenant("t");
    let id = store(&fx, "t", "appears in every sector list").await;

    // Query all five sectors: the memory shows up in each sector's list but
    // must be reinforced once per call.
    let results = fx
        .engine
        .retrieve_memories(&scope, "appears in every sector list", None)
        .await
        .unwrap();
    assert_eq!(results.results.len(), 1);

    let log = fx.store.reinforcement_log(&id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].trace_id.as_deref(), Some(results.trace_id.as_str()));
}
