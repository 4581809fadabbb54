//! SQLite backend scenarios
//!
//! The same engine pipelines over the production store: durability across
//! reopen, cascade deletes, and retrieval parity with the in-memory port.

use std::sync::Arc;

use engram_core::{
    CallScope, EngineConfig, HashEmbedder, Orchestrator, PersistencePort, SqliteStore, StoreInput,
};
use tempfile::TempDir;

fn engine_at(dir: &TempDir) -> (Orchestrator, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::new(Some(dir.path().join("engram.db"))).unwrap());
    let engine = Orchestrator::new(
        EngineConfig::default(),
        store.clone(),
        Arc::new(HashEmbedder::new(64)),
    )
    .unwrap();
    (engine, store)
}

#[tokio::test]
async fn memories_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let scope = CallScope::tenant("t");

    let id = {
        let (engine, _store) = engine_at(&dir);
        engine
            .store_memory(
                &scope,
                StoreInput {
                    content: "durable fact about the ingestion retry policy".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .id
    };

    // Fresh connections over the same file
    let (engine, store) = engine_at(&dir);
    let record = store.get_memory(&id).unwrap().unwrap();
    assert_eq!(record.tenant_id, "t");

    let results = engine
        .retrieve_memories(&scope, "durable fact about the ingestion retry policy", None)
        .await
        .unwrap();
    assert_eq!(results.results[0].id, id);
}

#[tokio::test]
async fn full_pipeline_parity_with_memory_store() {
    let dir = TempDir::new().unwrap();
    let (engine, store) = engine_at(&dir);
    let scope = CallScope::tenant("t");

    // Store a small corpus, link it, retrieve, reinforce
    let mut ids = Vec::new();
    for i in 0..5 {
        let receipt = engine
            .store_memory(
                &scope,
                StoreInput {
                    content: format!("observability dashboards panel layout revision {i}"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        ids.push(receipt.id);
    }

    let results = engine
        .retrieve_memories(&scope, "observability dashboards panel layout", None)
        .await
        .unwrap();
    assert!(!results.results.is_empty());

    // Reinforcement wrote through to the database
    let top = &results.results[0];
    let log = store.reinforcement_log(&top.id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].trace_id.as_deref(), Some(results.trace_id.as_str()));

    // The cluster got linked within degree bounds
    for id in &ids {
        let degree = store.neighbors(id).unwrap().len();
        assert!(degree <= 3, "{id} over the cap");
    }

    // Cascade delete removes vectors and edges
    engine.delete_memory(&scope, &ids[0]).await.unwrap();
    assert!(store.get_memory(&ids[0]).unwrap().is_none());
    assert!(store
        .get_vector(&ids[0], engram_core::Sector::Semantic)
        .unwrap()
        .is_none());
    for id in &ids[1..] {
        assert!(store
            .neighbors(id)
            .unwrap()
            .iter()
            .all(|e| &e.to_id != &ids[0]));
    }
}

#[tokio::test]
async fn scheduler_prunes_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let (engine, store) = engine_at(&dir);
    let scope = CallScope::tenant("t");

    let receipt = engine
        .store_memory(
            &scope,
            StoreInput {
                content: "short lived scratch entry".into(),
                importance: Some(0.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Back-date the memory far past the protection window
    let mut record = store.get_memory(&receipt.id).unwrap().unwrap();
    record.last_accessed_at = record.last_accessed_at - chrono::Duration::days(60);
    store.update_memory(&record, None).unwrap();

    let scheduler = engine.scheduler();
    let (_tx, mut rx) = tokio::sync::watch::channel(false);
    let report = scheduler
        .run_once(chrono::Utc::now(), &mut rx)
        .await
        .unwrap();

    assert_eq!(report.memories_pruned, 1);
    assert!(store.get_memory(&receipt.id).unwrap().is_none());
}
