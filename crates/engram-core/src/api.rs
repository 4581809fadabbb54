//! Orchestrator / Public API
//!
//! The stateless composition layer every tool call enters: tenant
//! resolution, input validation, pipeline dispatch, and the only place where
//! internal typed errors become a caller-visible envelope. Raw store or
//! model diagnostics never cross this boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decay::{self, DecayEngine};
use crate::embeddings::{EmbeddingGateway, EmbeddingModel};
use crate::error::{EngramError, Result, Warning};
use crate::frameworks::{FrameworkId, FrameworkPlan, FrameworkSelector};
use crate::graph::WaypointGraphBuilder;
use crate::memory::{
    MemoryPatch, MemoryRecord, MemoryStats, PruningRecord, RankedResults, ReinforcementKind,
    RetrieveOptions, SearchFilters, SectorVector, StoreInput,
};
use crate::metacognition::{
    BiasFinding, EmotionScores, MetacognitiveAssessment, MetacognitiveMonitor,
};
use crate::reasoning::{
    ParallelReasoningCoordinator, ReasoningInput, ReasoningResult,
};
use crate::retrieval::RetrievalEngine;
use crate::scheduler::MaintenanceScheduler;
use crate::sector::Sector;
use crate::storage::PersistencePort;

/// Clock injected for deterministic tests
type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ============================================================================
// CALL SCOPE & ENVELOPE
// ============================================================================

/// Per-call metadata every tool call carries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallScope {
    /// Owning tenant; required
    pub tenant_id: String,
    /// Optional session correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Optional call deadline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl CallScope {
    /// A scope with only a tenant
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }
}

/// The caller-visible error shape
///
/// Internal details (database messages, stack context) are logged, not
/// forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// Stable machine-readable kind
    pub kind: String,
    /// Human-readable, sanitized message
    pub message: String,
    /// Whether the caller may retry
    pub retriable: bool,
}

impl From<&EngramError> for ErrorEnvelope {
    fn from(err: &EngramError) -> Self {
        let message = match err {
            // Dependency and internal failures are sanitized
            EngramError::PersistenceUnavailable(_) => "persistence unavailable".to_string(),
            EngramError::EmbeddingUnavailable(_) => "embedding service unavailable".to_string(),
            EngramError::Internal => "internal error".to_string(),
            other => other.to_string(),
        };
        Self {
            kind: err.kind().to_string(),
            message,
            retriable: err.is_retriable(),
        }
    }
}

// ============================================================================
// OUTPUT SHAPES
// ============================================================================

/// Receipt for a stored memory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReceipt {
    /// The new memory's id
    pub id: String,
    /// Non-fatal warnings (graph linking is best-effort)
    pub warnings: Vec<Warning>,
}

/// Output of `think` and `analyze_systematically`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkOutput {
    /// The chosen framework plan
    pub plan: FrameworkPlan,
    /// The synthesized reasoning result
    pub reasoning: ReasoningResult,
    /// Metacognitive read of the result
    pub assessment: MetacognitiveAssessment,
}

/// Output of `decompose_problem`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decomposition {
    /// Ordered sub-problems
    pub sub_problems: Vec<String>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// The engine facade behind every tool call
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    port: Arc<dyn PersistencePort>,
    gateway: Arc<EmbeddingGateway>,
    decay: Arc<DecayEngine>,
    graph: Arc<WaypointGraphBuilder>,
    retrieval: RetrievalEngine,
    coordinator: ParallelReasoningCoordinator,
    selector: FrameworkSelector,
    monitor: MetacognitiveMonitor,
    scheduler: Arc<MaintenanceScheduler>,
    clock: Clock,
}

impl Orchestrator {
    /// Compose the engine over a store and an embedding model
    ///
    /// The configuration must already be validated; an invalid one fails
    /// here with `ConfigInvalid`.
    pub fn new(
        config: EngineConfig,
        port: Arc<dyn PersistencePort>,
        model: Arc<dyn EmbeddingModel>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let gateway = Arc::new(EmbeddingGateway::new(model, config.embedding.clone()));
        let decay = Arc::new(DecayEngine::new(port.clone(), config.decay.clone()));
        let graph = Arc::new(WaypointGraphBuilder::new(
            port.clone(),
            config.graph.clone(),
        ));
        let retrieval = RetrievalEngine::new(
            port.clone(),
            gateway.clone(),
            decay.clone(),
            config.retrieval.clone(),
        );
        let coordinator = ParallelReasoningCoordinator::new(config.reasoning.clone());
        let selector = FrameworkSelector::new(config.reasoning.single_framework_threshold);
        let monitor = MetacognitiveMonitor::new();
        let scheduler = Arc::new(MaintenanceScheduler::new(
            port.clone(),
            decay.clone(),
            graph.clone(),
            config.scheduler.clone(),
        ));

        Ok(Self {
            config,
            port,
            gateway,
            decay,
            graph,
            retrieval,
            coordinator,
            selector,
            monitor,
            scheduler,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the clock (tests drive logical time through this)
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The background scheduler, for spawning `run_forever`
    pub fn scheduler(&self) -> Arc<MaintenanceScheduler> {
        self.scheduler.clone()
    }

    /// The configuration in force
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn check_scope(scope: &CallScope) -> Result<()> {
        if scope.tenant_id.trim().is_empty() {
            return Err(EngramError::MissingTenant);
        }
        Ok(())
    }

    async fn with_deadline<T>(
        scope: &CallScope,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match scope.deadline_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), fut)
                .await
                .map_err(|_| EngramError::DeadlineExceeded(ms))?,
            None => fut.await,
        }
    }

    /// Load a memory and enforce tenant ownership
    fn owned_memory(&self, scope: &CallScope, id: &str) -> Result<MemoryRecord> {
        let record = self
            .port
            .get_memory(id)?
            .ok_or_else(|| EngramError::MemoryNotFound(id.to_string()))?;
        if record.tenant_id != scope.tenant_id {
            // Cross-tenant probes look identical to absent ids
            return Err(EngramError::MemoryNotFound(id.to_string()));
        }
        Ok(record)
    }

    // ========================================================================
    // MEMORY TOOLS
    // ========================================================================

    /// Store a new memory: embed all five sectors, insert, link
    pub async fn store_memory(&self, scope: &CallScope, input: StoreInput) -> Result<StoreReceipt> {
        Self::check_scope(scope)?;
        if let Some(importance) = input.importance {
            if !(0.0..=1.0).contains(&importance) {
                return Err(EngramError::InvalidInput {
                    field: "importance".to_string(),
                    reason: "must be in [0, 1]".to_string(),
                });
            }
        }

        Self::with_deadline(scope, async {
            let now = self.now();
            let content = self.gateway.normalize_text(&input.content)?;
            let vectors = self.gateway.embed_all_sectors(&content).await?;

            let importance = input.importance.unwrap_or(0.5);
            let record = MemoryRecord {
                id: Uuid::new_v4().to_string(),
                tenant_id: scope.tenant_id.clone(),
                user_id: input.user_id.clone(),
                content: content.clone(),
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
                primary_sector: input
                    .primary_sector
                    .unwrap_or_else(|| infer_sector(&content)),
                base_strength: decay::initial_strength(importance, self.decay.config()),
                importance,
                metadata: input.metadata.clone(),
            };

            let sector_vectors: Vec<SectorVector> = vectors
                .into_iter()
                .map(|(sector, vector)| SectorVector {
                    memory_id: record.id.clone(),
                    sector,
                    vector,
                })
                .collect();
            self.port.insert_memory(&record, &sector_vectors)?;

            // Edges come after the committed insert; failures are warnings
            let semantic = sector_vectors
                .iter()
                .find(|sv| sv.sector == Sector::Semantic)
                .map(|sv| sv.vector.as_slice())
                .unwrap_or(&[]);
            let outcome = self.graph.link_new_memory(&record, semantic, now);

            tracing::info!(
                tenant_id = %scope.tenant_id,
                memory_id = %record.id,
                sector = %record.primary_sector,
                "memory stored"
            );
            Ok(StoreReceipt {
                id: record.id,
                warnings: outcome.warnings,
            })
        })
        .await
    }

    /// Retrieve a ranked, fused result set for a query
    pub async fn retrieve_memories(
        &self,
        scope: &CallScope,
        query: &str,
        opts: Option<RetrieveOptions>,
    ) -> Result<RankedResults> {
        Self::check_scope(scope)?;
        let opts = opts.unwrap_or_default();
        Self::with_deadline(scope, async {
            self.retrieval
                .retrieve(&scope.tenant_id, query, &opts, self.now())
                .await
        })
        .await
    }

    /// Patch a memory; content changes re-embed and rebuild edges
    pub async fn update_memory(
        &self,
        scope: &CallScope,
        id: &str,
        patch: MemoryPatch,
    ) -> Result<StoreReceipt> {
        Self::check_scope(scope)?;
        if let Some(importance) = patch.importance {
            if !(0.0..=1.0).contains(&importance) {
                return Err(EngramError::InvalidInput {
                    field: "importance".to_string(),
                    reason: "must be in [0, 1]".to_string(),
                });
            }
        }

        Self::with_deadline(scope, async {
            let now = self.now();
            let mut record = self.owned_memory(scope, id)?;
            let mut warnings = Vec::new();

            for (key, value) in patch.metadata {
                record.metadata.insert(key, value);
            }

            let mut new_vectors = None;
            if let Some(content) = patch.content {
                let content = self.gateway.normalize_text(&content)?;
                let vectors = self.gateway.embed_all_sectors(&content).await?;
                record.content = content;
                new_vectors = Some(
                    vectors
                        .into_iter()
                        .map(|(sector, vector)| SectorVector {
                            memory_id: record.id.clone(),
                            sector,
                            vector,
                        })
                        .collect::<Vec<_>>(),
                );
            }

            if let Some(importance) = patch.importance {
                let boost = (importance - record.importance).max(0.0);
                record.importance = importance;
                if boost > 0.0 {
                    let after = self.decay.reinforce_explicit(
                        &record,
                        boost,
                        ReinforcementKind::Importance,
                        now,
                    )?;
                    // Mirror the reinforcement write so the row update below
                    // doesn't regress strength or access time.
                    record.base_strength = after;
                    record.last_accessed_at = now;
                    record.access_count += 1;
                }
            }

            self.port.update_memory(&record, new_vectors.as_deref())?;

            if let Some(vectors) = &new_vectors {
                let semantic = vectors
                    .iter()
                    .find(|sv| sv.sector == Sector::Semantic)
                    .map(|sv| sv.vector.as_slice())
                    .unwrap_or(&[]);
                let outcome = self.graph.relink_memory(&record, semantic, now);
                warnings.extend(outcome.warnings);
            }

            Ok(StoreReceipt {
                id: record.id,
                warnings,
            })
        })
        .await
    }

    /// Delete a memory and its vectors and edges
    pub async fn delete_memory(&self, scope: &CallScope, id: &str) -> Result<String> {
        Self::check_scope(scope)?;
        let now = self.now();
        let record = self.owned_memory(scope, id)?;

        self.port.append_pruning(&PruningRecord {
            memory_id: record.id.clone(),
            timestamp: now,
            reason: "deleted by caller".to_string(),
            strength_at_prune: self.decay.strength(&record, now),
        })?;
        self.port.delete_memory(id)?;
        tracing::info!(tenant_id = %scope.tenant_id, memory_id = %id, "memory deleted");
        Ok(id.to_string())
    }

    /// Metadata-only search, no vectors involved
    pub fn search_memories(
        &self,
        scope: &CallScope,
        filters: SearchFilters,
    ) -> Result<Vec<MemoryRecord>> {
        Self::check_scope(scope)?;
        self.port.search_metadata(&scope.tenant_id, &filters)
    }

    /// Explicitly reinforce a memory with a caller-supplied boost
    pub fn reinforce_memory(&self, scope: &CallScope, id: &str, boost: f64) -> Result<f64> {
        Self::check_scope(scope)?;
        if !(0.0..=1.0).contains(&boost) {
            return Err(EngramError::InvalidInput {
                field: "boost".to_string(),
                reason: "must be in [0, 1]".to_string(),
            });
        }
        let record = self.owned_memory(scope, id)?;
        self.decay
            .reinforce_explicit(&record, boost, ReinforcementKind::Explicit, self.now())
    }

    /// Aggregate statistics for the caller's tenant
    pub fn stats(&self, scope: &CallScope) -> Result<MemoryStats> {
        Self::check_scope(scope)?;
        self.port
            .stats(&scope.tenant_id, self.decay.config(), self.now())
    }

    // ========================================================================
    // REASONING TOOLS
    // ========================================================================

    /// Full pipeline: select a framework, prime memories, reason, assess
    pub async fn think(
        &self,
        scope: &CallScope,
        problem: &str,
        context: Option<&str>,
    ) -> Result<ThinkOutput> {
        Self::check_scope(scope)?;
        Self::with_deadline(scope, async {
            let problem = self.gateway.normalize_text(problem)?;
            let plan = self.selector.select(&problem, context);
            let memories = self.prime_memories(scope, &problem).await;

            let reasoning = self
                .coordinator
                .reason(ReasoningInput {
                    problem: problem.clone(),
                    context: context.map(str::to_string),
                    memories,
                    framework_guidance: Some(plan.composed_skeleton.clone()),
                })
                .await?;

            let assessment = self.monitor.assess(&reasoning);
            Ok(ThinkOutput {
                plan,
                reasoning,
                assessment,
            })
        })
        .await
    }

    /// Reason under one named framework (or the selector's choice)
    pub async fn analyze_systematically(
        &self,
        scope: &CallScope,
        problem: &str,
        framework: Option<FrameworkId>,
    ) -> Result<ThinkOutput> {
        match framework {
            None => self.think(scope, problem, None).await,
            Some(framework) => {
                Self::check_scope(scope)?;
                Self::with_deadline(scope, async {
                    let problem = self.gateway.normalize_text(problem)?;
                    let plan = self.selector.pinned_plan(&problem, framework);
                    let memories = self.prime_memories(scope, &problem).await;

                    let reasoning = self
                        .coordinator
                        .reason(ReasoningInput {
                            problem: problem.clone(),
                            context: None,
                            memories,
                            framework_guidance: Some(plan.composed_skeleton.clone()),
                        })
                        .await?;

                    let assessment = self.monitor.assess(&reasoning);
                    Ok(ThinkOutput {
                        plan,
                        reasoning,
                        assessment,
                    })
                })
                .await
            }
        }
    }

    /// The parallel coordinator directly, without framework selection
    pub async fn think_parallel(
        &self,
        scope: &CallScope,
        problem: &str,
    ) -> Result<ReasoningResult> {
        Self::check_scope(scope)?;
        Self::with_deadline(scope, async {
            let problem = self.gateway.normalize_text(problem)?;
            let memories = self.prime_memories(scope, &problem).await;
            self.coordinator
                .reason(ReasoningInput {
                    problem,
                    context: None,
                    memories,
                    framework_guidance: None,
                })
                .await
        })
        .await
    }

    /// Split a problem into ordered sub-problems
    pub fn decompose_problem(&self, scope: &CallScope, problem: &str) -> Result<Decomposition> {
        Self::check_scope(scope)?;
        let problem = self.gateway.normalize_text(problem)?;

        let mut sub_problems: Vec<String> = problem
            .split(['.', ';', '?'])
            .flat_map(|part| part.split(" and then "))
            .flat_map(|part| part.split(", then "))
            .map(str::trim)
            .filter(|part| part.split_whitespace().count() >= 3)
            .map(str::to_string)
            .collect();

        if sub_problems.len() <= 1 {
            // Single-clause problems decompose along the selected
            // framework's skeleton instead.
            let plan = self.selector.select(&problem, None);
            sub_problems = plan
                .composed_skeleton
                .split(['.', '\n'])
                .map(|step| step.trim_matches(['.', ' ']))
                .filter(|step| step.split_whitespace().count() >= 3 && !step.starts_with('['))
                .map(|step| format!("{problem}: {step}"))
                .collect();
        }

        Ok(Decomposition { sub_problems })
    }

    /// Best-effort memory priming for reasoning calls
    async fn prime_memories(
        &self,
        scope: &CallScope,
        problem: &str,
    ) -> Vec<crate::memory::RetrievedMemory> {
        match self
            .retrieval
            .retrieve(&scope.tenant_id, problem, &RetrieveOptions::default(), self.now())
            .await
        {
            Ok(results) => results.results,
            Err(e) => {
                tracing::warn!(error = %e, "memory priming failed, reasoning unprimed");
                Vec::new()
            }
        }
    }

    // ========================================================================
    // METACOGNITIVE TOOLS
    // ========================================================================

    /// Calibrated confidence for a finished reasoning result
    pub fn assess_confidence(&self, scope: &CallScope, result: &ReasoningResult) -> Result<f64> {
        Self::check_scope(scope)?;
        Ok(self
            .monitor
            .calibrator()
            .calibrate(result.confidence))
    }

    /// Scan text for the eight bias classes
    pub fn detect_bias(&self, scope: &CallScope, text: &str) -> Result<Vec<BiasFinding>> {
        Self::check_scope(scope)?;
        if text.trim().is_empty() {
            return Err(EngramError::EmptyText);
        }
        Ok(self.monitor.bias_detector().detect(text))
    }

    /// Circumplex emotion read of a text
    pub fn detect_emotion(&self, scope: &CallScope, text: &str) -> Result<EmotionScores> {
        Self::check_scope(scope)?;
        if text.trim().is_empty() {
            return Err(EngramError::EmptyText);
        }
        Ok(self.monitor.emotion_analyzer().analyze(text))
    }

    /// Full metacognitive assessment of a reasoning result
    pub fn analyze_reasoning(
        &self,
        scope: &CallScope,
        result: &ReasoningResult,
    ) -> Result<MetacognitiveAssessment> {
        Self::check_scope(scope)?;
        Ok(self.monitor.assess(result))
    }

    /// Close the learning loop: how well did a plan's reasoning hold up
    pub fn record_outcome(
        &self,
        scope: &CallScope,
        plan_id: &str,
        problem: &str,
        observed_score: f64,
    ) -> Result<()> {
        Self::check_scope(scope)?;
        if !(0.0..=1.0).contains(&observed_score) {
            return Err(EngramError::InvalidInput {
                field: "observedScore".to_string(),
                reason: "must be in [0, 1]".to_string(),
            });
        }
        self.selector.record_feedback(plan_id, observed_score);
        self.monitor.calibrator().record_outcome(problem, observed_score);
        Ok(())
    }
}

/// Infer a primary sector from content when the caller doesn't name one
fn infer_sector(content: &str) -> Sector {
    let lower = content.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has_any(&["i feel", "i felt", "happy", "sad", "angry", "afraid", "excited", "love", "hate"])
    {
        Sector::Emotional
    } else if has_any(&["step 1", "first,", "how to", "procedure", "steps:", "then run", "install"])
    {
        Sector::Procedural
    } else if has_any(&["i realized", "i think", "i believe", "in hindsight", "reflecting on"]) {
        Sector::Reflective
    } else if has_any(&["yesterday", "today", "last week", "we met", "i went", "this morning"]) {
        Sector::Episodic
    } else {
        Sector::Semantic
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::storage::InMemoryStore;

    fn orchestrator() -> (Orchestrator, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = Orchestrator::new(
            EngineConfig::default(),
            store.clone(),
            Arc::new(HashEmbedder::new(64)),
        )
        .unwrap();
        (orchestrator, store)
    }

    fn scope() -> CallScope {
        CallScope::tenant("tenant-1")
    }

    #[tokio::test]
    async fn test_store_and_retrieve_roundtrip() {
        let (orchestrator, _store) = orchestrator();
        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "postgres connection pooling settings".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!receipt.id.is_empty());

        let results = orchestrator
            .retrieve_memories(&scope(), "postgres connection pooling settings", None)
            .await
            .unwrap();
        assert_eq!(results.results[0].id, receipt.id);
    }

    #[tokio::test]
    async fn test_missing_tenant_rejected() {
        let (orchestrator, _store) = orchestrator();
        let err = orchestrator
            .store_memory(
                &CallScope::default(),
                StoreInput {
                    content: "anything".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngramError::MissingTenant));
    }

    #[tokio::test]
    async fn test_importance_shapes_initial_strength() {
        let (orchestrator, store) = orchestrator();
        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "a critically important fact".into(),
                    importance: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let record = store.get_memory(&receipt.id).unwrap().unwrap();
        assert_eq!(record.base_strength, 1.0);

        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "a trivial fact".into(),
                    importance: Some(0.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let record = store.get_memory(&receipt.id).unwrap().unwrap();
        assert_eq!(record.base_strength, 0.5);
    }

    #[tokio::test]
    async fn test_importance_out_of_range_rejected() {
        let (orchestrator, _store) = orchestrator();
        let err = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "fine content".into(),
                    importance: Some(1.5),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngramError::InvalidInput { field, .. } if field == "importance"));
    }

    #[tokio::test]
    async fn test_cross_tenant_access_looks_like_not_found() {
        let (orchestrator, _store) = orchestrator();
        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "tenant one's secret".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let other = CallScope::tenant("tenant-2");
        let err = orchestrator
            .delete_memory(&other, &receipt.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngramError::MemoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_content_reembeds_and_relinks() {
        let (orchestrator, store) = orchestrator();
        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "original topic about databases".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let before = store
            .get_vector(&receipt.id, Sector::Semantic)
            .unwrap()
            .unwrap();

        orchestrator
            .update_memory(
                &scope(),
                &receipt.id,
                MemoryPatch {
                    content: Some("entirely different subject about gardening".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let after = store
            .get_vector(&receipt.id, Sector::Semantic)
            .unwrap()
            .unwrap();
        assert_ne!(before, after);
        let record = store.get_memory(&receipt.id).unwrap().unwrap();
        assert!(record.content.contains("gardening"));
    }

    #[tokio::test]
    async fn test_update_both_content_and_importance() {
        let (orchestrator, store) = orchestrator();
        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "initial wording of the note".into(),
                    importance: Some(0.2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        orchestrator
            .update_memory(
                &scope(),
                &receipt.id,
                MemoryPatch {
                    content: Some("rewritten wording of the note".into()),
                    importance: Some(0.9),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get_memory(&receipt.id).unwrap().unwrap();
        assert!(record.content.contains("rewritten"));
        assert_eq!(record.importance, 0.9);
        // The importance raise was logged as a reinforcement
        let log = store.reinforcement_log(&receipt.id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, ReinforcementKind::Importance);
        assert!(record.base_strength > 0.6);
    }

    #[tokio::test]
    async fn test_delete_logs_pruning_record() {
        let (orchestrator, store) = orchestrator();
        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "to be deleted".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        orchestrator.delete_memory(&scope(), &receipt.id).await.unwrap();
        assert!(store.get_memory(&receipt.id).unwrap().is_none());
        let log = store.pruning_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].reason, "deleted by caller");
    }

    #[tokio::test]
    async fn test_reinforce_memory_logs_explicit_kind() {
        let (orchestrator, store) = orchestrator();
        let receipt = orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "worth keeping around".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let after = orchestrator
            .reinforce_memory(&scope(), &receipt.id, 0.2)
            .unwrap();
        assert!(after > 0.75);

        let log = store.reinforcement_log(&receipt.id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, ReinforcementKind::Explicit);
    }

    #[tokio::test]
    async fn test_think_produces_plan_reasoning_assessment() {
        let (orchestrator, _store) = orchestrator();
        orchestrator
            .store_memory(
                &scope(),
                StoreInput {
                    content: "batching the importer fixed the timeout problem".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let output = orchestrator
            .think(
                &scope(),
                "why does the importer keep hitting its timeout?",
                None,
            )
            .await
            .unwrap();

        assert!(!output.plan.frameworks.is_empty());
        assert_eq!(output.reasoning.stream_results.len(), 4);
        assert!((0.0..=1.0).contains(&output.assessment.calibrated_confidence));
    }

    #[tokio::test]
    async fn test_analyze_systematically_pins_framework() {
        let (orchestrator, _store) = orchestrator();
        let output = orchestrator
            .analyze_systematically(
                &scope(),
                "should we rewrite the ingestion service?",
                Some(FrameworkId::FirstPrinciples),
            )
            .await
            .unwrap();
        assert_eq!(output.plan.frameworks, vec![FrameworkId::FirstPrinciples]);
        assert!(!output.plan.hybrid);
    }

    #[tokio::test]
    async fn test_decompose_splits_multi_clause_problem() {
        let (orchestrator, _store) = orchestrator();
        let decomposition = orchestrator
            .decompose_problem(
                &scope(),
                "migrate the schema safely. backfill the new column and then remove the old one.",
            )
            .unwrap();
        assert!(decomposition.sub_problems.len() >= 3);
    }

    #[tokio::test]
    async fn test_detect_bias_and_emotion_tools() {
        let (orchestrator, _store) = orchestrator();
        let biases = orchestrator
            .detect_bias(&scope(), "this clearly shows we were right, as expected")
            .unwrap();
        assert!(!biases.is_empty());

        let emotion = orchestrator
            .detect_emotion(&scope(), "total panic, the outage is a crisis")
            .unwrap();
        assert!(emotion.valence < 0.0);

        assert!(matches!(
            orchestrator.detect_bias(&scope(), "  "),
            Err(EngramError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn test_deadline_zero_times_out() {
        let (orchestrator, _store) = orchestrator();
        let mut deadline_scope = scope();
        deadline_scope.deadline_ms = Some(0);
        let err = orchestrator
            .think_parallel(&deadline_scope, "any problem at all")
            .await
            .unwrap_err();
        assert!(matches!(err, EngramError::DeadlineExceeded(0)));
    }

    #[tokio::test]
    async fn test_error_envelope_sanitizes_internals() {
        let err = EngramError::PersistenceUnavailable("secret dsn uri leaked".into());
        let envelope = ErrorEnvelope::from(&err);
        assert_eq!(envelope.kind, "persistence_unavailable");
        assert!(!envelope.message.contains("secret"));
        assert!(envelope.retriable);

        let err = EngramError::TextTooLong { len: 10, max: 5 };
        let envelope = ErrorEnvelope::from(&err);
        assert!(!envelope.retriable);
    }

    #[test]
    fn test_infer_sector_heuristics() {
        assert_eq!(infer_sector("i feel happy about the launch"), Sector::Emotional);
        assert_eq!(infer_sector("how to rotate the signing keys"), Sector::Procedural);
        assert_eq!(infer_sector("i realized the design was wrong"), Sector::Reflective);
        assert_eq!(infer_sector("yesterday we met the vendor"), Sector::Episodic);
        assert_eq!(infer_sector("water boils at 100 celsius"), Sector::Semantic);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_construction() {
        let mut config = EngineConfig::default();
        config.retrieval.score_weights.similarity = 0.9;
        let err = Orchestrator::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(HashEmbedder::new(8)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngramError::ConfigInvalid { .. }));
    }
}
