//! # Engram Core
//!
//! Hierarchical memory decomposition engine for AI systems:
//!
//! - **Five-Sector Embeddings**: every memory is embedded into episodic,
//!   semantic, procedural, emotional, and reflective subspaces
//! - **Waypoint Graph**: sparse, bounded-degree similarity graph for
//!   one-hop retrieval expansion
//! - **Temporal Decay**: exponential per-sector decay with reinforcement on
//!   access and background pruning
//! - **Composite Retrieval**: similarity, salience, recency, and link
//!   weight fused into one deterministic ranking
//! - **Parallel Reasoning**: four concurrent streams with checkpointed
//!   insight sharing and dissent-preserving synthesis
//! - **Metacognition**: calibrated confidence, rule-based bias detection,
//!   and Circumplex emotion reads
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use engram_core::{
//!     CallScope, EngineConfig, HashEmbedder, Orchestrator, SqliteStore, StoreInput,
//! };
//!
//! let store = Arc::new(SqliteStore::new(None)?);
//! let engine = Orchestrator::new(
//!     EngineConfig::default(),
//!     store,
//!     Arc::new(HashEmbedder::default()),
//! )?;
//!
//! let scope = CallScope::tenant("tenant-1");
//! let receipt = engine.store_memory(&scope, StoreInput {
//!     content: "the mitochondria is the powerhouse of the cell".into(),
//!     ..Default::default()
//! }).await?;
//!
//! let results = engine.retrieve_memories(&scope, "cellular energy", None).await?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
// Only warn about missing docs for public items exported from the crate root
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod api;
pub mod config;
pub mod decay;
pub mod embeddings;
pub mod error;
pub mod frameworks;
pub mod graph;
pub mod memory;
pub mod metacognition;
pub mod reasoning;
pub mod retrieval;
pub mod scheduler;
pub mod sector;
pub mod storage;
pub mod vecmath;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Orchestrator surface
pub use api::{
    CallScope, Decomposition, ErrorEnvelope, Orchestrator, StoreReceipt, ThinkOutput,
};

// Configuration
pub use config::{
    DecayConfig, EmbeddingConfig, EngineConfig, GraphConfig, ReasoningConfig, RetrievalConfig,
    SchedulerConfig, ScoreWeights,
};

// Errors
pub use error::{EngramError, Result, Warning};

// Entities and DTOs
pub use memory::{
    MemoryPatch, MemoryRecord, MemoryStats, PruningRecord, RankedResults, ReinforcementEvent,
    ReinforcementKind, RetrieveOptions, RetrievedMemory, SearchFilters, SectorVector, StoreInput,
    WaypointEdge,
};

// Sectors
pub use sector::{Sector, SECTORS};

// Embedding gateway
pub use embeddings::{EmbeddingGateway, EmbeddingModel, HashEmbedder};

// Persistence
pub use storage::{AnnFilter, InMemoryStore, PersistencePort, SqliteStore, WeakScanPage};

// Decay engine
pub use decay::{effective_strength, initial_strength, recency_weight, DecayEngine};

// Waypoint graph
pub use graph::{LinkOutcome, WaypointGraphBuilder};

// Retrieval
pub use retrieval::RetrievalEngine;

// Scheduler
pub use scheduler::{MaintenanceReport, MaintenanceScheduler};

// Reasoning
pub use reasoning::{
    AnalyticalStream, Claim, CreativeStream, CriticalStream, DissentingClaim, MergedClaim,
    ParallelReasoningCoordinator, ReasoningInput, ReasoningResult, ReasoningStream, StreamKind,
    StreamResult, SyntheticStream,
};

// Frameworks
pub use frameworks::{FrameworkId, FrameworkPlan, FrameworkSelector, ProblemFeatures};

// Metacognition
pub use metacognition::{
    BiasDetector, BiasFinding, BiasKind, ConfidenceCalibrator, EmotionAnalyzer, EmotionScores,
    MetacognitiveAssessment, MetacognitiveMonitor,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of embedding sectors per memory
pub const SECTOR_COUNT: usize = 5;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        CallScope, EngineConfig, EngramError, HashEmbedder, InMemoryStore, MemoryRecord,
        Orchestrator, RankedResults, Result, RetrieveOptions, Sector, SqliteStore, StoreInput,
    };

    pub use crate::{
        MetacognitiveMonitor, ParallelReasoningCoordinator, ReasoningResult, StreamKind,
    };
}
