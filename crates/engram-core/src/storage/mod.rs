//! Persistence Port
//!
//! Abstract typed interface over the backing store, so the engine core is
//! testable without a database. Two implementations ship:
//!
//! - [`SqliteStore`]: production store (WAL, migrations, vectors as blobs)
//! - [`InMemoryStore`]: deterministic store for tests
//!
//! Concurrency contract: individual operations are linearizable; multi-step
//! operations (memory + five vectors) are transactional. Readers never
//! observe a memory without its five sector vectors.

mod memory_store;
mod migrations;
mod sqlite;

pub use memory_store::InMemoryStore;
pub use migrations::MIGRATIONS;
pub use sqlite::SqliteStore;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::DecayConfig;
use crate::error::Result;
use crate::memory::{
    MemoryRecord, MemoryStats, PruningRecord, ReinforcementEvent, SearchFilters, SectorVector,
    WaypointEdge,
};
use crate::sector::Sector;

// ============================================================================
// SUPPORTING TYPES
// ============================================================================

/// Scope filter for ANN searches
#[derive(Debug, Clone, Default)]
pub struct AnnFilter {
    /// Owning tenant; required for every search
    pub tenant_id: String,
    /// Required metadata tags (all must match); empty = no tag filter
    pub tags: HashMap<String, String>,
    /// Only memories created at or after this instant
    pub created_after: Option<DateTime<Utc>>,
    /// Only memories created at or before this instant
    pub created_before: Option<DateTime<Utc>>,
}

impl AnnFilter {
    /// Filter scoped to a tenant only
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }

    /// Whether a record passes the non-tenant parts of the filter
    pub fn matches_metadata(&self, record: &MemoryRecord) -> bool {
        if let Some(after) = self.created_after {
            if record.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if record.created_at > before {
                return false;
            }
        }
        self.tags
            .iter()
            .all(|(k, v)| record.metadata.get(k) == Some(v))
    }
}

/// One page of a weak-memory scan
///
/// `next_cursor` is the id to resume from; `None` means the scan finished.
/// Cursors survive process restarts (the scheduler persists them between
/// batches).
#[derive(Debug, Clone)]
pub struct WeakScanPage {
    /// Memories whose effective strength fell below the threshold
    pub candidates: Vec<MemoryRecord>,
    /// Resume point for the next batch
    pub next_cursor: Option<String>,
}

// ============================================================================
// PERSISTENCE PORT
// ============================================================================

/// The abstract store beneath the engine
///
/// Synchronous by design: the production backend is SQLite behind connection
/// mutexes, and every call is short. Async orchestration happens above this
/// trait.
pub trait PersistencePort: Send + Sync {
    /// Atomic insert of a memory and its five sector vectors
    ///
    /// Fails if the id collides. Readers never see the row without vectors.
    fn insert_memory(&self, record: &MemoryRecord, vectors: &[SectorVector]) -> Result<()>;

    /// Fetch a memory row by id, without tenant scoping
    ///
    /// Tenant enforcement happens in the orchestrator, which owns the
    /// caller-visible not-found semantics.
    fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>>;

    /// Fetch one sector vector for a memory
    fn get_vector(&self, id: &str, sector: Sector) -> Result<Option<Vec<f32>>>;

    /// Replace a memory row (and optionally its vectors) in one transaction
    fn update_memory(
        &self,
        record: &MemoryRecord,
        vectors: Option<&[SectorVector]>,
    ) -> Result<()>;

    /// Atomic strength/access write used by reinforcement
    fn update_strength_and_access(
        &self,
        id: &str,
        new_strength: f64,
        accessed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Cascade delete a memory, its vectors, and all incident edges
    ///
    /// Returns whether the memory existed. Log entries are retained.
    fn delete_memory(&self, id: &str) -> Result<bool>;

    /// Nearest neighbors in one sector, scoped by the filter
    ///
    /// Returns `(id, similarity)` sorted by similarity descending, ties by
    /// ascending id, truncated to `k`.
    fn ann_search(
        &self,
        sector: Sector,
        query: &[f32],
        k: usize,
        filter: &AnnFilter,
    ) -> Result<Vec<(String, f32)>>;

    /// Batched scan over memories with `effective_strength < threshold`
    ///
    /// Iterates in ascending-id order from `cursor` (exclusive).
    fn scan_weak(
        &self,
        threshold: f64,
        decay: &DecayConfig,
        now: DateTime<Utc>,
        cursor: Option<&str>,
        batch: usize,
    ) -> Result<WeakScanPage>;

    /// Insert or update a directed edge; self-loops are rejected
    fn upsert_edge(&self, from: &str, to: &str, weight: f64, created_at: DateTime<Utc>)
        -> Result<()>;

    /// Remove a directed edge; missing edges are a no-op
    fn remove_edge(&self, from: &str, to: &str) -> Result<()>;

    /// Outgoing edges of a node, strongest first
    fn neighbors(&self, id: &str) -> Result<Vec<WaypointEdge>>;

    /// Ids of nodes needing graph repair
    ///
    /// A node qualifies when its outgoing degree is below `min_degree` or
    /// any of its outgoing edges has drifted below `weight_floor`.
    fn repair_candidates(&self, min_degree: usize, weight_floor: f64) -> Result<Vec<String>>;

    /// Append to the reinforcement log
    fn append_reinforcement(&self, event: &ReinforcementEvent) -> Result<()>;

    /// Append to the pruning log
    fn append_pruning(&self, record: &PruningRecord) -> Result<()>;

    /// Reinforcement log entries for one memory, oldest first
    fn reinforcement_log(&self, memory_id: &str) -> Result<Vec<ReinforcementEvent>>;

    /// Drop reinforcement entries older than the cutoff; returns rows removed
    fn compact_reinforcements(&self, older_than: DateTime<Utc>) -> Result<u64>;

    /// Metadata-only search (no vectors), newest first
    fn search_metadata(&self, tenant_id: &str, filters: &SearchFilters)
        -> Result<Vec<MemoryRecord>>;

    /// Aggregate statistics for one tenant
    fn stats(&self, tenant_id: &str, decay: &DecayConfig, now: DateTime<Utc>)
        -> Result<MemoryStats>;
}
