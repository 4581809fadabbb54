//! Memory entities
//!
//! The data model of the store: memory rows, per-sector vectors, waypoint
//! edges, and the two append-only logs. Strength is never stored directly;
//! it is reconstructed at read time from `base_strength`, `last_accessed_at`,
//! and the decay configuration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sector::Sector;

// ============================================================================
// MEMORY RECORD
// ============================================================================

/// A memory row
///
/// Owned exclusively by the store; sector vectors and waypoint edges cascade
/// on delete. Reinforcement and pruning log entries outlive the row.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Owner tenant
    pub tenant_id: String,
    /// Owner user within the tenant, when known
    pub user_id: Option<String>,
    /// Original text
    pub content: String,
    /// When the memory was created
    pub created_at: DateTime<Utc>,
    /// When the memory was last accessed (reinforced)
    pub last_accessed_at: DateTime<Utc>,
    /// Number of accesses since creation
    pub access_count: i64,
    /// Sector of record; controls the decay multiplier
    pub primary_sector: Sector,
    /// Stored salience in [0, 1] before decay
    pub base_strength: f64,
    /// Caller-supplied or inferred importance in [0, 1]
    pub importance: f64,
    /// Small key/value map (tags, source, session)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl MemoryRecord {
    /// Hours elapsed since the last access, never negative
    pub fn hours_since_access(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.last_accessed_at).num_milliseconds() as f64 / 1000.0;
        (secs / 3600.0).max(0.0)
    }

    /// Days elapsed since the last access, never negative
    pub fn days_since_access(&self, now: DateTime<Utc>) -> f64 {
        self.hours_since_access(now) / 24.0
    }
}

// ============================================================================
// SECTOR VECTOR
// ============================================================================

/// One embedding vector for a (memory, sector) pair
///
/// Exactly one per pair. Dimension is fixed per sector per deployment, but
/// sectors may differ from one another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorVector {
    /// Owning memory
    pub memory_id: String,
    /// Which subspace this vector lives in
    pub sector: Sector,
    /// The embedding
    pub vector: Vec<f32>,
}

// ============================================================================
// WAYPOINT EDGE
// ============================================================================

/// A weighted link between two memories of the same tenant
///
/// Undirected semantically, stored as two directed rows. Weight is the
/// SEMANTIC-sector cosine similarity at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointEdge {
    /// Source node
    pub from_id: String,
    /// Target node
    pub to_id: String,
    /// Similarity weight in (0, 1]
    pub weight: f64,
    /// When the edge was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// APPEND-ONLY LOGS
// ============================================================================

/// What triggered a reinforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReinforcementKind {
    /// Automatic boost on retrieval
    Access,
    /// Caller-requested boost
    Explicit,
    /// Boost derived from an importance update
    Importance,
}

impl ReinforcementKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReinforcementKind::Access => "access",
            ReinforcementKind::Explicit => "explicit",
            ReinforcementKind::Importance => "importance",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "access" => Some(ReinforcementKind::Access),
            "explicit" => Some(ReinforcementKind::Explicit),
            "importance" => Some(ReinforcementKind::Importance),
            _ => None,
        }
    }
}

/// One entry in the reinforcement log
///
/// Append-only; entries persist beyond the memory they reference and feed
/// the metacognitive learning signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinforcementEvent {
    /// Reinforced memory
    pub memory_id: String,
    /// When the reinforcement was applied
    pub timestamp: DateTime<Utc>,
    /// What triggered it
    pub kind: ReinforcementKind,
    /// Boost that was applied
    pub boost: f64,
    /// Effective strength immediately before
    pub strength_before: f64,
    /// Base strength immediately after
    pub strength_after: f64,
    /// Retrieval call that produced the event, when kind = access
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// One entry in the pruning log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruningRecord {
    /// Pruned memory
    pub memory_id: String,
    /// When the prune happened
    pub timestamp: DateTime<Utc>,
    /// Why it was pruned
    pub reason: String,
    /// Effective strength at prune time
    pub strength_at_prune: f64,
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for storing a new memory
///
/// Uses `deny_unknown_fields` to prevent field injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreInput {
    /// The text to remember
    pub content: String,
    /// Sector of record; inferred from content when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_sector: Option<Sector>,
    /// Importance in [0, 1]; modifies initial strength
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    /// Owner user within the tenant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Small key/value map (tags, source, session)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Default for StoreInput {
    fn default() -> Self {
        Self {
            content: String::new(),
            primary_sector: None,
            importance: None,
            user_id: None,
            metadata: HashMap::new(),
        }
    }
}

/// Patch for updating an existing memory
///
/// Content changes trigger re-embedding and an edge rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemoryPatch {
    /// Replacement text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New importance in [0, 1]; applies an importance reinforcement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    /// Metadata keys to merge in (existing keys are overwritten)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Options for a retrieval call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetrieveOptions {
    /// Sectors to query; all five when empty
    #[serde(default)]
    pub sectors: Vec<Sector>,
    /// ANN candidates per sector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_per_sector: Option<usize>,
    /// Size of the final ranked set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_k: Option<usize>,
    /// Expand one hop through waypoint edges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_graph_expansion: Option<bool>,
    /// Minimum composite score to keep a candidate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_composite_score: Option<f64>,
    /// Required metadata tags (all must match)
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Only memories created at or after this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    /// Only memories created at or before this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            sectors: Vec::new(),
            k_per_sector: None,
            final_k: None,
            use_graph_expansion: None,
            min_composite_score: None,
            tags: HashMap::new(),
            created_after: None,
            created_before: None,
        }
    }
}

/// Metadata-only search filters (no vectors involved)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchFilters {
    /// Required metadata tags (all must match)
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Restrict to one sector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<Sector>,
    /// Only memories created at or after this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    /// Only memories created at or before this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
    /// Maximum rows to return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

// ============================================================================
// RESULT TYPES
// ============================================================================

/// One ranked retrieval hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedMemory {
    /// Memory id
    pub id: String,
    /// Original text
    pub content: String,
    /// Composite score in [0, 1]
    pub score: f64,
    /// Best raw similarity across queried sectors
    pub similarity: f64,
    /// Similarity per queried sector, for explanation
    pub per_sector_similarity: HashMap<Sector, f64>,
    /// Effective strength snapshot used for ranking
    pub effective_strength: f64,
    /// Whether the hit arrived via graph expansion
    pub expanded: bool,
    /// Sector of record
    pub primary_sector: Sector,
    /// Caller metadata
    pub metadata: HashMap<String, String>,
}

/// The ranked result set of one retrieval call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResults {
    /// Hits, best first
    pub results: Vec<RetrievedMemory>,
    /// Whether waypoint expansion ran
    pub used_graph_expansion: bool,
    /// Unique id of this retrieval call
    pub trace_id: String,
    /// Non-fatal warnings (partial sectors, graph issues)
    #[serde(default)]
    pub warnings: Vec<crate::error::Warning>,
}

/// Aggregate statistics over one tenant's memories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Total live memories
    pub total_memories: i64,
    /// Live memories per sector
    pub by_sector: HashMap<Sector, i64>,
    /// Mean effective strength at the time of the call
    pub avg_effective_strength: f64,
    /// Directed waypoint edge rows
    pub edge_count: i64,
    /// Reinforcement log length
    pub reinforcement_events: i64,
    /// Pruning log length
    pub pruning_records: i64,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(now: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            id: "m-1".into(),
            tenant_id: "t-1".into(),
            user_id: None,
            content: "hello".into(),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            primary_sector: Sector::Semantic,
            base_strength: 1.0,
            importance: 0.5,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_hours_since_access() {
        let now = Utc::now();
        let mem = record(now - Duration::hours(48));
        assert!((mem.hours_since_access(now) - 48.0).abs() < 0.01);
        assert!((mem.days_since_access(now) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_hours_since_access_never_negative() {
        let now = Utc::now();
        let mem = record(now + Duration::hours(1));
        assert_eq!(mem.hours_since_access(now), 0.0);
    }

    #[test]
    fn test_store_input_deny_unknown_fields() {
        let json = r#"{"content": "test", "primarySector": "semantic"}"#;
        assert!(serde_json::from_str::<StoreInput>(json).is_ok());

        let bad = r#"{"content": "test", "baseStrength": 99.0}"#;
        assert!(serde_json::from_str::<StoreInput>(bad).is_err());
    }

    #[test]
    fn test_reinforcement_kind_roundtrip() {
        for kind in [
            ReinforcementKind::Access,
            ReinforcementKind::Explicit,
            ReinforcementKind::Importance,
        ] {
            assert_eq!(ReinforcementKind::parse_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ReinforcementKind::parse_name("decay"), None);
    }
}
