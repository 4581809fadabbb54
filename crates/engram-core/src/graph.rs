//! Waypoint Graph Builder
//!
//! Maintains a sparse, bounded-degree similarity graph so retrieval can
//! expand from a seed hit to related memories without a dense N×N structure.
//!
//! Invariants:
//! - edges link memories of the same tenant only
//! - weight is the SEMANTIC-sector cosine at creation time, in (0, 1]
//! - no self-loops, no duplicate pairs
//! - after stabilization every node has between `min_degree` and
//!   `max_degree` outgoing edges
//!
//! Maintenance is best-effort: a failed edge insert never invalidates the
//! memory insert; the repair pass recovers it later.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::GraphConfig;
use crate::error::{Result, Warning};
use crate::memory::MemoryRecord;
use crate::sector::Sector;
use crate::storage::{AnnFilter, PersistencePort};

// ============================================================================
// BUILDER
// ============================================================================

/// Builds and repairs the waypoint graph
pub struct WaypointGraphBuilder {
    port: Arc<dyn PersistencePort>,
    config: GraphConfig,
}

/// Outcome of linking one memory
#[derive(Debug, Clone, Default)]
pub struct LinkOutcome {
    /// Edges created or refreshed (one per neighbor, counted once)
    pub edges_created: usize,
    /// Non-fatal problems encountered
    pub warnings: Vec<Warning>,
}

impl WaypointGraphBuilder {
    /// Create a builder over a store
    pub fn new(port: Arc<dyn PersistencePort>, config: GraphConfig) -> Self {
        Self { port, config }
    }

    /// The graph configuration in force
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Link a newly inserted memory into the graph
    ///
    /// Never fails the caller; all problems surface as warnings.
    pub fn link_new_memory(
        &self,
        record: &MemoryRecord,
        semantic_vec: &[f32],
        now: DateTime<Utc>,
    ) -> LinkOutcome {
        match self.link(record, semantic_vec, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(memory_id = %record.id, error = %e, "waypoint linking failed");
                LinkOutcome {
                    edges_created: 0,
                    warnings: vec![Warning::GraphInsertFailed {
                        memory_id: record.id.clone(),
                        detail: e.to_string(),
                    }],
                }
            }
        }
    }

    /// Drop a memory's edges and link it afresh
    ///
    /// Used after a content change re-embeds the memory: stale edges carry
    /// weights from the old vector and must not survive.
    pub fn relink_memory(
        &self,
        record: &MemoryRecord,
        semantic_vec: &[f32],
        now: DateTime<Utc>,
    ) -> LinkOutcome {
        if let Err(e) = self.clear_edges(&record.id) {
            tracing::warn!(memory_id = %record.id, error = %e, "edge clear failed");
            return LinkOutcome {
                edges_created: 0,
                warnings: vec![Warning::GraphInsertFailed {
                    memory_id: record.id.clone(),
                    detail: e.to_string(),
                }],
            };
        }
        self.link_new_memory(record, semantic_vec, now)
    }

    fn clear_edges(&self, id: &str) -> Result<()> {
        for edge in self.port.neighbors(id)? {
            self.port.remove_edge(&edge.from_id, &edge.to_id)?;
            self.port.remove_edge(&edge.to_id, &edge.from_id)?;
        }
        Ok(())
    }

    /// Re-link one existing memory; used by the background repair pass
    pub fn repair_node(&self, id: &str, now: DateTime<Utc>) -> Result<LinkOutcome> {
        let Some(record) = self.port.get_memory(id)? else {
            return Ok(LinkOutcome::default());
        };
        let Some(semantic_vec) = self.port.get_vector(id, Sector::Semantic)? else {
            return Ok(LinkOutcome::default());
        };
        self.link(&record, &semantic_vec, now)
    }

    /// Ids currently in need of repair: degree below `min_degree` or an edge
    /// whose weight drifted below `edge_floor / 2`
    pub fn repair_candidates(&self) -> Result<Vec<String>> {
        self.port
            .repair_candidates(self.config.min_degree, self.config.edge_floor / 2.0)
    }

    fn link(
        &self,
        record: &MemoryRecord,
        semantic_vec: &[f32],
        now: DateTime<Utc>,
    ) -> Result<LinkOutcome> {
        let mut outcome = LinkOutcome::default();

        // Over-fetch so dropping self and sub-floor hits still leaves
        // max_degree viable neighbors.
        let k = self.config.max_degree * 3;
        let hits = self.port.ann_search(
            Sector::Semantic,
            semantic_vec,
            k + 1,
            &AnnFilter::tenant(record.tenant_id.clone()),
        )?;

        let viable: Vec<(String, f64)> = hits
            .into_iter()
            .filter(|(id, sim)| id != &record.id && *sim > 0.0)
            .map(|(id, sim)| (id, f64::from(sim).min(1.0)))
            .collect();

        let mut chosen: Vec<(String, f64)> = viable
            .iter()
            .filter(|(_, sim)| *sim >= self.config.edge_floor)
            .take(self.config.max_degree)
            .cloned()
            .collect();

        // Every memory gets at least one link: fall back to the best
        // neighbors regardless of floor.
        if chosen.len() < self.config.min_degree {
            chosen = viable.into_iter().take(self.config.min_degree).collect();
        }

        for (neighbor_id, weight) in &chosen {
            self.port.upsert_edge(&record.id, neighbor_id, *weight, now)?;
            self.port.upsert_edge(neighbor_id, &record.id, *weight, now)?;
            outcome.edges_created += 1;

            if let Some(warning) = self.enforce_degree_cap(neighbor_id)? {
                outcome.warnings.push(warning);
            }
        }
        self.enforce_degree_cap(&record.id)?;

        tracing::debug!(
            memory_id = %record.id,
            edges = outcome.edges_created,
            "linked memory into waypoint graph"
        );
        Ok(outcome)
    }

    /// Drop weakest edges of a node until it is back within the cap
    ///
    /// Victims are chosen weakest-first among edges whose counterpart keeps
    /// at least `min_degree` afterwards, so capping one node cannot strand
    /// another at degree zero. Only when every counterpart sits at the
    /// minimum does the absolute weakest edge go.
    fn enforce_degree_cap(&self, id: &str) -> Result<Option<Warning>> {
        let mut edges = self.port.neighbors(id)?;
        if edges.len() <= self.config.max_degree {
            return Ok(None);
        }
        while edges.len() > self.config.max_degree {
            // neighbors() is sorted strongest first; scan from the weak end
            let mut victim_idx = edges.len() - 1;
            for i in (0..edges.len()).rev() {
                let counterpart_degree = self.port.neighbors(&edges[i].to_id)?.len();
                if counterpart_degree > self.config.min_degree {
                    victim_idx = i;
                    break;
                }
            }
            let victim = edges.remove(victim_idx);
            self.port.remove_edge(&victim.from_id, &victim.to_id)?;
            self.port.remove_edge(&victim.to_id, &victim.from_id)?;
        }
        Ok(Some(Warning::EdgeCapExceededTransiently {
            memory_id: id.to_string(),
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
