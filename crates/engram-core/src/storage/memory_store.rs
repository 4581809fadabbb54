//! In-memory persistence
//!
//! Deterministic reference implementation of the port, used by tests and
//! local development. Rows live in ordered maps so scans and tie-breaks are
//! reproducible run to run.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::config::DecayConfig;
use crate::decay;
use crate::error::{EngramError, Result};
use crate::memory::{
    MemoryRecord, MemoryStats, PruningRecord, ReinforcementEvent, SearchFilters, SectorVector,
    WaypointEdge,
};
use crate::sector::Sector;
use crate::vecmath;

use super::{AnnFilter, PersistencePort, WeakScanPage};

// ============================================================================
// STORE
// ============================================================================

/// In-memory store with the same contract as the SQLite backend
#[derive(Default)]
pub struct InMemoryStore {
    memories: RwLock<BTreeMap<String, MemoryRecord>>,
    vectors: RwLock<BTreeMap<String, HashMap<Sector, Vec<f32>>>>,
    edges: RwLock<BTreeMap<String, Vec<WaypointEdge>>>,
    reinforcements: RwLock<Vec<ReinforcementEvent>>,
    prunings: RwLock<Vec<PruningRecord>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> EngramError {
        EngramError::PersistenceUnavailable("store lock poisoned".to_string())
    }

    /// All pruning log entries, oldest first
    pub fn pruning_log(&self) -> Result<Vec<PruningRecord>> {
        Ok(self.prunings.read().map_err(|_| Self::poisoned())?.clone())
    }
}

#[cfg(test)]
impl InMemoryStore {
    /// Five zero vectors for tests that don't exercise similarity
    pub(crate) fn zero_vectors(id: &str, dim: usize) -> Vec<SectorVector> {
        Sector::all()
            .into_iter()
            .map(|sector| SectorVector {
                memory_id: id.to_string(),
                sector,
                vector: vec![0.0; dim],
            })
            .collect()
    }
}

impl PersistencePort for InMemoryStore {
    fn insert_memory(&self, record: &MemoryRecord, vectors: &[SectorVector]) -> Result<()> {
        let mut memories = self.memories.write().map_err(|_| Self::poisoned())?;
        if memories.contains_key(&record.id) {
            return Err(EngramError::InvalidInput {
                field: "id".to_string(),
                reason: format!("memory id collision: {}", record.id),
            });
        }
        let mut vector_map = HashMap::with_capacity(vectors.len());
        for sv in vectors {
            vector_map.insert(sv.sector, sv.vector.clone());
        }
        // Both maps update under the memories write lock, so no reader can
        // observe the row without its vectors.
        self.vectors
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(record.id.clone(), vector_map);
        memories.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        Ok(self
            .memories
            .read()
            .map_err(|_| Self::poisoned())?
            .get(id)
            .cloned())
    }

    fn get_vector(&self, id: &str, sector: Sector) -> Result<Option<Vec<f32>>> {
        Ok(self
            .vectors
            .read()
            .map_err(|_| Self::poisoned())?
            .get(id)
            .and_then(|m| m.get(&sector))
            .cloned())
    }

    fn update_memory(
        &self,
        record: &MemoryRecord,
        vectors: Option<&[SectorVector]>,
    ) -> Result<()> {
        let mut memories = self.memories.write().map_err(|_| Self::poisoned())?;
        if !memories.contains_key(&record.id) {
            return Err(EngramError::MemoryNotFound(record.id.clone()));
        }
        if let Some(vectors) = vectors {
            let mut vector_map = HashMap::with_capacity(vectors.len());
            for sv in vectors {
                vector_map.insert(sv.sector, sv.vector.clone());
            }
            self.vectors
                .write()
                .map_err(|_| Self::poisoned())?
                .insert(record.id.clone(), vector_map);
        }
        memories.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn update_strength_and_access(
        &self,
        id: &str,
        new_strength: f64,
        accessed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut memories = self.memories.write().map_err(|_| Self::poisoned())?;
        let record = memories
            .get_mut(id)
            .ok_or_else(|| EngramError::MemoryNotFound(id.to_string()))?;
        record.base_strength = new_strength;
        record.last_accessed_at = accessed_at;
        record.access_count += 1;
        Ok(())
    }

    fn delete_memory(&self, id: &str) -> Result<bool> {
        let mut memories = self.memories.write().map_err(|_| Self::poisoned())?;
        let existed = memories.remove(id).is_some();
        if existed {
            self.vectors.write().map_err(|_| Self::poisoned())?.remove(id);
            let mut edges = self.edges.write().map_err(|_| Self::poisoned())?;
            edges.remove(id);
            for outgoing in edges.values_mut() {
                outgoing.retain(|e| e.to_id != id);
            }
        }
        Ok(existed)
    }

    fn ann_search(
        &self,
        sector: Sector,
        query: &[f32],
        k: usize,
        filter: &AnnFilter,
    ) -> Result<Vec<(String, f32)>> {
        vecmath::validate(query)?;
        let memories = self.memories.read().map_err(|_| Self::poisoned())?;
        let vectors = self.vectors.read().map_err(|_| Self::poisoned())?;

        let mut candidates: Vec<(String, Vec<f32>)> = Vec::new();
        for (id, record) in memories.iter() {
            if record.tenant_id != filter.tenant_id || !filter.matches_metadata(record) {
                continue;
            }
            if let Some(vector) = vectors.get(id).and_then(|m| m.get(&sector)) {
                candidates.push((id.clone(), vector.clone()));
            }
        }
        vecmath::topk_cosine(query, &candidates, k)
    }

    fn scan_weak(
        &self,
        threshold: f64,
        decay_config: &DecayConfig,
        now: DateTime<Utc>,
        cursor: Option<&str>,
        batch: usize,
    ) -> Result<WeakScanPage> {
        let memories = self.memories.read().map_err(|_| Self::poisoned())?;
        let mut candidates = Vec::new();
        let mut scanned = 0usize;
        let mut last_id: Option<String> = None;
        let mut more = false;

        for (id, record) in memories.iter() {
            if let Some(cursor) = cursor {
                if id.as_str() <= cursor {
                    continue;
                }
            }
            if scanned == batch {
                more = true;
                break;
            }
            scanned += 1;
            last_id = Some(id.clone());
            if decay::effective_strength(record, decay_config, now) < threshold {
                candidates.push(record.clone());
            }
        }

        Ok(WeakScanPage {
            candidates,
            next_cursor: if more { last_id } else { None },
        })
    }

    fn upsert_edge(
        &self,
        from: &str,
        to: &str,
        weight: f64,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        if from == to {
            return Err(EngramError::InvalidInput {
                field: "edge".to_string(),
                reason: "self-loops are forbidden".to_string(),
            });
        }
        let mut edges = self.edges.write().map_err(|_| Self::poisoned())?;
        let outgoing = edges.entry(from.to_string()).or_default();
        if let Some(existing) = outgoing.iter_mut().find(|e| e.to_id == to) {
            existing.weight = weight;
        } else {
            outgoing.push(WaypointEdge {
                from_id: from.to_string(),
                to_id: to.to_string(),
                weight,
                created_at,
            });
        }
        Ok(())
    }

    fn remove_edge(&self, from: &str, to: &str) -> Result<()> {
        let mut edges = self.edges.write().map_err(|_| Self::poisoned())?;
        if let Some(outgoing) = edges.get_mut(from) {
            outgoing.retain(|e| e.to_id != to);
        }
        Ok(())
    }

    fn neighbors(&self, id: &str) -> Result<Vec<WaypointEdge>> {
        let edges = self.edges.read().map_err(|_| Self::poisoned())?;
        let mut outgoing = edges.get(id).cloned().unwrap_or_default();
        outgoing.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.to_id.cmp(&b.to_id))
        });
        Ok(outgoing)
    }

    fn repair_candidates(&self, min_degree: usize, weight_floor: f64) -> Result<Vec<String>> {
        let memories = self.memories.read().map_err(|_| Self::poisoned())?;
        let edges = self.edges.read().map_err(|_| Self::poisoned())?;
        let mut out = Vec::new();
        for id in memories.keys() {
            let outgoing = edges.get(id).map(Vec::as_slice).unwrap_or(&[]);
            let degree = outgoing.len();
            let weak = outgoing.iter().any(|e| e.weight < weight_floor);
            if degree < min_degree || weak {
                out.push(id.clone());
            }
        }
        Ok(out)
    }

    fn append_reinforcement(&self, event: &ReinforcementEvent) -> Result<()> {
        self.reinforcements
            .write()
            .map_err(|_| Self::poisoned())?
            .push(event.clone());
        Ok(())
    }

    fn append_pruning(&self, record: &PruningRecord) -> Result<()> {
        self.prunings
            .write()
            .map_err(|_| Self::poisoned())?
            .push(record.clone());
        Ok(())
    }

    fn reinforcement_log(&self, memory_id: &str) -> Result<Vec<ReinforcementEvent>> {
        Ok(self
            .reinforcements
            .read()
            .map_err(|_| Self::poisoned())?
            .iter()
            .filter(|e| e.memory_id == memory_id)
            .cloned()
            .collect())
    }

    fn compact_reinforcements(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut log = self.reinforcements.write().map_err(|_| Self::poisoned())?;
        let before = log.len();
        log.retain(|e| e.timestamp >= older_than);
        Ok((before - log.len()) as u64)
    }

    fn search_metadata(
        &self,
        tenant_id: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<MemoryRecord>> {
        let memories = self.memories.read().map_err(|_| Self::poisoned())?;
        let mut hits: Vec<MemoryRecord> = memories
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| filters.sector.is_none_or(|s| r.primary_sector == s))
            .filter(|r| filters.created_after.is_none_or(|t| r.created_at >= t))
            .filter(|r| filters.created_before.is_none_or(|t| r.created_at <= t))
            .filter(|r| filters.tags.iter().all(|(k, v)| r.metadata.get(k) == Some(v)))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filters.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    fn stats(
        &self,
        tenant_id: &str,
        decay_config: &DecayConfig,
        now: DateTime<Utc>,
    ) -> Result<MemoryStats> {
        let memories = self.memories.read().map_err(|_| Self::poisoned())?;
        let edges = self.edges.read().map_err(|_| Self::poisoned())?;

        let mut by_sector: HashMap<Sector, i64> = HashMap::new();
        let mut total = 0i64;
        let mut strength_sum = 0.0;
        for record in memories.values().filter(|r| r.tenant_id == tenant_id) {
            total += 1;
            *by_sector.entry(record.primary_sector).or_insert(0) += 1;
            strength_sum += decay::effective_strength(record, decay_config, now);
        }

        let edge_count = memories
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| edges.get(&r.id).map(Vec::len).unwrap_or(0) as i64)
            .sum();

        let tenant_ids: std::collections::HashSet<&String> = memories
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| &r.id)
            .collect();
        let reinforcement_events = self
            .reinforcements
            .read()
            .map_err(|_| Self::poisoned())?
            .iter()
            .filter(|e| tenant_ids.contains(&e.memory_id))
            .count() as i64;
        let pruning_records = self
            .prunings
            .read()
            .map_err(|_| Self::poisoned())?
            .iter()
            .filter(|p| tenant_ids.contains(&p.memory_id))
            .count() as i64;

        Ok(MemoryStats {
            total_memories: total,
            by_sector,
            avg_effective_strength: if total > 0 {
                strength_sum / total as f64
            } else {
                0.0
            },
            edge_count,
            reinforcement_events,
            pruning_records,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
