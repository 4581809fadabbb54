//! Retrieval Engine
//!
//! Query → per-sector embeddings → per-sector similarity search → fusion →
//! composite scoring → optional one-hop waypoint expansion → ranked set.
//!
//! Composite score per candidate:
//!
//! ```text
//! score = w_sim  * similarity          (best across queried sectors)
//!       + w_sal  * effective_strength  (salience)
//!       + w_rec  * recency_weight
//!       + w_link * avg_incident_edge_weight
//! ```
//!
//! Strength is computed once per memory per call, before any reinforcement
//! write; reinforcement lands only on returned memories, at most once each.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::decay::{recency_weight, DecayEngine};
use crate::embeddings::EmbeddingGateway;
use crate::error::{EngramError, Result, Warning};
use crate::memory::{MemoryRecord, RankedResults, RetrieveOptions, RetrievedMemory};
use crate::sector::Sector;
use crate::storage::{AnnFilter, PersistencePort};

// ============================================================================
// CANDIDATE ACCUMULATION
// ============================================================================

/// Per-memory accumulation across sector result lists
#[derive(Debug, Clone, Default)]
struct Candidate {
    per_sector: HashMap<Sector, f64>,
    best_similarity: f64,
    expanded: bool,
}

// ============================================================================
// ENGINE
// ============================================================================

/// The retrieval engine
pub struct RetrievalEngine {
    port: Arc<dyn PersistencePort>,
    gateway: Arc<EmbeddingGateway>,
    decay: Arc<DecayEngine>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    /// Create an engine over a store, gateway, and decay engine
    pub fn new(
        port: Arc<dyn PersistencePort>,
        gateway: Arc<EmbeddingGateway>,
        decay: Arc<DecayEngine>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            port,
            gateway,
            decay,
            config,
        }
    }

    /// Run one retrieval call
    ///
    /// `now` is the logical clock for the whole call: every strength and
    /// recency value, and the reinforcement writes, use this one instant.
    pub async fn retrieve(
        &self,
        tenant_id: &str,
        query: &str,
        opts: &RetrieveOptions,
        now: DateTime<Utc>,
    ) -> Result<RankedResults> {
        let trace_id = Uuid::new_v4().to_string();
        let sectors = if opts.sectors.is_empty() {
            Sector::all().to_vec()
        } else {
            let mut s = opts.sectors.clone();
            s.sort();
            s.dedup();
            s
        };
        let k_per_sector = opts.k_per_sector.unwrap_or(self.config.k_per_sector);
        let final_k = opts.final_k.unwrap_or(self.config.final_k);
        let expand = opts
            .use_graph_expansion
            .unwrap_or(self.config.use_graph_expansion);
        let min_score = opts
            .min_composite_score
            .unwrap_or(self.config.min_composite_score);

        let filter = AnnFilter {
            tenant_id: tenant_id.to_string(),
            tags: opts.tags.clone(),
            created_after: opts.created_after,
            created_before: opts.created_before,
        };

        let mut warnings: Vec<Warning> = Vec::new();

        // 1-2. Embed the query per sector (in parallel) and search each
        // sector. A failed sector degrades the result instead of failing the
        // call, as long as at least one sector survives.
        let embeds = {
            let futures: Vec<_> = sectors
                .iter()
                .map(|sector| self.gateway.embed(query, *sector))
                .collect();
            futures::future::join_all(futures).await
        };

        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();
        let mut live_sectors = 0usize;
        let mut last_err = None;
        for (sector, embed) in sectors.iter().zip(embeds) {
            let query_vec = match embed {
                Ok(v) => v,
                Err(e @ EngramError::EmptyText)
                | Err(e @ EngramError::TextTooLong { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(sector = %sector, error = %e, "sector embed failed");
                    warnings.push(Warning::PartialRetrieval {
                        sector: sector.as_str().to_string(),
                    });
                    last_err = Some(e);
                    continue;
                }
            };
            match self
                .port
                .ann_search(*sector, &query_vec, k_per_sector, &filter)
            {
                Ok(hits) => {
                    live_sectors += 1;
                    for (id, sim) in hits {
                        let entry = candidates.entry(id).or_default();
                        let sim = f64::from(sim);
                        entry.per_sector.insert(*sector, sim);
                        if sim > entry.best_similarity {
                            entry.best_similarity = sim;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(sector = %sector, error = %e, "sector search failed");
                    warnings.push(Warning::PartialRetrieval {
                        sector: sector.as_str().to_string(),
                    });
                    last_err = Some(e);
                }
            }
        }
        if live_sectors == 0 {
            return Err(last_err.unwrap_or(EngramError::Internal));
        }

        // 3-4. Load each candidate once, snapshot strength once, score.
        let mut scored = self.score_candidates(tenant_id, candidates, now, &filter)?;

        // 5. One-hop waypoint expansion from the strongest direct hits.
        if expand {
            scored = self.expand(tenant_id, scored, now, &filter)?;
        }

        // 6-8. Filter, order, truncate.
        scored.retain(|entry| entry.result.score >= min_score);
        scored.sort_by(|a, b| {
            b.result
                .score
                .partial_cmp(&a.result.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.record.last_accessed_at.cmp(&a.record.last_accessed_at))
                .then_with(|| a.result.id.cmp(&b.result.id))
        });
        scored.truncate(final_k);

        // 9. Reinforce every returned memory exactly once.
        for entry in &scored {
            self.decay.reinforce_access(&entry.record, now, &trace_id)?;
        }

        tracing::debug!(
            tenant_id,
            trace_id,
            returned = scored.len(),
            expanded = expand,
            "retrieval complete"
        );

        Ok(RankedResults {
            results: scored.into_iter().map(|e| e.result).collect(),
            used_graph_expansion: expand,
            trace_id,
            warnings,
        })
    }

    fn score_candidates(
        &self,
        tenant_id: &str,
        candidates: BTreeMap<String, Candidate>,
        now: DateTime<Utc>,
        filter: &AnnFilter,
    ) -> Result<Vec<ScoredEntry>> {
        let mut out = Vec::with_capacity(candidates.len());
        for (id, candidate) in candidates {
            let Some(record) = self.port.get_memory(&id)? else {
                continue; // pruned between search and load
            };
            if record.tenant_id != tenant_id || !filter.matches_metadata(&record) {
                continue;
            }
            out.push(self.score_one(record, candidate, now)?);
        }
        Ok(out)
    }

    fn score_one(
        &self,
        record: MemoryRecord,
        candidate: Candidate,
        now: DateTime<Utc>,
    ) -> Result<ScoredEntry> {
        let weights = self.config.score_weights;
        // Component values all live in [0, 1]; negative cosine contributes 0.
        let similarity = candidate.best_similarity.clamp(0.0, 1.0);
        let strength = self.decay.strength(&record, now);
        let recency = recency_weight(&record, now, self.config.recency_halflife_days);
        let link = self.avg_incident_weight(&record.id)?;

        let score = weights.similarity * similarity
            + weights.salience * strength
            + weights.recency * recency
            + weights.link * link;

        Ok(ScoredEntry {
            result: RetrievedMemory {
                id: record.id.clone(),
                content: record.content.clone(),
                score,
                similarity,
                per_sector_similarity: candidate.per_sector,
                effective_strength: strength,
                expanded: candidate.expanded,
                primary_sector: record.primary_sector,
                metadata: record.metadata.clone(),
            },
            record,
        })
    }

    fn avg_incident_weight(&self, id: &str) -> Result<f64> {
        let edges = self.port.neighbors(id)?;
        if edges.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = edges.iter().map(|e| e.weight).sum();
        Ok((sum / edges.len() as f64).clamp(0.0, 1.0))
    }

    /// Union direct hits with their one-hop neighbors
    ///
    /// An expanded hit inherits a damped similarity
    /// (`edge_weight * source_similarity`) and is scored like a direct hit.
    fn expand(
        &self,
        tenant_id: &str,
        mut scored: Vec<ScoredEntry>,
        now: DateTime<Utc>,
        filter: &AnnFilter,
    ) -> Result<Vec<ScoredEntry>> {
        let mut by_score: Vec<usize> = (0..scored.len()).collect();
        by_score.sort_by(|a, b| {
            scored[*b]
                .result
                .score
                .partial_cmp(&scored[*a].result.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| scored[*a].result.id.cmp(&scored[*b].result.id))
        });

        let seen: std::collections::HashSet<String> =
            scored.iter().map(|e| e.result.id.clone()).collect();
        let mut discovered: BTreeMap<String, Candidate> = BTreeMap::new();

        for seed_idx in by_score.into_iter().take(self.config.expand_seeds) {
            let seed = &scored[seed_idx];
            for edge in self.port.neighbors(&seed.result.id)? {
                if seen.contains(&edge.to_id) {
                    continue;
                }
                let damped = (edge.weight * seed.result.similarity).clamp(0.0, 1.0);
                let entry = discovered.entry(edge.to_id.clone()).or_default();
                entry.expanded = true;
                if damped > entry.best_similarity {
                    entry.best_similarity = damped;
                }
            }
        }

        for (id, candidate) in discovered {
            let Some(record) = self.port.get_memory(&id)? else {
                continue;
            };
            // Edges never cross tenants, but isolation is enforced again here
            if record.tenant_id != tenant_id || !filter.matches_metadata(&record) {
                continue;
            }
            scored.push(self.score_one(record, candidate, now)?);
        }
        Ok(scored)
    }
}

struct ScoredEntry {
    result: RetrievedMemory,
    record: MemoryRecord,
}

// ============================================================================
// TESTS
// ============================================================================
