//! SQLite persistence
//!
//! Production backing store. Separate reader/writer connections behind
//! mutexes give interior mutability, so the store is `Send + Sync` and the
//! orchestrator can hold it as `Arc<SqliteStore>`. Vectors are stored as
//! little-endian f32 blobs; similarity search decodes and scores them with
//! exact cosine so retrieval stays deterministic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::DecayConfig;
use crate::decay;
use crate::error::{EngramError, Result};
use crate::memory::{
    MemoryRecord, MemoryStats, PruningRecord, ReinforcementEvent, ReinforcementKind,
    SearchFilters, SectorVector, WaypointEdge,
};
use crate::sector::Sector;
use crate::vecmath;

use super::{AnnFilter, PersistencePort, WeakScanPage};

// ============================================================================
// STORE
// ============================================================================

/// SQLite-backed persistence port
pub struct SqliteStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> EngramError {
    EngramError::PersistenceUnavailable(e.to_string())
}

impl SqliteStore {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    }

    /// Open (or create) a store at the given path
    ///
    /// `None` uses the platform data directory.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "engram", "core").ok_or_else(|| {
                    EngramError::PersistenceUnavailable(
                        "could not determine project directories".to_string(),
                    )
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir).map_err(|e| {
                    EngramError::PersistenceUnavailable(format!(
                        "could not create data dir: {e}"
                    ))
                })?;
                data_dir.join("engram.db")
            }
        };

        let writer = Connection::open(&path).map_err(db_err)?;
        Self::configure_connection(&writer).map_err(db_err)?;
        super::migrations::apply_migrations(&writer).map_err(db_err)?;

        let reader = Connection::open(&path).map_err(db_err)?;
        Self::configure_connection(&reader).map_err(db_err)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| EngramError::PersistenceUnavailable("writer lock poisoned".to_string()))
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| EngramError::PersistenceUnavailable("reader lock poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
        let sector_name: String = row.get("primary_sector")?;
        let metadata_json: String = row.get("metadata")?;
        Ok(MemoryRecord {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            user_id: row.get("user_id")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
            last_accessed_at: row.get("last_accessed_at")?,
            access_count: row.get("access_count")?,
            primary_sector: Sector::parse_name(&sector_name).unwrap_or_default(),
            base_strength: row.get("base_strength")?,
            importance: row.get("importance")?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        })
    }

    fn insert_vectors_tx(tx: &rusqlite::Transaction<'_>, vectors: &[SectorVector]) -> Result<()> {
        for sv in vectors {
            tx.execute(
                "INSERT OR REPLACE INTO sector_vectors (memory_id, sector, vector, dimensions)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    sv.memory_id,
                    sv.sector.as_str(),
                    vecmath::to_bytes(&sv.vector),
                    sv.vector.len() as i64
                ],
            )
            .map_err(db_err)?;
        }
        Ok(())
    }
}

impl PersistencePort for SqliteStore {
    fn insert_memory(&self, record: &MemoryRecord, vectors: &[SectorVector]) -> Result<()> {
        let mut writer = self.writer()?;
        let tx = writer.transaction().map_err(db_err)?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1)",
                params![record.id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if exists {
            return Err(EngramError::InvalidInput {
                field: "id".to_string(),
                reason: format!("memory id collision: {}", record.id),
            });
        }

        tx.execute(
            "INSERT INTO memories (id, tenant_id, user_id, content, created_at,
                                   last_accessed_at, access_count, primary_sector,
                                   base_strength, importance, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.tenant_id,
                record.user_id,
                record.content,
                record.created_at,
                record.last_accessed_at,
                record.access_count,
                record.primary_sector.as_str(),
                record.base_strength,
                record.importance,
                serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string()),
            ],
        )
        .map_err(db_err)?;

        Self::insert_vectors_tx(&tx, vectors)?;
        tx.commit().map_err(db_err)
    }

    fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let reader = self.reader()?;
        reader
            .query_row(
                "SELECT * FROM memories WHERE id = ?1",
                params![id],
                Self::row_to_record,
            )
            .optional()
            .map_err(db_err)
    }

    fn get_vector(&self, id: &str, sector: Sector) -> Result<Option<Vec<f32>>> {
        let reader = self.reader()?;
        let bytes: Option<Vec<u8>> = reader
            .query_row(
                "SELECT vector FROM sector_vectors WHERE memory_id = ?1 AND sector = ?2",
                params![id, sector.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(bytes.and_then(|b| vecmath::from_bytes(&b)))
    }

    fn update_memory(
        &self,
        record: &MemoryRecord,
        vectors: Option<&[SectorVector]>,
    ) -> Result<()> {
        let mut writer = self.writer()?;
        let tx = writer.transaction().map_err(db_err)?;

        let updated = tx
            .execute(
                "UPDATE memories SET content = ?2, last_accessed_at = ?3, access_count = ?4,
                        primary_sector = ?5, base_strength = ?6, importance = ?7, metadata = ?8
                 WHERE id = ?1",
                params![
                    record.id,
                    record.content,
                    record.last_accessed_at,
                    record.access_count,
                    record.primary_sector.as_str(),
                    record.base_strength,
                    record.importance,
                    serde_json::to_string(&record.metadata)
                        .unwrap_or_else(|_| "{}".to_string()),
                ],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(EngramError::MemoryNotFound(record.id.clone()));
        }

        if let Some(vectors) = vectors {
            tx.execute(
                "DELETE FROM sector_vectors WHERE memory_id = ?1",
                params![record.id],
            )
            .map_err(db_err)?;
            Self::insert_vectors_tx(&tx, vectors)?;
        }
        tx.commit().map_err(db_err)
    }

    fn update_strength_and_access(
        &self,
        id: &str,
        new_strength: f64,
        accessed_at: DateTime<Utc>,
    ) -> Result<()> {
        let writer = self.writer()?;
        let updated = writer
            .execute(
                "UPDATE memories
                 SET base_strength = ?2, last_accessed_at = ?3, access_count = access_count + 1
                 WHERE id = ?1",
                params![id, new_strength, accessed_at],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(EngramError::MemoryNotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_memory(&self, id: &str) -> Result<bool> {
        let writer = self.writer()?;
        // sector_vectors and waypoint_edges cascade through foreign keys
        let deleted = writer
            .execute("DELETE FROM memories WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    fn ann_search(
        &self,
        sector: Sector,
        query: &[f32],
        k: usize,
        filter: &AnnFilter,
    ) -> Result<Vec<(String, f32)>> {
        vecmath::validate(query)?;
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT m.*, sv.vector AS vec_blob
                 FROM memories m
                 JOIN sector_vectors sv ON sv.memory_id = m.id
                 WHERE sv.sector = ?1 AND m.tenant_id = ?2",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![sector.as_str(), filter.tenant_id], |row| {
                let record = Self::row_to_record(row)?;
                let blob: Vec<u8> = row.get("vec_blob")?;
                Ok((record, blob))
            })
            .map_err(db_err)?;

        let mut candidates: Vec<(String, Vec<f32>)> = Vec::new();
        for row in rows {
            let (record, blob) = row.map_err(db_err)?;
            if !filter.matches_metadata(&record) {
                continue;
            }
            if let Some(vector) = vecmath::from_bytes(&blob) {
                candidates.push((record.id, vector));
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
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT * FROM memories WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![cursor.unwrap_or(""), batch as i64],
                Self::row_to_record,
            )
            .map_err(db_err)?;

        let mut scanned = 0usize;
        let mut last_id = None;
        let mut candidates = Vec::new();
        for row in rows {
            let record = row.map_err(db_err)?;
            scanned += 1;
            last_id = Some(record.id.clone());
            if decay::effective_strength(&record, decay_config, now) < threshold {
                candidates.push(record);
            }
        }

        Ok(WeakScanPage {
            candidates,
            next_cursor: if scanned == batch { last_id } else { None },
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
        let writer = self.writer()?;
        writer
            .execute(
                "INSERT INTO waypoint_edges (from_id, to_id, weight, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(from_id, to_id) DO UPDATE SET weight = excluded.weight",
                params![from, to, weight, created_at],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn remove_edge(&self, from: &str, to: &str) -> Result<()> {
        let writer = self.writer()?;
        writer
            .execute(
                "DELETE FROM waypoint_edges WHERE from_id = ?1 AND to_id = ?2",
                params![from, to],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn neighbors(&self, id: &str) -> Result<Vec<WaypointEdge>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT from_id, to_id, weight, created_at FROM waypoint_edges
                 WHERE from_id = ?1 ORDER BY weight DESC, to_id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(WaypointEdge {
                    from_id: row.get(0)?,
                    to_id: row.get(1)?,
                    weight: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn repair_candidates(&self, min_degree: usize, weight_floor: f64) -> Result<Vec<String>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT m.id FROM memories m
                 LEFT JOIN waypoint_edges e ON e.from_id = m.id
                 GROUP BY m.id
                 HAVING COUNT(e.to_id) < ?1 OR MIN(e.weight) < ?2
                 ORDER BY m.id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![min_degree as i64, weight_floor], |row| row.get(0))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<String>>>().map_err(db_err)
    }

    fn append_reinforcement(&self, event: &ReinforcementEvent) -> Result<()> {
        let writer = self.writer()?;
        writer
            .execute(
                "INSERT INTO reinforcement_events
                 (memory_id, timestamp, kind, boost, strength_before, strength_after, trace_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.memory_id,
                    event.timestamp,
                    event.kind.as_str(),
                    event.boost,
                    event.strength_before,
                    event.strength_after,
                    event.trace_id,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn append_pruning(&self, record: &PruningRecord) -> Result<()> {
        let writer = self.writer()?;
        writer
            .execute(
                "INSERT INTO pruning_records (memory_id, timestamp, reason, strength_at_prune)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.memory_id,
                    record.timestamp,
                    record.reason,
                    record.strength_at_prune
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn reinforcement_log(&self, memory_id: &str) -> Result<Vec<ReinforcementEvent>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT memory_id, timestamp, kind, boost, strength_before, strength_after, trace_id
                 FROM reinforcement_events WHERE memory_id = ?1 ORDER BY timestamp ASC, rowid ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![memory_id], |row| {
                let kind: String = row.get(2)?;
                Ok(ReinforcementEvent {
                    memory_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    kind: ReinforcementKind::parse_name(&kind)
                        .unwrap_or(ReinforcementKind::Access),
                    boost: row.get(3)?,
                    strength_before: row.get(4)?,
                    strength_after: row.get(5)?,
                    trace_id: row.get(6)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn compact_reinforcements(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let writer = self.writer()?;
        let removed = writer
            .execute(
                "DELETE FROM reinforcement_events WHERE timestamp < ?1",
                params![older_than],
            )
            .map_err(db_err)?;
        Ok(removed as u64)
    }

    fn search_metadata(
        &self,
        tenant_id: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<MemoryRecord>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT * FROM memories WHERE tenant_id = ?1
                 ORDER BY created_at DESC, id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![tenant_id], Self::row_to_record)
            .map_err(db_err)?;

        let mut hits = Vec::new();
        for row in rows {
            let record = row.map_err(db_err)?;
            if let Some(sector) = filters.sector {
                if record.primary_sector != sector {
                    continue;
                }
            }
            if let Some(after) = filters.created_after {
                if record.created_at < after {
                    continue;
                }
            }
            if let Some(before) = filters.created_before {
                if record.created_at > before {
                    continue;
                }
            }
            if !filters
                .tags
                .iter()
                .all(|(k, v)| record.metadata.get(k) == Some(v))
            {
                continue;
            }
            hits.push(record);
            if let Some(limit) = filters.limit {
                if hits.len() == limit {
                    break;
                }
            }
        }
        Ok(hits)
    }

    fn stats(
        &self,
        tenant_id: &str,
        decay_config: &DecayConfig,
        now: DateTime<Utc>,
    ) -> Result<MemoryStats> {
        let reader = self.reader()?;

        let mut stmt = reader
            .prepare("SELECT * FROM memories WHERE tenant_id = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![tenant_id], Self::row_to_record)
            .map_err(db_err)?;

        let mut by_sector: HashMap<Sector, i64> = HashMap::new();
        let mut total = 0i64;
        let mut strength_sum = 0.0;
        for row in rows {
            let record = row.map_err(db_err)?;
            total += 1;
            *by_sector.entry(record.primary_sector).or_insert(0) += 1;
            strength_sum += decay::effective_strength(&record, decay_config, now);
        }

        let edge_count: i64 = reader
            .query_row(
                "SELECT COUNT(*) FROM waypoint_edges e
                 JOIN memories m ON m.id = e.from_id WHERE m.tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let reinforcement_events: i64 = reader
            .query_row(
                "SELECT COUNT(*) FROM reinforcement_events r
                 JOIN memories m ON m.id = r.memory_id WHERE m.tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let pruning_records: i64 = reader
            .query_row(
                "SELECT COUNT(*) FROM pruning_records p
                 JOIN memories m ON m.id = p.memory_id WHERE m.tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;

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
