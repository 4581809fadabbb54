//! Database Migrations
//!
//! Schema migration definitions for the SQLite backend.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: memories, sector vectors, waypoint edges, logs",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Reinforcement log trace ids for per-call dedup auditing",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);
INSERT INTO schema_version (version, applied_at)
SELECT 0, datetime('now')
WHERE NOT EXISTS (SELECT 1 FROM schema_version);

CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    user_id TEXT,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    primary_sector TEXT NOT NULL,
    base_strength REAL NOT NULL,
    importance REAL NOT NULL DEFAULT 0.5,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_memories_tenant_created ON memories(tenant_id, created_at);

-- One vector per (memory, sector); blobs are little-endian f32
CREATE TABLE IF NOT EXISTS sector_vectors (
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    sector TEXT NOT NULL,
    vector BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    PRIMARY KEY (memory_id, sector)
);

CREATE INDEX IF NOT EXISTS idx_sector_vectors_sector ON sector_vectors(sector);

-- Undirected edges stored as two directed rows
CREATE TABLE IF NOT EXISTS waypoint_edges (
    from_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    to_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    weight REAL NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (from_id, to_id),
    CHECK (from_id != to_id)
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON waypoint_edges(from_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON waypoint_edges(to_id);

-- Append-only; rows outlive the memory they reference
CREATE TABLE IF NOT EXISTS reinforcement_events (
    memory_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    kind TEXT NOT NULL,
    boost REAL NOT NULL,
    strength_before REAL NOT NULL,
    strength_after REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reinforcement_memory_ts
    ON reinforcement_events(memory_id, timestamp);

CREATE TABLE IF NOT EXISTS pruning_records (
    memory_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    reason TEXT NOT NULL,
    strength_at_prune REAL NOT NULL
);

UPDATE schema_version SET version = 1, applied_at = datetime('now');
"#;

/// V2: trace ids on reinforcement events
const MIGRATION_V2_UP: &str = r#"
ALTER TABLE reinforcement_events ADD COLUMN trace_id TEXT;

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

// ============================================================================
// TESTS
// ============================================================================
