//! Engine Configuration
//!
//! Loaded once at startup, validated, then handed to each subsystem by
//! reference. There are no process-wide mutable globals; after `validate`
//! succeeds the struct is read-only.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};
use crate::sector::Sector;

// ============================================================================
// DECAY
// ============================================================================

/// Temporal decay and reinforcement parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecayConfig {
    /// Base decay rate λ (per hour)
    pub base_lambda: f64,
    /// Per-sector multiplier on λ
    pub sector_multipliers: HashMap<Sector, f64>,
    /// Boost applied on access
    pub reinforcement_boost: f64,
    /// Floor for effective strength
    pub minimum_strength: f64,
    /// Below this effective strength a memory is a pruning candidate
    pub pruning_threshold: f64,
    /// Memories accessed within this window are protected from pruning
    pub protection_window_hours: i64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        let sector_multipliers = Sector::all()
            .iter()
            .map(|s| (*s, s.default_multiplier()))
            .collect();
        Self {
            base_lambda: 0.02,
            sector_multipliers,
            reinforcement_boost: 0.3,
            minimum_strength: 0.1,
            pruning_threshold: 0.2,
            protection_window_hours: 24,
        }
    }
}

impl DecayConfig {
    /// Effective decay rate for a sector
    pub fn lambda_for(&self, sector: Sector) -> f64 {
        let multiplier = self
            .sector_multipliers
            .get(&sector)
            .copied()
            .unwrap_or_else(|| sector.default_multiplier());
        self.base_lambda * multiplier
    }
}

// ============================================================================
// GRAPH
// ============================================================================

/// Waypoint graph parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    /// Minimum similarity to create an edge
    pub edge_floor: f64,
    /// Every stabilized node keeps at least this many outgoing edges
    pub min_degree: usize,
    /// No node keeps more than this many outgoing edges
    pub max_degree: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            edge_floor: 0.5,
            min_degree: 1,
            max_degree: 3,
        }
    }
}

// ============================================================================
// SCORING & RETRIEVAL
// ============================================================================

/// The four composite-score weights; must sum to 1.0
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreWeights {
    /// Best raw sector similarity
    pub similarity: f64,
    /// Effective strength
    pub salience: f64,
    /// Recency weight
    pub recency: f64,
    /// Average incident edge weight
    pub link: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            similarity: 0.6,
            salience: 0.2,
            recency: 0.1,
            link: 0.1,
        }
    }
}

impl ScoreWeights {
    /// Sum of all four weights
    pub fn sum(&self) -> f64 {
        self.similarity + self.salience + self.recency + self.link
    }
}

/// Retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// ANN candidates per sector
    pub k_per_sector: usize,
    /// Final ranked-set size
    pub final_k: usize,
    /// Whether waypoint expansion runs by default
    pub use_graph_expansion: bool,
    /// Minimum composite score to keep a candidate
    pub min_composite_score: f64,
    /// How many top direct hits seed graph expansion
    pub expand_seeds: usize,
    /// Calibration for the recency component (days to halve)
    pub recency_halflife_days: f64,
    /// Composite score weights
    pub score_weights: ScoreWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_per_sector: 20,
            final_k: 10,
            use_graph_expansion: true,
            min_composite_score: 0.2,
            expand_seeds: 3,
            recency_halflife_days: 7.0,
            score_weights: ScoreWeights::default(),
        }
    }
}

// ============================================================================
// EMBEDDING
// ============================================================================

/// Embedding gateway tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingConfig {
    /// Inputs above this length are rejected with TextTooLong
    pub max_text_length: usize,
    /// Wall-clock budget for embedding all five sectors
    pub embedding_deadline_ms: u64,
    /// Identifier of the external model; part of the cache key
    pub model_id: String,
    /// Concurrent in-flight model calls
    pub max_concurrency: usize,
    /// LRU cache capacity (entries)
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_text_length: 8192,
            embedding_deadline_ms: 500,
            model_id: "engram-hash-v1".to_string(),
            max_concurrency: 8,
            cache_capacity: 1024,
        }
    }
}

// ============================================================================
// REASONING
// ============================================================================

/// Parallel reasoning coordinator limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReasoningConfig {
    /// Per-stream deadline
    pub per_stream_deadline_ms: u64,
    /// Total wall-clock bound
    pub total_deadline_ms: u64,
    /// Score at or above which a single framework is used
    pub single_framework_threshold: f64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            per_stream_deadline_ms: 10_000,
            total_deadline_ms: 30_000,
            single_framework_threshold: 0.6,
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Background maintenance tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Cron expression gating maintenance runs (default: daily off-peak)
    pub cron: String,
    /// Memories per batch in sweeps
    pub batch_size: usize,
    /// A job aborts cleanly after this much wall-clock time
    pub max_processing_time_ms: u64,
    /// Above this host CPU%, the job backs off between batches
    pub max_cpu_percent: f32,
    /// Above this RSS (MB), the job backs off between batches
    pub max_memory_mb: u64,
    /// Backoff sleep when throttled
    pub backoff_ms: u64,
    /// Reinforcement log entries older than this are compacted away
    pub reinforcement_retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 3 * * *".to_string(),
            batch_size: 1000,
            max_processing_time_ms: 10 * 60 * 1000,
            max_cpu_percent: 80.0,
            max_memory_mb: 1024,
            backoff_ms: 500,
            reinforcement_retention_days: 90,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// The complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Decay and reinforcement
    pub decay: DecayConfig,
    /// Waypoint graph
    pub graph: GraphConfig,
    /// Retrieval and scoring
    pub retrieval: RetrievalConfig,
    /// Embedding gateway
    pub embedding: EmbeddingConfig,
    /// Reasoning coordinator
    pub reasoning: ReasoningConfig,
    /// Background scheduler
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Load from a TOML file, falling back to defaults for absent keys
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| EngramError::ConfigInvalid {
            option: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: EngineConfig =
            toml::from_str(&raw).map_err(|e| EngramError::ConfigInvalid {
                option: path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all invariants; named error on the first violation
    pub fn validate(&self) -> Result<()> {
        fn invalid(option: &str, reason: impl Into<String>) -> EngramError {
            EngramError::ConfigInvalid {
                option: option.to_string(),
                reason: reason.into(),
            }
        }

        if self.decay.base_lambda <= 0.0 {
            return Err(invalid("decay.baseLambda", "must be > 0"));
        }
        for sector in Sector::all() {
            let m = self.decay.lambda_for(sector) / self.decay.base_lambda;
            if m <= 0.0 {
                return Err(invalid(
                    "decay.sectorMultipliers",
                    format!("multiplier for {sector} must be > 0"),
                ));
            }
        }
        if self.decay.reinforcement_boost < 0.0 {
            return Err(invalid("decay.reinforcementBoost", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.decay.minimum_strength) {
            return Err(invalid("decay.minimumStrength", "must be in [0, 1]"));
        }
        if self.decay.pruning_threshold < self.decay.minimum_strength
            || self.decay.pruning_threshold > 1.0
        {
            return Err(invalid(
                "decay.pruningThreshold",
                "must be in [minimumStrength, 1]",
            ));
        }

        if self.graph.min_degree < 1 {
            return Err(invalid("graph.minDegree", "must be >= 1"));
        }
        if self.graph.max_degree < self.graph.min_degree {
            return Err(invalid("graph.maxDegree", "must be >= minDegree"));
        }
        if !(0.0..=1.0).contains(&self.graph.edge_floor) {
            return Err(invalid("graph.edgeFloor", "must be in [0, 1]"));
        }

        let weights = self.retrieval.score_weights;
        if (weights.sum() - 1.0).abs() > 1e-9 {
            return Err(invalid(
                "retrieval.scoreWeights",
                format!("must sum to 1.0 (got {})", weights.sum()),
            ));
        }
        for (name, w) in [
            ("similarity", weights.similarity),
            ("salience", weights.salience),
            ("recency", weights.recency),
            ("link", weights.link),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(invalid(
                    "retrieval.scoreWeights",
                    format!("{name} must be in [0, 1]"),
                ));
            }
        }
        if self.retrieval.k_per_sector == 0 {
            return Err(invalid("retrieval.kPerSector", "must be >= 1"));
        }
        if self.retrieval.final_k == 0 {
            return Err(invalid("retrieval.finalK", "must be >= 1"));
        }
        if self.retrieval.recency_halflife_days <= 0.0 {
            return Err(invalid("retrieval.recencyHalflifeDays", "must be > 0"));
        }

        if self.embedding.max_text_length == 0 {
            return Err(invalid("embedding.maxTextLength", "must be >= 1"));
        }
        if self.embedding.max_concurrency == 0 {
            return Err(invalid("embedding.maxConcurrency", "must be >= 1"));
        }

        if !(0.0..=1.0).contains(&self.reasoning.single_framework_threshold) {
            return Err(invalid(
                "reasoning.singleFrameworkThreshold",
                "must be in [0, 1]",
            ));
        }
        if self.reasoning.per_stream_deadline_ms == 0 || self.reasoning.total_deadline_ms == 0 {
            return Err(invalid("reasoning", "deadlines must be > 0"));
        }

        if self.scheduler.batch_size == 0 {
            return Err(invalid("scheduler.batchSize", "must be >= 1"));
        }
        self.scheduler
            .cron
            .parse::<cron::Schedule>()
            .map_err(|e| invalid("scheduler.cron", format!("unparseable expression: {e}")))?;

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
