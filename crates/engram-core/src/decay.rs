//! Decay & Reinforcement Engine
//!
//! Strength is never stored; it is reconstructed at read time:
//!
//! ```text
//! effective_strength(now) = max(minimum_strength,
//!                               base_strength * exp(-λ_eff * Δt_hours))
//! ```
//!
//! where `λ_eff = base_lambda * sector_multiplier(primary_sector)`.
//! Exponential decay with a floor keeps retrieval monotone and stops drift
//! to zero. Reinforcement raises `base_strength` from the decayed value and
//! refreshes the access timestamp atomically.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::DecayConfig;
use crate::error::Result;
use crate::memory::{MemoryRecord, PruningRecord, ReinforcementEvent, ReinforcementKind};
use crate::storage::PersistencePort;

// ============================================================================
// PURE DECAY MATH
// ============================================================================

/// Effective strength of a memory at `now`
pub fn effective_strength(record: &MemoryRecord, config: &DecayConfig, now: DateTime<Utc>) -> f64 {
    let lambda = config.lambda_for(record.primary_sector);
    let hours = record.hours_since_access(now);
    let decayed = record.base_strength * (-lambda * hours).exp();
    decayed.max(config.minimum_strength)
}

/// Recency component of the composite score, in [0, 1]
pub fn recency_weight(record: &MemoryRecord, now: DateTime<Utc>, halflife_days: f64) -> f64 {
    let days = record.days_since_access(now);
    (-days / halflife_days).exp()
}

/// Initial base strength at insert time
///
/// Importance acts as an initial modifier:
/// `clamp(0.5 + 0.5 * importance, minimum_strength, 1.0)`.
pub fn initial_strength(importance: f64, config: &DecayConfig) -> f64 {
    (0.5 + 0.5 * importance).clamp(config.minimum_strength, 1.0)
}

// ============================================================================
// ENGINE
// ============================================================================

/// Applies reinforcement writes and identifies pruning candidates
///
/// The engine never deletes; candidates go to the scheduler, which owns the
/// delete and the pruning log entry.
pub struct DecayEngine {
    port: Arc<dyn PersistencePort>,
    config: DecayConfig,
}

impl DecayEngine {
    /// Create an engine over a store
    pub fn new(port: Arc<dyn PersistencePort>, config: DecayConfig) -> Self {
        Self { port, config }
    }

    /// The decay configuration in force
    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Effective strength of a record at `now`
    pub fn strength(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
        effective_strength(record, &self.config, now)
    }

    /// Reinforce a memory on retrieval access
    ///
    /// Reads the decayed strength, raises base strength by the configured
    /// boost (capped at 1.0), refreshes the access timestamp, and logs the
    /// event. Returns the new base strength.
    pub fn reinforce_access(
        &self,
        record: &MemoryRecord,
        now: DateTime<Utc>,
        trace_id: &str,
    ) -> Result<f64> {
        self.reinforce(
            record,
            self.config.reinforcement_boost,
            ReinforcementKind::Access,
            now,
            Some(trace_id),
        )
    }

    /// Reinforce with a caller-supplied boost
    ///
    /// `kind` must be `Explicit` or `Importance`; the boost is clamped to
    /// [0, 1] before applying.
    pub fn reinforce_explicit(
        &self,
        record: &MemoryRecord,
        boost: f64,
        kind: ReinforcementKind,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        self.reinforce(record, boost.clamp(0.0, 1.0), kind, now, None)
    }

    fn reinforce(
        &self,
        record: &MemoryRecord,
        boost: f64,
        kind: ReinforcementKind,
        now: DateTime<Utc>,
        trace_id: Option<&str>,
    ) -> Result<f64> {
        let before = self.strength(record, now);
        let after = (before + boost).min(1.0);

        self.port.update_strength_and_access(&record.id, after, now)?;
        self.port.append_reinforcement(&ReinforcementEvent {
            memory_id: record.id.clone(),
            timestamp: now,
            kind,
            boost,
            strength_before: before,
            strength_after: after,
            trace_id: trace_id.map(str::to_string),
        })?;

        tracing::debug!(
            memory_id = %record.id,
            kind = kind.as_str(),
            before,
            after,
            "reinforced memory"
        );
        Ok(after)
    }

    /// Whether a memory is currently a pruning candidate
    ///
    /// Weak strength alone is not enough; recently accessed memories are
    /// protected for `protection_window_hours`.
    pub fn is_prunable(&self, record: &MemoryRecord, now: DateTime<Utc>) -> bool {
        let protected_until =
            record.last_accessed_at + Duration::hours(self.config.protection_window_hours);
        self.strength(record, now) < self.config.pruning_threshold && now >= protected_until
    }

    /// Build the pruning log entry for a candidate
    pub fn pruning_record(&self, record: &MemoryRecord, now: DateTime<Utc>) -> PruningRecord {
        PruningRecord {
            memory_id: record.id.clone(),
            timestamp: now,
            reason: format!(
                "effective strength below pruning threshold {}",
                self.config.pruning_threshold
            ),
            strength_at_prune: self.strength(record, now),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
