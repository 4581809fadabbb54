//! Error taxonomy
//!
//! Lower layers return typed errors; the orchestrator is the only layer that
//! translates them into the caller-visible envelope. Raw database messages
//! never cross that boundary.

use thiserror::Error;

/// Crate-wide error type
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum EngramError {
    // ========== Validation (not retriable) ==========
    /// Malformed input with field-level detail
    #[error("Invalid input in field '{field}': {reason}")]
    InvalidInput {
        /// Which input field failed validation
        field: String,
        /// Why it failed
        reason: String,
    },
    /// Call arrived without a tenant scope
    #[error("Missing tenant scope")]
    MissingTenant,
    /// Empty or whitespace-only text
    #[error("Text is empty")]
    EmptyText,
    /// Text exceeds the configured maximum length
    #[error("Text too long: {len} chars (max {max})")]
    TextTooLong {
        /// Actual length
        len: usize,
        /// Configured maximum
        max: usize,
    },
    /// NaN, non-finite component, or dimension mismatch
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    // ========== Not found (not retriable) ==========
    /// No memory with the given id in the caller's tenant
    #[error("Memory not found: {0}")]
    MemoryNotFound(String),

    // ========== Transient dependencies (retriable) ==========
    /// Embedding model unreachable or deadline exhausted after retries
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),
    /// Backing store unreachable or failed
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),
    /// Vector index busy; retry later
    #[error("ANN index busy")]
    AnnIndexBusy,

    // ========== Resource (retriable) ==========
    /// A deadline expired before the operation completed
    #[error("Deadline exceeded after {0} ms")]
    DeadlineExceeded(u64),
    /// Concurrency pool exhausted
    #[error("Concurrency limit reached")]
    ConcurrencyLimit,

    // ========== Degraded modes ==========
    /// Three or more reasoning streams failed outright
    #[error("Reasoning degraded: {0} of 4 streams failed")]
    ReasoningDegraded(usize),

    // ========== Fatal ==========
    /// Configuration failed validation at startup
    #[error("Invalid configuration '{option}': {reason}")]
    ConfigInvalid {
        /// Which option was invalid
        option: String,
        /// Why it was rejected
        reason: String,
    },
    /// Unexpected internal failure; details go to the log, not the caller
    #[error("Unexpected internal error")]
    Internal,
}

impl EngramError {
    /// Whether a caller may retry the failed call
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            EngramError::EmbeddingUnavailable(_)
                | EngramError::PersistenceUnavailable(_)
                | EngramError::AnnIndexBusy
                | EngramError::DeadlineExceeded(_)
                | EngramError::ConcurrencyLimit
        )
    }

    /// Stable machine-readable kind for the error envelope
    pub fn kind(&self) -> &'static str {
        match self {
            EngramError::InvalidInput { .. } => "invalid_input",
            EngramError::MissingTenant => "missing_tenant",
            EngramError::EmptyText => "empty_text",
            EngramError::TextTooLong { .. } => "text_too_long",
            EngramError::InvalidVector(_) => "invalid_vector",
            EngramError::MemoryNotFound(_) => "memory_not_found",
            EngramError::EmbeddingUnavailable(_) => "embedding_unavailable",
            EngramError::PersistenceUnavailable(_) => "persistence_unavailable",
            EngramError::AnnIndexBusy => "ann_index_busy",
            EngramError::DeadlineExceeded(_) => "deadline_exceeded",
            EngramError::ConcurrencyLimit => "concurrency_limit",
            EngramError::ReasoningDegraded(_) => "reasoning_degraded",
            EngramError::ConfigInvalid { .. } => "config_invalid",
            EngramError::Internal => "internal",
        }
    }
}

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, EngramError>;

/// Non-fatal consistency warnings attached to responses
///
/// Graph maintenance is best-effort: a failed edge insert never invalidates
/// the primary operation. The repair pass resolves these later.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum Warning {
    /// Waypoint edge creation failed for a memory
    GraphInsertFailed {
        /// Memory whose edges could not be created
        memory_id: String,
        /// Short diagnostic
        detail: String,
    },
    /// A node transiently exceeded the degree cap during rebalancing
    EdgeCapExceededTransiently {
        /// Affected node
        memory_id: String,
    },
    /// One sector's ANN search failed; results use the remaining sectors
    PartialRetrieval {
        /// Sector that failed
        sector: String,
    },
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(EngramError::EmbeddingUnavailable("down".into()).is_retriable());
        assert!(EngramError::DeadlineExceeded(500).is_retriable());
        assert!(EngramError::AnnIndexBusy.is_retriable());
        assert!(!EngramError::EmptyText.is_retriable());
        assert!(!EngramError::MemoryNotFound("x".into()).is_retriable());
        assert!(
            !EngramError::ConfigInvalid {
                option: "scoreWeights".into(),
                reason: "must sum to 1.0".into()
            }
            .is_retriable()
        );
    }

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(EngramError::MissingTenant.kind(), "missing_tenant");
        assert_eq!(
            EngramError::TextTooLong { len: 10, max: 5 }.kind(),
            "text_too_long"
        );
    }

    #[test]
    fn test_warning_serializes_with_tag() {
        let w = Warning::GraphInsertFailed {
            memory_id: "m-1".into(),
            detail: "store busy".into(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "graphInsertFailed");
        assert_eq!(json["memoryId"], "m-1");
    }
}
