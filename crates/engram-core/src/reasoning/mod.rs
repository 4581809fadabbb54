//! Parallel Reasoning
//!
//! Four concurrent streams (Analytical, Creative, Critical, Synthetic) work
//! the same problem, checkpoint their progress, share must-share insights
//! through the coordinator, and a synthesis step merges their claims while
//! preserving dissent.

mod coordinator;
mod streams;
mod synthesis;

pub use coordinator::ParallelReasoningCoordinator;
pub use streams::{
    AnalyticalStream, CreativeStream, CriticalStream, ReasoningStream, StreamContext,
    SyntheticStream,
};
pub use synthesis::synthesize;

use serde::{Deserialize, Serialize};

use crate::memory::RetrievedMemory;

// ============================================================================
// STREAM IDENTITY
// ============================================================================

/// The four reasoning perspectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Structure, decomposition, evidence
    Analytical,
    /// Reframings and unconventional angles
    Creative,
    /// Assumptions, risks, missing information
    Critical,
    /// Integration across perspectives
    Synthetic,
}

impl StreamKind {
    /// All four kinds, in canonical order
    pub fn all() -> [StreamKind; 4] {
        [
            StreamKind::Analytical,
            StreamKind::Creative,
            StreamKind::Critical,
            StreamKind::Synthetic,
        ]
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Analytical => "analytical",
            StreamKind::Creative => "creative",
            StreamKind::Critical => "critical",
            StreamKind::Synthetic => "synthetic",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CLAIMS & EVENTS
// ============================================================================

/// One claim produced by a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// The claim text
    pub text: String,
    /// Stream-local confidence in [0, 1]
    pub confidence: f64,
    /// Broadcast to the other streams at the next checkpoint
    pub must_share: bool,
}

/// An insight broadcast from one stream to the others
#[derive(Debug, Clone)]
pub struct SharedInsight {
    /// Originating stream
    pub from: StreamKind,
    /// Insight text
    pub text: String,
}

/// Events a stream emits while running
///
/// Claims flow through events rather than the stream's return value so a
/// timed-out stream still contributes everything it produced.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Progress checkpoint (roughly 25/50/75%)
    Progress {
        /// Emitting stream
        kind: StreamKind,
        /// Percent of the stream's own work
        percent: u8,
    },
    /// A claim, streamed as soon as it is produced
    Claim {
        /// Emitting stream
        kind: StreamKind,
        /// The claim
        claim: Claim,
    },
    /// Supporting evidence text
    Evidence {
        /// Emitting stream
        kind: StreamKind,
        /// Evidence text
        text: String,
    },
    /// Clean completion with a final stream confidence
    Finished {
        /// Emitting stream
        kind: StreamKind,
        /// Stream confidence in [0, 1]
        confidence: f64,
    },
    /// The stream failed outright
    Failed {
        /// Emitting stream
        kind: StreamKind,
        /// Short diagnostic
        error: String,
    },
    /// The per-stream deadline expired
    TimedOut {
        /// Emitting stream
        kind: StreamKind,
    },
}

// ============================================================================
// INPUT & RESULTS
// ============================================================================

/// Shared input handed to every stream
#[derive(Debug, Clone, Default)]
pub struct ReasoningInput {
    /// The problem text
    pub problem: String,
    /// Optional caller-supplied context
    pub context: Option<String>,
    /// Memories primed by the retrieval engine
    pub memories: Vec<RetrievedMemory>,
    /// Composed prompt skeleton from the framework selector
    pub framework_guidance: Option<String>,
}

/// Per-stream outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResult {
    /// Which stream
    pub kind: StreamKind,
    /// Claims produced (possibly partial on timeout)
    pub claims: Vec<Claim>,
    /// Evidence collected
    pub evidence: Vec<String>,
    /// Stream confidence in [0, 1]
    pub confidence: f64,
    /// Whether the per-stream deadline expired
    pub timed_out: bool,
    /// Whether the stream failed outright
    pub failed: bool,
}

/// A claim agreed on by two or more streams
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedClaim {
    /// Claim text (first occurrence's wording)
    pub text: String,
    /// Max confidence across supporting streams
    pub confidence: f64,
    /// Streams that produced it
    pub streams: Vec<StreamKind>,
}

/// A claim produced by exactly one stream; never silently discarded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DissentingClaim {
    /// Claim text
    pub text: String,
    /// The lone stream behind it
    pub stream: StreamKind,
    /// That stream's confidence in it
    pub confidence: f64,
}

/// The synthesized output of one reasoning call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningResult {
    /// The problem reasoned about
    pub problem: String,
    /// Claims appearing in two or more streams
    pub merged_claims: Vec<MergedClaim>,
    /// Claims appearing in exactly one stream
    pub dissenting_claims: Vec<DissentingClaim>,
    /// Short synthesized conclusion
    pub final_recommendation: String,
    /// Aggregate confidence before metacognitive calibration
    pub confidence: f64,
    /// True when at least one stream failed (but fewer than three)
    pub degraded: bool,
    /// Per-stream outcomes, in canonical order
    pub stream_results: Vec<StreamResult>,
    /// Time spent coordinating rather than reasoning
    pub coordination_overhead_ms: u64,
    /// Total wall-clock of the call
    pub duration_ms: u64,
}
