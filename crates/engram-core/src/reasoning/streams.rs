//! The four reasoning streams
//!
//! Each stream owns its state and talks to the coordinator exclusively
//! through its event channel; shared insights arrive through a dedicated
//! inbox drained at checkpoints. No mutable state crosses stream boundaries.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::reasoning::{Claim, ReasoningInput, SharedInsight, StreamEvent, StreamKind};

/// Similarity above which a memory counts as strong support
const SUPPORT_FLOOR: f64 = 0.5;

/// Similarity above which a memory is a close precedent worth broadcasting
const PRECEDENT_FLOOR: f64 = 0.8;

/// How long a checkpoint parks the stream so the coordinator can fan out
/// pending must-share insights before work resumes
const CHECKPOINT_PARK: std::time::Duration = std::time::Duration::from_millis(2);

// ============================================================================
// STREAM CONTEXT
// ============================================================================

/// A stream's connection to the coordinator
pub struct StreamContext {
    kind: StreamKind,
    events: mpsc::Sender<StreamEvent>,
    inbox: mpsc::Receiver<SharedInsight>,
}

impl StreamContext {
    /// Create a context for one stream
    pub fn new(
        kind: StreamKind,
        events: mpsc::Sender<StreamEvent>,
        inbox: mpsc::Receiver<SharedInsight>,
    ) -> Self {
        Self {
            kind,
            events,
            inbox,
        }
    }

    /// Emit a progress checkpoint and collect any broadcast insights
    ///
    /// The stream parks for a moment so the coordinator can deliver
    /// insights emitted by the other streams before this one resumes.
    pub async fn checkpoint(&mut self, percent: u8) -> Vec<SharedInsight> {
        let _ = self
            .events
            .send(StreamEvent::Progress {
                kind: self.kind,
                percent,
            })
            .await;
        tokio::time::sleep(CHECKPOINT_PARK).await;
        let mut insights = Vec::new();
        while let Ok(insight) = self.inbox.try_recv() {
            if insight.from != self.kind {
                insights.push(insight);
            }
        }
        insights
    }

    /// Emit a claim
    pub async fn claim(&self, text: impl Into<String>, confidence: f64) {
        let _ = self
            .events
            .send(StreamEvent::Claim {
                kind: self.kind,
                claim: Claim {
                    text: text.into(),
                    confidence,
                    must_share: false,
                },
            })
            .await;
    }

    /// Emit a must-share insight; the coordinator rebroadcasts it
    pub async fn insight(&self, text: impl Into<String>, confidence: f64) {
        let _ = self
            .events
            .send(StreamEvent::Claim {
                kind: self.kind,
                claim: Claim {
                    text: text.into(),
                    confidence,
                    must_share: true,
                },
            })
            .await;
    }

    /// Emit supporting evidence
    pub async fn evidence(&self, text: impl Into<String>) {
        let _ = self
            .events
            .send(StreamEvent::Evidence {
                kind: self.kind,
                text: text.into(),
            })
            .await;
    }
}

// ============================================================================
// STREAM TRAIT
// ============================================================================

/// One reasoning perspective
#[async_trait]
pub trait ReasoningStream: Send + Sync {
    /// Which perspective this stream implements
    fn kind(&self) -> StreamKind;

    /// Work the problem, emitting claims and checkpoints through `ctx`
    ///
    /// Returns the stream's final confidence. Cancellation is cooperative:
    /// the future is dropped at the per-stream deadline, and everything
    /// already emitted still counts.
    async fn run(&self, input: &ReasoningInput, ctx: &mut StreamContext) -> Result<f64>;
}

// shared helpers

fn key_terms(problem: &str) -> Vec<&str> {
    problem
        .split_whitespace()
        .filter(|w| w.len() > 4)
        .take(4)
        .collect()
}

fn supported(input: &ReasoningInput) -> bool {
    input.memories.iter().any(|m| m.similarity >= SUPPORT_FLOOR)
}

// ============================================================================
// ANALYTICAL
// ============================================================================

/// Structure and evidence: decomposes the problem and grounds it in memory
#[derive(Debug, Default)]
pub struct AnalyticalStream;

#[async_trait]
impl ReasoningStream for AnalyticalStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Analytical
    }

    async fn run(&self, input: &ReasoningInput, ctx: &mut StreamContext) -> Result<f64> {
        let components: Vec<&str> = input
            .problem
            .split(['.', ';', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        ctx.checkpoint(25).await;

        ctx.claim(
            format!(
                "the problem decomposes into {} addressable component(s)",
                components.len()
            ),
            0.7,
        )
        .await;

        for memory in input.memories.iter().filter(|m| m.similarity >= SUPPORT_FLOOR) {
            ctx.evidence(format!("memory {}: {}", memory.id, memory.content))
                .await;
        }
        ctx.checkpoint(50).await;

        let mut confidence: f64 = 0.55;
        if supported(input) {
            ctx.claim("relevant prior experience supports the approach", 0.75)
                .await;
            confidence += 0.15;
        }
        if let Some(best) = input
            .memories
            .iter()
            .find(|m| m.similarity >= PRECEDENT_FLOOR)
        {
            ctx.insight(
                format!("a close precedent exists in memory: {}", best.content),
                0.85,
            )
            .await;
            confidence += 0.1;
        }
        ctx.checkpoint(75).await;

        Ok(confidence.min(1.0))
    }
}

// ============================================================================
// CREATIVE
// ============================================================================

/// Reframings: approaches the problem from unexpected directions
#[derive(Debug, Default)]
pub struct CreativeStream;

#[async_trait]
impl ReasoningStream for CreativeStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Creative
    }

    async fn run(&self, input: &ReasoningInput, ctx: &mut StreamContext) -> Result<f64> {
        let terms = key_terms(&input.problem);
        ctx.checkpoint(25).await;

        if let [first, .., last] = terms.as_slice() {
            ctx.claim(
                format!("reframing '{first}' in terms of '{last}' opens an alternative path"),
                0.5,
            )
            .await;
        }
        let insights = ctx.checkpoint(50).await;

        // Build on another stream's precedent if one was shared
        if let Some(shared) = insights.first() {
            ctx.claim(
                format!(
                    "combining the {} stream's insight with an inverted framing suggests a hybrid approach",
                    shared.from
                ),
                0.55,
            )
            .await;
        } else {
            ctx.claim("inverting the problem constraints yields a second candidate approach", 0.45)
                .await;
        }
        ctx.checkpoint(75).await;

        Ok(0.5)
    }
}

// ============================================================================
// CRITICAL
// ============================================================================

/// Assumptions and risks: attacks the problem statement and the evidence
#[derive(Debug, Default)]
pub struct CriticalStream;

#[async_trait]
impl ReasoningStream for CriticalStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Critical
    }

    async fn run(&self, input: &ReasoningInput, ctx: &mut StreamContext) -> Result<f64> {
        ctx.checkpoint(25).await;

        let has_specifics = input.problem.chars().any(|c| c.is_ascii_digit())
            || input.context.is_some();
        if !has_specifics {
            ctx.claim(
                "the problem statement leaves key constraints unspecified",
                0.65,
            )
            .await;
        }
        ctx.checkpoint(50).await;

        if input.memories.is_empty() {
            ctx.claim("no prior experience covers this problem; conclusions are untested", 0.6)
                .await;
        } else if !supported(input) {
            ctx.claim(
                "retrieved memories are only weakly related; their support is circumstantial",
                0.6,
            )
            .await;
        } else {
            ctx.claim("relevant prior experience supports the approach", 0.6)
                .await;
        }
        ctx.checkpoint(75).await;

        Ok(0.6)
    }
}

// ============================================================================
// SYNTHETIC
// ============================================================================

/// Integration: folds the other perspectives into one direction
#[derive(Debug, Default)]
pub struct SyntheticStream;

#[async_trait]
impl ReasoningStream for SyntheticStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Synthetic
    }

    async fn run(&self, input: &ReasoningInput, ctx: &mut StreamContext) -> Result<f64> {
        let mut gathered: Vec<SharedInsight> = Vec::new();
        gathered.extend(ctx.checkpoint(25).await);

        if supported(input) {
            ctx.claim("relevant prior experience supports the approach", 0.7)
                .await;
        }
        gathered.extend(ctx.checkpoint(50).await);

        // Integration happens last, after the final checkpoint, so insights
        // broadcast by the other streams can still shape the plan.
        gathered.extend(ctx.checkpoint(75).await);

        let terms = key_terms(&input.problem).join(", ");
        if gathered.is_empty() {
            ctx.claim(format!("an integrated plan should address: {terms}"), 0.6)
                .await;
        } else {
            ctx.claim(
                format!(
                    "an integrated plan should address: {terms}, anchored on the shared precedent"
                ),
                0.7,
            )
            .await;
        }

        Ok(if gathered.is_empty() { 0.6 } else { 0.7 })
    }
}

// ============================================================================
// TESTS
// ============================================================================
