//! Parallel Reasoning Coordinator
//!
//! Spawns the four streams as independent tasks, each with a dedicated
//! output channel and an insight inbox. The coordinator is the only owner of
//! the synthesis buffer; streams never share mutable state. Must-share
//! claims are rebroadcast to the other streams' inboxes, picked up at their
//! next checkpoint.
//!
//! Deadlines: each stream is cut off at `per_stream_deadline_ms` (its
//! partial claims survive, marked `timed_out`); the whole call is bounded by
//! `total_deadline_ms`. The call fails with `ReasoningDegraded` only when
//! three or more streams fail outright.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ReasoningConfig;
use crate::error::{EngramError, Result};
use crate::reasoning::streams::{
    AnalyticalStream, CreativeStream, CriticalStream, ReasoningStream, StreamContext,
    SyntheticStream,
};
use crate::reasoning::{
    synthesize, ReasoningInput, ReasoningResult, SharedInsight, StreamEvent, StreamKind,
    StreamResult,
};

// ============================================================================
// COORDINATOR
// ============================================================================

/// Runs the four reasoning streams concurrently and synthesizes the outcome
pub struct ParallelReasoningCoordinator {
    streams: Vec<Arc<dyn ReasoningStream>>,
    config: ReasoningConfig,
}

#[derive(Default)]
struct ResultBuilder {
    claims: Vec<crate::reasoning::Claim>,
    evidence: Vec<String>,
    confidence: f64,
    timed_out: bool,
    failed: bool,
    finished_at_ms: Option<u64>,
}

impl ParallelReasoningCoordinator {
    /// Coordinator over the four standard streams
    pub fn new(config: ReasoningConfig) -> Self {
        Self::with_streams(
            vec![
                Arc::new(AnalyticalStream),
                Arc::new(CreativeStream),
                Arc::new(CriticalStream),
                Arc::new(SyntheticStream),
            ],
            config,
        )
    }

    /// Coordinator over caller-supplied streams (tests inject latency here)
    pub fn with_streams(streams: Vec<Arc<dyn ReasoningStream>>, config: ReasoningConfig) -> Self {
        Self { streams, config }
    }

    /// Run one reasoning call
    pub async fn reason(&self, input: ReasoningInput) -> Result<ReasoningResult> {
        let started = std::time::Instant::now();
        let per_stream = Duration::from_millis(self.config.per_stream_deadline_ms);
        let total = Duration::from_millis(self.config.total_deadline_ms);

        let (events_tx, mut events_rx) = mpsc::channel::<StreamEvent>(256);
        let mut inboxes: Vec<(StreamKind, mpsc::Sender<SharedInsight>)> = Vec::new();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let order: Vec<StreamKind> = self.streams.iter().map(|s| s.kind()).collect();

        for stream in &self.streams {
            let kind = stream.kind();
            let (inbox_tx, inbox_rx) = mpsc::channel::<SharedInsight>(32);
            inboxes.push((kind, inbox_tx));

            let stream = stream.clone();
            let events = events_tx.clone();
            let input = input.clone();
            handles.push(tokio::spawn(async move {
                let mut ctx = StreamContext::new(kind, events.clone(), inbox_rx);
                let terminal = match tokio::time::timeout(per_stream, stream.run(&input, &mut ctx))
                    .await
                {
                    Ok(Ok(confidence)) => StreamEvent::Finished { kind, confidence },
                    Ok(Err(e)) => StreamEvent::Failed {
                        kind,
                        error: e.to_string(),
                    },
                    Err(_) => StreamEvent::TimedOut { kind },
                };
                let _ = events.send(terminal).await;
            }));
        }
        drop(events_tx);

        let mut builders: HashMap<StreamKind, ResultBuilder> = order
            .iter()
            .map(|kind| (*kind, ResultBuilder::default()))
            .collect();

        let deadline = tokio::time::sleep(total);
        tokio::pin!(deadline);
        let mut terminals = 0usize;

        while terminals < order.len() {
            tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!("total reasoning deadline expired");
                    break;
                }
                event = events_rx.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        StreamEvent::Progress { kind, percent } => {
                            tracing::debug!(stream = %kind, percent, "stream progress");
                        }
                        StreamEvent::Claim { kind, claim } => {
                            if claim.must_share {
                                for (other, inbox) in &inboxes {
                                    if *other != kind {
                                        let _ = inbox.try_send(SharedInsight {
                                            from: kind,
                                            text: claim.text.clone(),
                                        });
                                    }
                                }
                            }
                            if let Some(builder) = builders.get_mut(&kind) {
                                builder.claims.push(claim);
                            }
                        }
                        StreamEvent::Evidence { kind, text } => {
                            if let Some(builder) = builders.get_mut(&kind) {
                                builder.evidence.push(text);
                            }
                        }
                        StreamEvent::Finished { kind, confidence } => {
                            if let Some(builder) = builders.get_mut(&kind) {
                                builder.confidence = confidence.clamp(0.0, 1.0);
                                builder.finished_at_ms =
                                    Some(started.elapsed().as_millis() as u64);
                            }
                            terminals += 1;
                        }
                        StreamEvent::Failed { kind, error } => {
                            tracing::warn!(stream = %kind, error, "reasoning stream failed");
                            if let Some(builder) = builders.get_mut(&kind) {
                                builder.failed = true;
                                builder.finished_at_ms =
                                    Some(started.elapsed().as_millis() as u64);
                            }
                            terminals += 1;
                        }
                        StreamEvent::TimedOut { kind } => {
                            tracing::warn!(stream = %kind, "reasoning stream deadline expired");
                            if let Some(builder) = builders.get_mut(&kind) {
                                builder.timed_out = true;
                                builder.finished_at_ms =
                                    Some(started.elapsed().as_millis() as u64);
                            }
                            terminals += 1;
                        }
                    }
                }
            }
        }

        for handle in handles {
            handle.abort();
        }

        let mut longest_stream_ms = 0u64;
        let stream_results: Vec<StreamResult> = order
            .iter()
            .map(|kind| {
                let builder = builders.remove(kind).unwrap_or_default();
                // Streams cut off by the total deadline count as timed out
                let timed_out = builder.timed_out || builder.finished_at_ms.is_none();
                let confidence = if builder.failed {
                    0.0
                } else if timed_out && builder.confidence == 0.0 && !builder.claims.is_empty() {
                    builder.claims.iter().map(|c| c.confidence).sum::<f64>()
                        / builder.claims.len() as f64
                } else {
                    builder.confidence
                };
                longest_stream_ms = longest_stream_ms
                    .max(builder.finished_at_ms.unwrap_or(total.as_millis() as u64));
                StreamResult {
                    kind: *kind,
                    claims: builder.claims,
                    evidence: builder.evidence,
                    confidence,
                    timed_out,
                    failed: builder.failed,
                }
            })
            .collect();

        let failed = stream_results.iter().filter(|r| r.failed).count();
        if failed >= 3 {
            return Err(EngramError::ReasoningDegraded(failed));
        }

        let mut result = synthesize(&input.problem, stream_results);
        result.degraded = failed > 0;
        result.duration_ms = started.elapsed().as_millis() as u64;
        result.coordination_overhead_ms = result.duration_ms.saturating_sub(longest_stream_ms);
        Ok(result)
    }
}

// ============================================================================
// TESTS
// ============================================================================
