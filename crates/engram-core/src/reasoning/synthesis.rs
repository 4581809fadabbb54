//! Synthesis
//!
//! Merges the four stream results into one [`ReasoningResult`]: claims seen
//! by two or more streams are merged (confidence = max across streams),
//! claims seen by exactly one stream are preserved as dissent. Dissent is
//! never silently dropped.

use std::collections::BTreeMap;

use crate::reasoning::{
    DissentingClaim, MergedClaim, ReasoningResult, StreamKind, StreamResult,
};

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Merge stream results into a reasoning result
///
/// `degraded` and the timing fields are owned by the coordinator; this step
/// fills the claim-level fields and the recommendation.
pub fn synthesize(problem: &str, stream_results: Vec<StreamResult>) -> ReasoningResult {
    struct Group {
        text: String,
        confidence: f64,
        streams: Vec<StreamKind>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for result in &stream_results {
        for claim in &result.claims {
            let key = normalize(&claim.text);
            let group = groups.entry(key).or_insert_with(|| Group {
                text: claim.text.clone(),
                confidence: 0.0,
                streams: Vec::new(),
            });
            if claim.confidence > group.confidence {
                group.confidence = claim.confidence;
            }
            if !group.streams.contains(&result.kind) {
                group.streams.push(result.kind);
            }
        }
    }

    let mut merged_claims = Vec::new();
    let mut dissenting_claims = Vec::new();
    for group in groups.into_values() {
        if group.streams.len() >= 2 {
            merged_claims.push(MergedClaim {
                text: group.text,
                confidence: group.confidence,
                streams: group.streams,
            });
        } else {
            dissenting_claims.push(DissentingClaim {
                text: group.text,
                confidence: group.confidence,
                stream: group.streams[0],
            });
        }
    }
    merged_claims.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    dissenting_claims.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });

    let healthy: Vec<&StreamResult> = stream_results.iter().filter(|r| !r.failed).collect();
    let confidence = if healthy.is_empty() {
        0.0
    } else {
        healthy.iter().map(|r| r.confidence).sum::<f64>() / healthy.len() as f64
    };

    let final_recommendation = match (merged_claims.first(), dissenting_claims.first()) {
        (Some(top), Some(dissent)) => format!(
            "consensus: {} (held by {} streams); note the dissenting view: {}",
            top.text,
            top.streams.len(),
            dissent.text
        ),
        (Some(top), None) => format!(
            "consensus: {} (held by {} streams)",
            top.text,
            top.streams.len()
        ),
        (None, Some(dissent)) => format!(
            "no cross-stream consensus; strongest single-stream view: {}",
            dissent.text
        ),
        (None, None) => "no claims were produced within the deadline".to_string(),
    };

    ReasoningResult {
        problem: problem.to_string(),
        merged_claims,
        dissenting_claims,
        final_recommendation,
        confidence,
        degraded: false,
        stream_results,
        coordination_overhead_ms: 0,
        duration_ms: 0,
    }
}

// ============================================================================
// TESTS
// ============================================================================
