//! Bias Detector
//!
//! Eight rule sets over text patterns and claim structure. Each detector
//! reports a likelihood in [0, 1] and the text spans that triggered it. Rule
//! sets are deliberately explicit: auditable phrase lists, not a model.

use serde::{Deserialize, Serialize};

use crate::reasoning::ReasoningResult;

// ============================================================================
// BIAS KINDS
// ============================================================================

/// The eight detected bias classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BiasKind {
    /// Favoring evidence that agrees with the existing view
    Confirmation,
    /// Over-weighting the first number or idea encountered
    Anchoring,
    /// Treating easily recalled examples as representative
    Availability,
    /// Judging by resemblance to a stereotype
    Representativeness,
    /// Continuing because of already-spent effort
    SunkCost,
    /// Letting the phrasing of options drive the choice
    Framing,
    /// Adopting a view because many others hold it
    Bandwagon,
    /// Crediting character over circumstance
    Attribution,
}

impl BiasKind {
    /// All bias classes
    pub fn all() -> [BiasKind; 8] {
        [
            BiasKind::Confirmation,
            BiasKind::Anchoring,
            BiasKind::Availability,
            BiasKind::Representativeness,
            BiasKind::SunkCost,
            BiasKind::Framing,
            BiasKind::Bandwagon,
            BiasKind::Attribution,
        ]
    }

    /// Phrases whose presence suggests this bias
    fn patterns(&self) -> &'static [&'static str] {
        match self {
            BiasKind::Confirmation => &[
                "as expected",
                "confirms",
                "proves what we",
                "just as predicted",
                "obviously",
                "clearly shows",
                "consistent with our view",
            ],
            BiasKind::Anchoring => &[
                "initial estimate",
                "first figure",
                "starting from the original",
                "the first number",
                "as originally quoted",
                "baseline of",
            ],
            BiasKind::Availability => &[
                "recently saw",
                "just last week",
                "comes to mind",
                "everyone remembers",
                "the famous case",
                "happened to me",
            ],
            BiasKind::Representativeness => &[
                "typical case",
                "looks like a",
                "classic example",
                "just like the last",
                "fits the pattern",
                "exactly the kind of",
            ],
            BiasKind::SunkCost => &[
                "already invested",
                "come this far",
                "wasted if we stop",
                "spent so much",
                "too far in",
                "after all the effort",
            ],
            BiasKind::Framing => &[
                "90% success",
                "only a small loss",
                "framed as",
                "if you look at it as",
                "put another way it sounds",
                "sounds better when",
            ],
            BiasKind::Bandwagon => &[
                "everyone is doing",
                "industry standard because popular",
                "most teams",
                "everybody agrees",
                "widely adopted so",
                "nobody else does",
            ],
            BiasKind::Attribution => &[
                "because they are lazy",
                "just incompetent",
                "that team always",
                "typical of them",
                "they never cared",
                "bad developers",
            ],
        }
    }
}

impl std::fmt::Display for BiasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BiasKind::Confirmation => "confirmation",
            BiasKind::Anchoring => "anchoring",
            BiasKind::Availability => "availability",
            BiasKind::Representativeness => "representativeness",
            BiasKind::SunkCost => "sunk-cost",
            BiasKind::Framing => "framing",
            BiasKind::Bandwagon => "bandwagon",
            BiasKind::Attribution => "attribution",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// FINDINGS
// ============================================================================

/// One detected bias with its evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasFinding {
    /// Which bias class
    pub kind: BiasKind,
    /// Detector likelihood in [0, 1]
    pub likelihood: f64,
    /// Text spans that triggered the detection
    pub evidence_spans: Vec<String>,
}

// ============================================================================
// DETECTOR
// ============================================================================

/// Rule-set bias scanner
#[derive(Debug, Default)]
pub struct BiasDetector;

impl BiasDetector {
    /// Create a detector
    pub fn new() -> Self {
        Self
    }

    /// Scan free text for all eight bias classes
    ///
    /// Likelihood grows with distinct pattern hits: one hit is suggestive
    /// (0.5), each further distinct hit adds 0.2 up to 0.9.
    pub fn detect(&self, text: &str) -> Vec<BiasFinding> {
        let lower = text.to_lowercase();
        let mut findings = Vec::new();

        for kind in BiasKind::all() {
            let spans: Vec<String> = kind
                .patterns()
                .iter()
                .filter(|p| lower.contains(*p))
                .map(|p| Self::span_around(&lower, p))
                .collect();
            if spans.is_empty() {
                continue;
            }
            let likelihood = (0.5 + 0.2 * (spans.len() as f64 - 1.0)).min(0.9);
            findings.push(BiasFinding {
                kind,
                likelihood,
                evidence_spans: spans,
            });
        }

        findings.sort_by(|a, b| {
            b.likelihood
                .partial_cmp(&a.likelihood)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        findings
    }

    /// Scan a reasoning result: text patterns plus claim structure
    pub fn detect_in_result(&self, corpus: &str, result: &ReasoningResult) -> Vec<BiasFinding> {
        let mut findings = self.detect(corpus);

        // Structural confirmation signal: unanimous agreement with zero
        // dissent is suspicious in a four-perspective system.
        let unanimous = result.dissenting_claims.is_empty()
            && result
                .merged_claims
                .iter()
                .any(|c| c.streams.len() >= 4);
        if unanimous {
            match findings.iter_mut().find(|f| f.kind == BiasKind::Confirmation) {
                Some(existing) => {
                    existing.likelihood = (existing.likelihood + 0.2).min(0.95);
                    existing
                        .evidence_spans
                        .push("all four streams agree with zero dissent".to_string());
                }
                None => findings.push(BiasFinding {
                    kind: BiasKind::Confirmation,
                    likelihood: 0.4,
                    evidence_spans: vec![
                        "all four streams agree with zero dissent".to_string()
                    ],
                }),
            }
            findings.sort_by(|a, b| {
                b.likelihood
                    .partial_cmp(&a.likelihood)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        findings
    }

    /// A readable window around the first occurrence of a pattern
    fn span_around(lower: &str, pattern: &str) -> String {
        let Some(pos) = lower.find(pattern) else {
            return pattern.to_string();
        };
        let start = lower[..pos]
            .char_indices()
            .rev()
            .nth(30)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let end = (pos + pattern.len() + 30).min(lower.len());
        // Snap to char boundaries
        let start = (start..=pos).find(|i| lower.is_char_boundary(*i)).unwrap_or(pos);
        let end = (end..lower.len())
            .find(|i| lower.is_char_boundary(*i))
            .unwrap_or(lower.len());
        lower[start..end].trim().to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
