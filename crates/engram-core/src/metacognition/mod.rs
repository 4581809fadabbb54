//! Metacognitive Monitor
//!
//! Three probes over a finished reasoning result: a calibrated confidence,
//! a rule-based bias scan, and a Circumplex emotion read. The monitor also
//! queues `(input, predicted, observed)` tuples so the calibrator keeps
//! learning from outcomes.

mod bias;
mod confidence;
mod emotion;

pub use bias::{BiasDetector, BiasFinding, BiasKind};
pub use confidence::ConfidenceCalibrator;
pub use emotion::{EmotionAnalyzer, EmotionScores};

use serde::{Deserialize, Serialize};

use crate::reasoning::ReasoningResult;

// ============================================================================
// ASSESSMENT
// ============================================================================

/// Combined metacognitive read of one reasoning result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetacognitiveAssessment {
    /// Calibrated aggregate confidence in [0, 1]
    pub calibrated_confidence: f64,
    /// Detected biases, most likely first
    pub biases: Vec<BiasFinding>,
    /// Circumplex read of the reasoning output
    pub emotion: EmotionScores,
    /// Reasoning-quality observations (structure-level, not content-level)
    pub issues: Vec<String>,
    /// Overall quality score in [0, 1]
    pub quality: f64,
}

/// The metacognitive monitor
pub struct MetacognitiveMonitor {
    calibrator: ConfidenceCalibrator,
    bias_detector: BiasDetector,
    emotion_analyzer: EmotionAnalyzer,
}

impl Default for MetacognitiveMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetacognitiveMonitor {
    /// Create a monitor with default probes
    pub fn new() -> Self {
        Self {
            calibrator: ConfidenceCalibrator::new(),
            bias_detector: BiasDetector::new(),
            emotion_analyzer: EmotionAnalyzer::new(),
        }
    }

    /// The confidence calibrator (exposed for outcome recording)
    pub fn calibrator(&self) -> &ConfidenceCalibrator {
        &self.calibrator
    }

    /// The bias detector
    pub fn bias_detector(&self) -> &BiasDetector {
        &self.bias_detector
    }

    /// The emotion analyzer
    pub fn emotion_analyzer(&self) -> &EmotionAnalyzer {
        &self.emotion_analyzer
    }

    /// Run all three probes over a reasoning result
    pub fn assess(&self, result: &ReasoningResult) -> MetacognitiveAssessment {
        let calibrated_confidence = self.calibrator.calibrate(result.confidence);

        let mut corpus = String::new();
        for claim in &result.merged_claims {
            corpus.push_str(&claim.text);
            corpus.push('\n');
        }
        for dissent in &result.dissenting_claims {
            corpus.push_str(&dissent.text);
            corpus.push('\n');
        }
        for stream in &result.stream_results {
            for evidence in &stream.evidence {
                corpus.push_str(evidence);
                corpus.push('\n');
            }
        }

        let biases = self.bias_detector.detect_in_result(&corpus, result);
        let emotion = self.emotion_analyzer.analyze(&corpus);
        let (quality, issues) = self.appraise(result);

        // Queue the prediction for later calibration against the observed
        // outcome (record_outcome closes the loop when feedback arrives).
        self.calibrator
            .note_prediction(&result.problem, result.confidence);

        MetacognitiveAssessment {
            calibrated_confidence,
            biases,
            emotion,
            issues,
            quality,
        }
    }

    /// Structure-level appraisal of the reasoning itself
    fn appraise(&self, result: &ReasoningResult) -> (f64, Vec<String>) {
        let mut issues = Vec::new();
        let mut quality: f64 = 0.8;

        if result.merged_claims.is_empty() {
            issues.push("no claim reached cross-stream consensus".to_string());
            quality -= 0.2;
        }
        let timed_out = result.stream_results.iter().filter(|r| r.timed_out).count();
        if timed_out > 0 {
            issues.push(format!("{timed_out} stream(s) hit their deadline"));
            quality -= 0.1 * timed_out as f64;
        }
        if result.degraded {
            issues.push("a reasoning stream failed outright".to_string());
            quality -= 0.2;
        }
        let evidence_total: usize = result
            .stream_results
            .iter()
            .map(|r| r.evidence.len())
            .sum();
        if evidence_total == 0 {
            issues.push("conclusions rest on no retrieved evidence".to_string());
            quality -= 0.1;
        }
        if result.dissenting_claims.len() > result.merged_claims.len().max(1) * 3 {
            issues.push("dissent dominates consensus".to_string());
            quality -= 0.1;
        }

        (quality.clamp(0.0, 1.0), issues)
    }
}

// ============================================================================
// TESTS
// ============================================================================
