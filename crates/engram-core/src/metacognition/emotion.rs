//! Emotion Analyzer
//!
//! Scores text on the Circumplex dimensions: valence (unpleasant to
//! pleasant), arousal (calm to activated), dominance (controlled to in
//! control), each in [-1, 1]. Lexicon-based with a negation window and
//! urgency markers, so reads are reproducible.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Negation window: lexicon hits within this many words of a negator flip
const NEGATION_WINDOW: usize = 3;

// ============================================================================
// SCORES
// ============================================================================

/// A Circumplex read of one text
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionScores {
    /// Unpleasant (-1) to pleasant (+1)
    pub valence: f64,
    /// Calm (-1) to activated (+1)
    pub arousal: f64,
    /// Being controlled (-1) to in control (+1)
    pub dominance: f64,
    /// Lexicon coverage in [0, 1]; low coverage means a weak read
    pub confidence: f64,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Lexicon-based valence/arousal/dominance scorer
pub struct EmotionAnalyzer {
    /// word -> (valence, arousal, dominance)
    lexicon: HashMap<&'static str, (f64, f64, f64)>,
    urgency_markers: &'static [&'static str],
}

impl Default for EmotionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionAnalyzer {
    /// Create an analyzer with the built-in lexicon
    pub fn new() -> Self {
        Self {
            lexicon: Self::build_lexicon(),
            urgency_markers: &[
                "immediately",
                "urgent",
                "asap",
                "right now",
                "emergency",
                "critical outage",
                "deadline",
            ],
        }
    }

    /// Score a text on the three Circumplex dimensions
    pub fn analyze(&self, text: &str) -> EmotionScores {
        let words: Vec<String> = text
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect();

        let negators = [
            "not", "no", "never", "don't", "doesn't", "didn't", "won't", "can't", "couldn't",
            "without", "hardly",
        ];

        let mut valence_sum = 0.0;
        let mut arousal_sum = 0.0;
        let mut dominance_sum = 0.0;
        let mut hits = 0usize;

        for (i, word) in words.iter().enumerate() {
            let Some(&(valence, arousal, dominance)) = self.lexicon.get(word.as_str()) else {
                continue;
            };
            let negated = (i.saturating_sub(NEGATION_WINDOW)..i)
                .any(|j| negators.contains(&words[j].as_str()));
            if negated {
                valence_sum += -valence * 0.7;
                dominance_sum += -dominance * 0.7;
            } else {
                valence_sum += valence;
                dominance_sum += dominance;
            }
            arousal_sum += arousal;
            hits += 1;
        }

        let lower = text.to_lowercase();
        let urgency = self
            .urgency_markers
            .iter()
            .filter(|m| lower.contains(*m))
            .count() as f64
            * 0.3;
        let exclamations = text.matches('!').count() as f64 * 0.1;

        let (valence, arousal, dominance) = if hits > 0 {
            let n = hits as f64;
            (
                (valence_sum / n).clamp(-1.0, 1.0),
                (arousal_sum / n + urgency + exclamations).clamp(-1.0, 1.0),
                (dominance_sum / n).clamp(-1.0, 1.0),
            )
        } else {
            (0.0, (urgency + exclamations - 0.2).clamp(-1.0, 1.0), 0.0)
        };

        let confidence = if words.is_empty() {
            0.0
        } else {
            ((hits as f64 / words.len() as f64).min(1.0) * 0.6
                + if urgency > 0.0 { 0.2 } else { 0.0 }
                + if hits > 3 { 0.2 } else { 0.0 })
            .min(1.0)
        };

        EmotionScores {
            valence,
            arousal,
            dominance,
            confidence,
        }
    }

    /// Build the VAD lexicon: word -> (valence, arousal, dominance)
    fn build_lexicon() -> HashMap<&'static str, (f64, f64, f64)> {
        let entries: &[(&str, (f64, f64, f64))] = &[
            // Positive, energized
            ("excellent", (0.9, 0.5, 0.5)),
            ("great", (0.8, 0.4, 0.4)),
            ("success", (0.8, 0.5, 0.6)),
            ("win", (0.8, 0.6, 0.7)),
            ("breakthrough", (0.9, 0.8, 0.6)),
            ("excited", (0.7, 0.8, 0.4)),
            ("thrilled", (0.9, 0.9, 0.5)),
            ("love", (0.9, 0.6, 0.3)),
            // Positive, calm
            ("stable", (0.5, -0.4, 0.5)),
            ("calm", (0.5, -0.7, 0.3)),
            ("confident", (0.6, 0.1, 0.8)),
            ("resolved", (0.6, -0.2, 0.6)),
            ("reliable", (0.6, -0.3, 0.5)),
            ("safe", (0.6, -0.5, 0.4)),
            ("clear", (0.4, -0.2, 0.4)),
            // Negative, energized
            ("angry", (-0.7, 0.8, 0.3)),
            ("furious", (-0.8, 0.9, 0.4)),
            ("panic", (-0.8, 0.9, -0.7)),
            ("crisis", (-0.7, 0.8, -0.4)),
            ("outage", (-0.7, 0.7, -0.4)),
            ("failure", (-0.7, 0.5, -0.4)),
            ("broken", (-0.6, 0.4, -0.3)),
            ("fear", (-0.7, 0.7, -0.6)),
            ("afraid", (-0.6, 0.6, -0.6)),
            ("alarmed", (-0.6, 0.8, -0.4)),
            ("frustrated", (-0.6, 0.6, -0.2)),
            ("angst", (-0.6, 0.6, -0.5)),
            // Negative, deflated
            ("sad", (-0.7, -0.4, -0.4)),
            ("hopeless", (-0.8, -0.5, -0.8)),
            ("stuck", (-0.5, -0.1, -0.6)),
            ("tired", (-0.4, -0.6, -0.3)),
            ("defeated", (-0.7, -0.3, -0.8)),
            ("overwhelmed", (-0.6, 0.5, -0.8)),
            ("helpless", (-0.7, 0.2, -0.9)),
            ("doubt", (-0.4, 0.1, -0.4)),
            // Control-flavored
            ("control", (0.2, 0.1, 0.8)),
            ("command", (0.2, 0.2, 0.8)),
            ("forced", (-0.4, 0.3, -0.7)),
            ("blocked", (-0.5, 0.3, -0.6)),
            ("empowered", (0.7, 0.4, 0.9)),
            ("trapped", (-0.7, 0.4, -0.9)),
        ];
        entries.iter().copied().collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
