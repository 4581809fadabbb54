//! Confidence Calibrator
//!
//! Maps raw stream confidences to calibrated values through a piecewise
//! linear isotonic curve fitted to historical (predicted, observed) pairs
//! with pool-adjacent-violators. Before any outcomes arrive the curve is the
//! identity, so calibration degrades gracefully to a no-op.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Minimum recorded outcomes before the curve is refitted
const MIN_SAMPLES_FOR_FIT: usize = 10;

/// Number of buckets along the prediction axis
const BUCKETS: usize = 10;

// ============================================================================
// CALIBRATOR
// ============================================================================

/// Learns a monotone map from predicted confidence to observed correctness
pub struct ConfidenceCalibrator {
    /// (predicted, observed) outcome pairs
    samples: Mutex<Vec<(f64, f64)>>,
    /// Fitted monotone knots (x ascending, y ascending)
    knots: Mutex<Vec<(f64, f64)>>,
    /// Pending predictions awaiting an observed outcome, keyed by input hash
    pending: Mutex<Vec<(u64, f64)>>,
}

impl Default for ConfidenceCalibrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfidenceCalibrator {
    /// Create a calibrator with the identity curve
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            knots: Mutex::new(vec![(0.0, 0.0), (1.0, 1.0)]),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Map a raw confidence through the fitted curve
    pub fn calibrate(&self, raw: f64) -> f64 {
        let raw = raw.clamp(0.0, 1.0);
        let knots = match self.knots.lock() {
            Ok(k) => k,
            Err(_) => return raw,
        };
        interpolate(&knots, raw)
    }

    /// Remember a prediction so a later outcome can be matched to it
    pub fn note_prediction(&self, input: &str, predicted: f64) {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        if let Ok(mut pending) = self.pending.lock() {
            pending.push((hasher.finish(), predicted.clamp(0.0, 1.0)));
            // Bounded queue; oldest predictions age out unmatched
            let excess = pending.len().saturating_sub(1024);
            if excess > 0 {
                pending.drain(..excess);
            }
        }
    }

    /// Close the loop: the caller observed how correct the reasoning was
    ///
    /// Matches the most recent pending prediction for the same input; when
    /// none matches the pair is recorded with the raw predicted value given.
    pub fn record_outcome(&self, input: &str, observed: f64) {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        let key = hasher.finish();

        let predicted = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| {
                pending
                    .iter()
                    .rposition(|(k, _)| *k == key)
                    .map(|i| pending.remove(i).1)
            })
            .unwrap_or(observed);

        if let Ok(mut samples) = self.samples.lock() {
            samples.push((predicted, observed.clamp(0.0, 1.0)));
            if samples.len() >= MIN_SAMPLES_FOR_FIT {
                let fitted = fit_isotonic(&samples);
                drop(samples);
                if let Ok(mut knots) = self.knots.lock() {
                    *knots = fitted;
                }
                tracing::debug!("confidence curve refitted");
            }
        }
    }

    /// Recorded sample count (diagnostics)
    pub fn sample_count(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Linear interpolation over monotone knots
fn interpolate(knots: &[(f64, f64)], x: f64) -> f64 {
    match knots {
        [] => x,
        [only] => only.1,
        _ => {
            if x <= knots[0].0 {
                return knots[0].1;
            }
            for pair in knots.windows(2) {
                let (x0, y0) = pair[0];
                let (x1, y1) = pair[1];
                if x <= x1 {
                    if (x1 - x0).abs() < f64::EPSILON {
                        return y1;
                    }
                    let t = (x - x0) / (x1 - x0);
                    return y0 + t * (y1 - y0);
                }
            }
            knots[knots.len() - 1].1
        }
    }
}

/// Bucket the samples along the prediction axis, then enforce monotonicity
/// with pool-adjacent-violators over the bucket means
fn fit_isotonic(samples: &[(f64, f64)]) -> Vec<(f64, f64)> {
    struct Block {
        x_sum: f64,
        y_sum: f64,
        weight: f64,
    }

    let mut buckets: Vec<(f64, f64, usize)> = vec![(0.0, 0.0, 0); BUCKETS];
    for (predicted, observed) in samples {
        let idx = ((predicted * BUCKETS as f64) as usize).min(BUCKETS - 1);
        buckets[idx].0 += predicted;
        buckets[idx].1 += observed;
        buckets[idx].2 += 1;
    }

    let mut blocks: Vec<Block> = buckets
        .into_iter()
        .filter(|(_, _, n)| *n > 0)
        .map(|(x_sum, y_sum, n)| Block {
            x_sum,
            y_sum,
            weight: n as f64,
        })
        .collect();

    // Pool adjacent violators: merge any block whose mean drops below its
    // predecessor until the sequence is monotone.
    let mut i = 1;
    while i < blocks.len() {
        let prev_mean = blocks[i - 1].y_sum / blocks[i - 1].weight;
        let mean = blocks[i].y_sum / blocks[i].weight;
        if mean < prev_mean {
            let merged = Block {
                x_sum: blocks[i - 1].x_sum + blocks[i].x_sum,
                y_sum: blocks[i - 1].y_sum + blocks[i].y_sum,
                weight: blocks[i - 1].weight + blocks[i].weight,
            };
            blocks[i - 1] = merged;
            blocks.remove(i);
            i = i.saturating_sub(1).max(1);
        } else {
            i += 1;
        }
    }

    let mut knots: Vec<(f64, f64)> = blocks
        .iter()
        .map(|b| {
            (
                (b.x_sum / b.weight).clamp(0.0, 1.0),
                (b.y_sum / b.weight).clamp(0.0, 1.0),
            )
        })
        .collect();

    // Anchor the ends so extreme inputs stay in range
    if knots.first().is_none_or(|k| k.0 > 0.0) {
        knots.insert(0, (0.0, 0.0));
    }
    if knots.last().is_none_or(|k| k.0 < 1.0) {
        let top = knots.last().map(|k| k.1).unwrap_or(1.0);
        knots.push((1.0, top));
    }
    knots
}

// ============================================================================
// TESTS
// ============================================================================
