//! Framework Selector
//!
//! A fixed registry of eight systematic-thinking frameworks and a
//! hand-written weighted rubric that matches a classified problem against
//! them. No trained model: the rubric is explicit and auditable. Feedback on
//! plan outcomes accumulates and periodically folds into per-framework
//! biases.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// FRAMEWORK REGISTRY
// ============================================================================

/// The eight systematic-thinking frameworks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameworkId {
    /// Hypothesis, experiment, observation
    ScientificMethod,
    /// Empathize, define, ideate, prototype
    DesignThinking,
    /// Feedback loops, stocks and flows, leverage points
    SystemsThinking,
    /// Claims, premises, fallacies
    CriticalThinking,
    /// Divergent generation, deferred judgment
    CreativeProblemSolving,
    /// Five whys, causal chains
    RootCauseAnalysis,
    /// Strip assumptions to fundamentals, rebuild
    FirstPrinciples,
    /// Futures, drivers, contingencies
    ScenarioPlanning,
}

impl FrameworkId {
    /// All frameworks, in registry order
    pub fn all() -> [FrameworkId; 8] {
        [
            FrameworkId::ScientificMethod,
            FrameworkId::DesignThinking,
            FrameworkId::SystemsThinking,
            FrameworkId::CriticalThinking,
            FrameworkId::CreativeProblemSolving,
            FrameworkId::RootCauseAnalysis,
            FrameworkId::FirstPrinciples,
            FrameworkId::ScenarioPlanning,
        ]
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            FrameworkId::ScientificMethod => "Scientific Method",
            FrameworkId::DesignThinking => "Design Thinking",
            FrameworkId::SystemsThinking => "Systems Thinking",
            FrameworkId::CriticalThinking => "Critical Thinking",
            FrameworkId::CreativeProblemSolving => "Creative Problem Solving",
            FrameworkId::RootCauseAnalysis => "Root Cause Analysis",
            FrameworkId::FirstPrinciples => "First Principles",
            FrameworkId::ScenarioPlanning => "Scenario Planning",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            FrameworkId::ScientificMethod => {
                &["hypothesis", "test", "measure", "evidence", "experiment", "verify"]
            }
            FrameworkId::DesignThinking => {
                &["design", "user", "build", "prototype", "create", "implement", "interface"]
            }
            FrameworkId::SystemsThinking => {
                &["system", "feedback", "interaction", "dependencies", "emergent", "holistic"]
            }
            FrameworkId::CriticalThinking => {
                &["evaluate", "argument", "assess", "valid", "claim", "judge"]
            }
            FrameworkId::CreativeProblemSolving => {
                &["creative", "novel", "brainstorm", "alternative", "invent", "idea"]
            }
            FrameworkId::RootCauseAnalysis => {
                &["why", "cause", "failure", "bug", "broke", "regression", "diagnose"]
            }
            FrameworkId::FirstPrinciples => {
                &["fundamental", "assumption", "principle", "rethink", "scratch", "axiom"]
            }
            FrameworkId::ScenarioPlanning => {
                &["future", "scenario", "risk", "contingency", "forecast", "uncertainty"]
            }
        }
    }

    fn prompt_skeleton(&self) -> &'static str {
        match self {
            FrameworkId::ScientificMethod => {
                "State the hypothesis. Identify observable predictions. Design the cheapest \
                 discriminating test. Weigh the evidence for and against."
            }
            FrameworkId::DesignThinking => {
                "Describe who is affected and what they need. Define the problem from their \
                 view. Generate candidate designs. Pick one to prototype and name its risks."
            }
            FrameworkId::SystemsThinking => {
                "Map the components and their interactions. Find the feedback loops. Locate \
                 the leverage points. Predict second-order effects of intervening."
            }
            FrameworkId::CriticalThinking => {
                "Extract the central claim. List its premises. Probe each premise for \
                 weaknesses. State what would change the conclusion."
            }
            FrameworkId::CreativeProblemSolving => {
                "Suspend judgment and list many options, including impractical ones. Combine \
                 and mutate the promising ones. Only then evaluate feasibility."
            }
            FrameworkId::RootCauseAnalysis => {
                "Describe the observed failure precisely. Ask why it happened; repeat on each \
                 answer until the chain grounds out. Distinguish triggering cause from \
                 enabling conditions."
            }
            FrameworkId::FirstPrinciples => {
                "List the inherited assumptions. Strip them to physical or logical \
                 fundamentals. Rebuild the solution from those fundamentals alone."
            }
            FrameworkId::ScenarioPlanning => {
                "Identify the key uncertainties. Sketch divergent futures across them. For \
                 each future, note early indicators and a robust response."
            }
        }
    }

    fn preferred_shapes(&self) -> &'static [ProblemShape] {
        match self {
            FrameworkId::ScientificMethod => &[ProblemShape::Causal, ProblemShape::Exploratory],
            FrameworkId::DesignThinking => &[ProblemShape::Design],
            FrameworkId::SystemsThinking => &[ProblemShape::Causal, ProblemShape::Design],
            FrameworkId::CriticalThinking => &[ProblemShape::Evaluative],
            FrameworkId::CreativeProblemSolving => {
                &[ProblemShape::Design, ProblemShape::Exploratory]
            }
            FrameworkId::RootCauseAnalysis => &[ProblemShape::Causal],
            FrameworkId::FirstPrinciples => &[ProblemShape::Design, ProblemShape::Evaluative],
            FrameworkId::ScenarioPlanning => &[ProblemShape::Exploratory],
        }
    }

    /// Affinity for uncertain problems, in [0, 1]
    fn uncertainty_affinity(&self) -> f64 {
        match self {
            FrameworkId::ScientificMethod => 0.6,
            FrameworkId::DesignThinking => 0.4,
            FrameworkId::SystemsThinking => 0.5,
            FrameworkId::CriticalThinking => 0.3,
            FrameworkId::CreativeProblemSolving => 0.7,
            FrameworkId::RootCauseAnalysis => 0.2,
            FrameworkId::FirstPrinciples => 0.5,
            FrameworkId::ScenarioPlanning => 0.9,
        }
    }
}

// ============================================================================
// PROBLEM FEATURES
// ============================================================================

/// Broad shape of a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemShape {
    /// Why did something happen
    Causal,
    /// Build or change something
    Design,
    /// Survey an open space
    Exploratory,
    /// Judge a claim or option
    Evaluative,
}

/// Classified features of a problem statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemFeatures {
    /// Phrased as a question rather than a directive
    pub is_question: bool,
    /// Dominant shape
    pub shape: ProblemShape,
    /// Long-horizon wording detected
    pub long_horizon: bool,
    /// Hedge-word density in [0, 1]
    pub uncertainty: f64,
}

/// Classify a problem into rubric features
pub fn classify(problem: &str, context: Option<&str>) -> ProblemFeatures {
    let lower = problem.to_lowercase();
    let is_question = lower.contains('?')
        || ["what ", "how ", "why ", "when ", "which ", "should ", "can "]
            .iter()
            .any(|q| lower.starts_with(q));

    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    let shape = if has_any(&["why", "cause", "fail", "broke", "regression", "crash"]) {
        ProblemShape::Causal
    } else if has_any(&["build", "design", "create", "implement", "add", "improve", "refactor"]) {
        ProblemShape::Design
    } else if has_any(&["explore", "what if", "future", "options", "landscape", "brainstorm"]) {
        ProblemShape::Exploratory
    } else if has_any(&["evaluate", "compare", "assess", "worth", "better", "tradeoff"]) {
        ProblemShape::Evaluative
    } else if is_question {
        ProblemShape::Exploratory
    } else {
        ProblemShape::Design
    };

    let long_horizon = has_any(&["long-term", "roadmap", "next year", "years", "strategy"]);

    let hedges = [
        "might", "maybe", "unclear", "unknown", "uncertain", "possibly", "could", "risky",
    ];
    let words = lower.split_whitespace().count().max(1);
    let hedge_hits = hedges.iter().filter(|h| lower.contains(*h)).count();
    let mut uncertainty = (hedge_hits as f64 / (words as f64).sqrt()).min(1.0);
    if context.is_none() {
        uncertainty = (uncertainty + 0.2).min(1.0);
    }

    ProblemFeatures {
        is_question,
        shape,
        long_horizon,
        uncertainty,
    }
}

// ============================================================================
// PLAN & FEEDBACK
// ============================================================================

/// The selected framework(s) and composed guidance for one problem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkPlan {
    /// Unique id; feedback references it
    pub plan_id: String,
    /// Chosen frameworks, strongest match first (1 for single, 2-3 for hybrid)
    pub frameworks: Vec<FrameworkId>,
    /// True when the top score fell below the single-framework threshold
    pub hybrid: bool,
    /// Prompt skeletons composed in declared order
    pub composed_skeleton: String,
    /// The features the rubric saw
    pub features: ProblemFeatures,
    /// Rubric score per chosen framework
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone)]
struct FeedbackRecord {
    frameworks: Vec<FrameworkId>,
    score: f64,
    recorded_at: DateTime<Utc>,
}

// ============================================================================
// SELECTOR
// ============================================================================

/// Scores frameworks against problem features and composes plans
pub struct FrameworkSelector {
    single_framework_threshold: f64,
    /// Learned per-framework bias, adjusted from recorded feedback
    biases: Mutex<HashMap<FrameworkId, f64>>,
    feedback: Mutex<Vec<FeedbackRecord>>,
    plans: Mutex<HashMap<String, Vec<FrameworkId>>>,
}

impl FrameworkSelector {
    /// Create a selector with the configured threshold
    pub fn new(single_framework_threshold: f64) -> Self {
        Self {
            single_framework_threshold,
            biases: Mutex::new(HashMap::new()),
            feedback: Mutex::new(Vec::new()),
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Rubric score for one framework against the features, in [0, 1]
    ///
    /// Hand-written weighted match: keywords 0.45, shape 0.35, uncertainty
    /// affinity 0.20, plus any learned bias.
    pub fn score(&self, framework: FrameworkId, problem: &str, features: &ProblemFeatures) -> f64 {
        let lower = problem.to_lowercase();
        let keywords = framework.keywords();
        let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
        let keyword_score = (hits as f64 / 2.0).min(1.0);

        let shape_score = if framework.preferred_shapes().contains(&features.shape) {
            1.0
        } else {
            0.0
        };

        let affinity = framework.uncertainty_affinity();
        let uncertainty_score = 1.0 - (affinity - features.uncertainty).abs();

        let bias = self
            .biases
            .lock()
            .ok()
            .and_then(|b| b.get(&framework).copied())
            .unwrap_or(0.0);

        (0.45 * keyword_score + 0.35 * shape_score + 0.20 * uncertainty_score + bias)
            .clamp(0.0, 1.0)
    }

    /// Choose a framework (or hybrid of 2-3) for a problem
    pub fn select(&self, problem: &str, context: Option<&str>) -> FrameworkPlan {
        let features = classify(problem, context);

        let mut ranked: Vec<(FrameworkId, f64)> = FrameworkId::all()
            .into_iter()
            .map(|f| (f, self.score(f, problem, &features)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.name().cmp(b.0.name()))
        });

        let single = ranked[0].1 >= self.single_framework_threshold;
        let chosen: Vec<(FrameworkId, f64)> = if single {
            ranked.into_iter().take(1).collect()
        } else {
            // Hybrid of the top 2-3: the third joins only when it is close
            let take = if ranked[2].1 >= ranked[1].1 - 0.1 { 3 } else { 2 };
            ranked.into_iter().take(take).collect()
        };

        let composed_skeleton = chosen
            .iter()
            .map(|(f, _)| format!("[{}] {}", f.name(), f.prompt_skeleton()))
            .collect::<Vec<_>>()
            .join("\n");

        let plan = FrameworkPlan {
            plan_id: Uuid::new_v4().to_string(),
            frameworks: chosen.iter().map(|(f, _)| *f).collect(),
            hybrid: !single,
            composed_skeleton,
            features,
            scores: chosen.iter().map(|(_, s)| *s).collect(),
        };

        if let Ok(mut plans) = self.plans.lock() {
            plans.insert(plan.plan_id.clone(), plan.frameworks.clone());
        }
        tracing::debug!(
            plan_id = %plan.plan_id,
            frameworks = ?plan.frameworks,
            hybrid = plan.hybrid,
            "framework plan selected"
        );
        plan
    }

    /// A single-framework plan for a caller who already chose one
    pub fn pinned_plan(&self, problem: &str, framework: FrameworkId) -> FrameworkPlan {
        let features = classify(problem, None);
        let score = self.score(framework, problem, &features);
        let plan = FrameworkPlan {
            plan_id: Uuid::new_v4().to_string(),
            frameworks: vec![framework],
            hybrid: false,
            composed_skeleton: format!("[{}] {}", framework.name(), framework.prompt_skeleton()),
            features,
            scores: vec![score],
        };
        if let Ok(mut plans) = self.plans.lock() {
            plans.insert(plan.plan_id.clone(), plan.frameworks.clone());
        }
        plan
    }

    /// Record how well a plan's outcome scored, for the adaptive loop
    pub fn record_feedback(&self, plan_id: &str, score: f64) {
        let Some(frameworks) = self
            .plans
            .lock()
            .ok()
            .and_then(|p| p.get(plan_id).cloned())
        else {
            tracing::debug!(plan_id, "feedback for unknown plan dropped");
            return;
        };
        if let Ok(mut feedback) = self.feedback.lock() {
            feedback.push(FeedbackRecord {
                frameworks,
                score: score.clamp(0.0, 1.0),
                recorded_at: Utc::now(),
            });
        }
    }

    /// Fold accumulated feedback into per-framework biases
    ///
    /// Intended to run on a slow cadence (the scheduler calls it monthly).
    /// Each framework's bias moves toward `mean_outcome - 0.5`, bounded so
    /// the rubric always dominates.
    pub fn recalibrate(&self, older_than: DateTime<Utc>) {
        let Ok(mut feedback) = self.feedback.lock() else {
            return;
        };
        let (due, keep): (Vec<_>, Vec<_>) = feedback
            .drain(..)
            .partition(|r| r.recorded_at <= older_than);
        *feedback = keep;
        drop(feedback);

        if due.is_empty() {
            return;
        }

        let mut sums: HashMap<FrameworkId, (f64, usize)> = HashMap::new();
        for record in &due {
            for framework in &record.frameworks {
                let entry = sums.entry(*framework).or_insert((0.0, 0));
                entry.0 += record.score;
                entry.1 += 1;
            }
        }

        if let Ok(mut biases) = self.biases.lock() {
            for (framework, (sum, n)) in sums {
                let mean = sum / n as f64;
                let nudge = ((mean - 0.5) * 0.1).clamp(-0.05, 0.05);
                let bias = biases.entry(framework).or_insert(0.0);
                *bias = (*bias + nudge).clamp(-0.15, 0.15);
            }
        }
        tracing::info!(records = due.len(), "framework rubric recalibrated");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> FrameworkSelector {
        FrameworkSelector::new(0.6)
    }

    #[test]
    fn test_classify_causal_question() {
        let features = classify("why did the nightly ingestion job fail?", None);
        assert!(features.is_question);
        assert_eq!(features.shape, ProblemShape::Causal);
    }

    #[test]
    fn test_classify_design_directive() {
        let features = classify(
            "design a caching layer for the profile service",
            Some("service context"),
        );
        assert!(!features.is_question);
        assert_eq!(features.shape, ProblemShape::Design);
    }

    #[test]
    fn test_uncertainty_rises_with_hedges() {
        let vague = classify("it might fail, cause unknown, possibly the cache", None);
        let crisp = classify("why did the cache fail", Some("full logs attached"));
        assert!(vague.uncertainty > crisp.uncertainty);
    }

    #[test]
    fn test_failure_problem_selects_root_cause() {
        let plan = selector().select(
            "why did the deploy fail with a regression in the auth flow?",
            None,
        );
        assert_eq!(plan.frameworks[0], FrameworkId::RootCauseAnalysis);
    }

    #[test]
    fn test_future_problem_selects_scenario_planning() {
        let plan = selector().select(
            "explore future risk scenarios for the storage roadmap under uncertainty",
            None,
        );
        assert_eq!(plan.frameworks[0], FrameworkId::ScenarioPlanning);
    }

    #[test]
    fn test_vague_problem_yields_hybrid_of_two_or_three() {
        let plan = selector().select("make everything nicer", None);
        assert!(plan.hybrid);
        assert!((2..=3).contains(&plan.frameworks.len()));
        // Composed skeleton names each chosen framework in order
        for framework in &plan.frameworks {
            assert!(plan.composed_skeleton.contains(framework.name()));
        }
    }

    #[test]
    fn test_single_selection_above_threshold() {
        let plan = selector().select(
            "diagnose why the billing export broke: find the root cause of the failure bug",
            None,
        );
        assert!(!plan.hybrid);
        assert_eq!(plan.frameworks.len(), 1);
        assert!(plan.scores[0] >= 0.6);
    }

    #[test]
    fn test_feedback_adjusts_bias() {
        let selector = selector();
        // One keyword hit keeps the baseline score below the clamp ceiling
        let problem = "why did it happen?";
        let plan = selector.select(problem, None);
        let before = selector.score(plan.frameworks[0], problem, &plan.features);
        assert!(before < 1.0);

        for _ in 0..5 {
            selector.record_feedback(&plan.plan_id, 1.0);
        }
        selector.recalibrate(Utc::now() + chrono::Duration::seconds(1));

        let after = selector.score(plan.frameworks[0], problem, &plan.features);
        assert!(after > before);
    }

    #[test]
    fn test_feedback_for_unknown_plan_is_ignored() {
        let selector = selector();
        selector.record_feedback("no-such-plan", 1.0);
        selector.recalibrate(Utc::now() + chrono::Duration::seconds(1));
        // No panic, no bias changes
        assert!(selector.biases.lock().unwrap().is_empty());
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let selector = selector();
        let features = classify("anything at all", None);
        for framework in FrameworkId::all() {
            let s = selector.score(framework, "anything at all", &features);
            assert!((0.0..=1.0).contains(&s));
        }
    }
}
