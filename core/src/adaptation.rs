use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::belief::BeliefState;
use crate::memory::{MemoryLog, PatternCount};
use crate::vocabulary::Outcome;

const POSITIVE_CONFIDENCE_STEP: f64 = 0.1;
const POSITIVE_BELIEF_STEP: f64 = 0.05;
const NEGATIVE_CONFIDENCE_STEP: f64 = 0.1;
/// Confidence after a failure is never below this, even if it started lower.
const NEGATIVE_CONFIDENCE_FLOOR: f64 = 0.3;

const FAILURE_MIN_SUGGESTIONS: usize = 3;
const FAILURE_RATE_THRESHOLD: f64 = 0.5;
const SUCCESS_MIN_SUGGESTIONS: usize = 2;
const SUCCESS_RATE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationEntry {
    pub recorded_at: DateTime<Utc>,
    pub action_id: Uuid,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSignal {
    pub suggestion: String,
    pub rate: f64,
    pub times_suggested: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningInsights {
    pub successful_patterns: Vec<PatternCount>,
    pub failed_patterns: Vec<PatternCount>,
    /// Something that keeps failing and should be dropped.
    pub pattern_failure: Option<PatternSignal>,
    /// Something that keeps working and is worth repeating.
    pub pattern_success: Option<PatternSignal>,
    pub dislikes: Vec<String>,
    pub allergies: Vec<String>,
    pub total_actions: usize,
    pub successful_actions: usize,
    pub failed_actions: usize,
}

/// Learns from outcomes for one user by adjusting memory and belief.
/// No model is retrained here.
#[derive(Debug, Clone, Default)]
pub struct AdaptationLearner {
    trail: Vec<AdaptationEntry>,
}

impl AdaptationLearner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trail(&self) -> &[AdaptationEntry] {
        &self.trail
    }

    /// Record an outcome and, when a belief state is supplied, nudge the
    /// targeted nutrients. Returns `false` with no side effects when the
    /// memory refuses the outcome.
    pub fn learn_from_outcome(
        &mut self,
        memory: &mut MemoryLog,
        action_id: Uuid,
        outcome: Outcome,
        outcome_text: Option<String>,
        state: Option<&mut BeliefState>,
        now: DateTime<Utc>,
    ) -> bool {
        if !memory.record_outcome(action_id, outcome, outcome_text.clone(), now) {
            tracing::warn!(action_id = %action_id, "outcome not recorded; nothing learned");
            return false;
        }

        if let Some(state) = state {
            let targeted = memory
                .action(action_id)
                .map(|record| record.targeted_nutrients().to_vec())
                .unwrap_or_default();
            for nutrient in targeted {
                match outcome {
                    Outcome::Positive => {
                        state.set_confidence(
                            nutrient,
                            state.confidence(nutrient) + POSITIVE_CONFIDENCE_STEP,
                        );
                        state.set_belief(nutrient, state.belief(nutrient) + POSITIVE_BELIEF_STEP);
                    }
                    Outcome::Negative => {
                        let confidence = state.confidence(nutrient);
                        state.set_confidence(
                            nutrient,
                            (confidence - NEGATIVE_CONFIDENCE_STEP).max(NEGATIVE_CONFIDENCE_FLOOR),
                        );
                    }
                    Outcome::Neutral | Outcome::Unknown => {}
                }
                tracing::debug!(
                    nutrient = %nutrient,
                    outcome = outcome.as_str(),
                    "belief adjusted from outcome"
                );
            }
        }

        tracing::info!(action_id = %action_id, outcome = outcome.as_str(), "outcome learned");
        self.trail.push(AdaptationEntry {
            recorded_at: now,
            action_id,
            outcome,
            outcome_text,
        });
        true
    }

    /// First failed pattern suggested at least three times that fails more often than not.
    pub fn detect_pattern_failure(&self, memory: &MemoryLog) -> Option<PatternSignal> {
        detect(
            memory,
            memory.failed_patterns(),
            FAILURE_MIN_SUGGESTIONS,
            FAILURE_RATE_THRESHOLD,
        )
    }

    pub fn detect_successful_pattern(&self, memory: &MemoryLog) -> Option<PatternSignal> {
        detect(
            memory,
            memory.successful_patterns(),
            SUCCESS_MIN_SUGGESTIONS,
            SUCCESS_RATE_THRESHOLD,
        )
    }

    /// Retraining belongs to whoever owns the sensor models.
    pub fn should_retrain_model(&self) -> bool {
        false
    }

    pub fn learning_insights(&self, memory: &MemoryLog) -> LearningInsights {
        let outcomes = |wanted: Outcome| {
            memory
                .actions()
                .iter()
                .filter(|record| record.outcome() == Some(wanted))
                .count()
        };
        LearningInsights {
            successful_patterns: memory.successful_patterns(),
            failed_patterns: memory.failed_patterns(),
            pattern_failure: self.detect_pattern_failure(memory),
            pattern_success: self.detect_successful_pattern(memory),
            dislikes: memory.dislikes().iter().cloned().collect(),
            allergies: memory.allergies().iter().cloned().collect(),
            total_actions: memory.actions().len(),
            successful_actions: outcomes(Outcome::Positive),
            failed_actions: outcomes(Outcome::Negative),
        }
    }
}

fn detect(
    memory: &MemoryLog,
    patterns: Vec<PatternCount>,
    min_suggestions: usize,
    threshold: f64,
) -> Option<PatternSignal> {
    patterns.into_iter().find_map(|pattern| {
        let times_suggested = memory.times_suggested(&pattern.text);
        if times_suggested < min_suggestions {
            return None;
        }
        let rate = f64::from(pattern.count) / times_suggested as f64;
        (rate > threshold).then_some(PatternSignal {
            suggestion: pattern.text,
            rate,
            times_suggested,
        })
    })
}
