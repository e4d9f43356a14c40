use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::unit;
use crate::vocabulary::{ActionKind, FeedbackDirection, Nutrient, PregnancyStage, Sentiment};

/// Share of the old belief retained on every sensor-sourced update.
pub const DAMPING_FACTOR: f64 = 0.7;
/// A belief is only actionable above this confidence.
pub const MIN_CONFIDENCE_TO_ACT: f64 = 0.7;
pub const DEFAULT_BELIEF: f64 = 0.5;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 0.3;
pub const DEFAULT_ADEQUATE_THRESHOLD: f64 = 0.7;

const USER_FEEDBACK_CONFIDENCE_BOOST: f64 = 0.15;
const SENTIMENT_ENERGY_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalMetric {
    Energy,
    Hydration,
    SleepQuality,
    Stress,
}

impl PhysicalMetric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "energy" => Some(PhysicalMetric::Energy),
            "hydration" => Some(PhysicalMetric::Hydration),
            "sleep_quality" | "sleep" => Some(PhysicalMetric::SleepQuality),
            "stress" => Some(PhysicalMetric::Stress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalState {
    pub energy: f64,
    pub hydration: f64,
    pub sleep_quality: f64,
    pub stress: f64,
}

impl Default for PhysicalState {
    fn default() -> Self {
        Self {
            energy: DEFAULT_BELIEF,
            hydration: DEFAULT_BELIEF,
            sleep_quality: DEFAULT_BELIEF,
            stress: DEFAULT_BELIEF,
        }
    }
}

/// Slow-moving facts about the user, set from outside the belief loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifeContext {
    pub stage: Option<PregnancyStage>,
    pub breastfeeding: bool,
    pub age: Option<u32>,
}

/// The system's belief about one user's nutritional and physical state.
///
/// Values are 0-1 tendencies, not measurements. Every mutation clamps
/// beliefs and confidences back into [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    #[serde(deserialize_with = "known_nutrient_scores")]
    nutrient_belief: BTreeMap<Nutrient, f64>,
    #[serde(deserialize_with = "known_nutrient_scores")]
    nutrient_confidence: BTreeMap<Nutrient, f64>,
    physical: PhysicalState,
    pub context: LifeContext,
    symptoms: BTreeSet<String>,
    last_action_kind: Option<ActionKind>,
    last_action_at: Option<DateTime<Utc>>,
    update_count: u64,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
}

impl BeliefState {
    /// Fresh state with every belief and confidence at the midpoint.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            nutrient_belief: midpoints(DEFAULT_BELIEF),
            nutrient_confidence: midpoints(DEFAULT_CONFIDENCE),
            physical: PhysicalState::default(),
            context: LifeContext::default(),
            symptoms: BTreeSet::new(),
            last_action_kind: None,
            last_action_at: None,
            update_count: 0,
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn with_context(context: LifeContext, now: DateTime<Utc>) -> Self {
        let mut state = Self::new(now);
        state.context = context;
        state
    }

    pub fn belief(&self, nutrient: Nutrient) -> f64 {
        self.nutrient_belief
            .get(&nutrient)
            .copied()
            .unwrap_or(DEFAULT_BELIEF)
    }

    pub fn confidence(&self, nutrient: Nutrient) -> f64 {
        self.nutrient_confidence
            .get(&nutrient)
            .copied()
            .unwrap_or(DEFAULT_CONFIDENCE)
    }

    /// `(nutrient, belief, confidence)` in stable nutrient order.
    pub fn nutrients(&self) -> impl Iterator<Item = (Nutrient, f64, f64)> + '_ {
        Nutrient::ALL
            .into_iter()
            .map(|nutrient| (nutrient, self.belief(nutrient), self.confidence(nutrient)))
    }

    pub fn set_belief(&mut self, nutrient: Nutrient, value: f64) {
        self.nutrient_belief.insert(nutrient, unit(value));
    }

    pub fn set_confidence(&mut self, nutrient: Nutrient, value: f64) {
        self.nutrient_confidence.insert(nutrient, unit(value));
    }

    pub fn physical(&self) -> PhysicalState {
        self.physical
    }

    pub fn symptoms(&self) -> &BTreeSet<String> {
        &self.symptoms
    }

    pub fn last_action_kind(&self) -> Option<ActionKind> {
        self.last_action_kind
    }

    pub fn last_action_at(&self) -> Option<DateTime<Utc>> {
        self.last_action_at
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    /// Blend a sensor reading into the belief.
    ///
    /// `belief = D * belief + (1 - D) * prediction` and
    /// `confidence = 0.5 * confidence + 0.5 * model_confidence`.
    /// Returns `false` when the nutrient id is unknown or the prediction
    /// is not a finite number.
    pub fn apply_sensor_signal(
        &mut self,
        nutrient: &str,
        prediction: f64,
        model_confidence: f64,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(id) = Nutrient::parse(nutrient) else {
            tracing::warn!(nutrient, "unknown nutrient; sensor signal ignored");
            return false;
        };
        if !prediction.is_finite() {
            tracing::warn!(nutrient = %id, "non-finite sensor prediction ignored");
            return false;
        }
        let model_confidence = if model_confidence.is_finite() {
            unit(model_confidence)
        } else {
            tracing::warn!(nutrient = %id, "non-finite model confidence treated as zero");
            0.0
        };

        let prediction = unit(prediction);
        let old_belief = self.belief(id);
        let new_belief = DAMPING_FACTOR * old_belief + (1.0 - DAMPING_FACTOR) * prediction;
        let new_confidence = 0.5 * self.confidence(id) + 0.5 * model_confidence;
        self.set_belief(id, new_belief);
        self.set_confidence(id, new_confidence);

        self.update_count += 1;
        self.last_updated_at = now;
        tracing::debug!(
            nutrient = %id,
            old_belief,
            new_belief,
            confidence = new_confidence,
            "sensor signal absorbed"
        );
        true
    }

    /// User feedback is ground truth: undamped delta, confidence always rises.
    pub fn apply_user_feedback(
        &mut self,
        nutrient: &str,
        direction: FeedbackDirection,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(id) = Nutrient::parse(nutrient) else {
            tracing::warn!(nutrient, "unknown nutrient; user feedback ignored");
            return false;
        };

        let old_belief = self.belief(id);
        self.set_belief(id, old_belief + direction.delta());
        self.set_confidence(id, self.confidence(id) + USER_FEEDBACK_CONFIDENCE_BOOST);
        self.last_updated_at = now;
        tracing::info!(
            nutrient = %id,
            ?direction,
            old_belief,
            new_belief = self.belief(id),
            "user feedback applied"
        );
        true
    }

    pub fn apply_sentiment(&mut self, sentiment: Sentiment, now: DateTime<Utc>) {
        let delta = match sentiment {
            Sentiment::Positive => SENTIMENT_ENERGY_STEP,
            Sentiment::Negative => -SENTIMENT_ENERGY_STEP,
            Sentiment::Neutral => return,
        };
        self.physical.energy = unit(self.physical.energy + delta);
        self.last_updated_at = now;
    }

    pub fn set_physical(&mut self, metric: PhysicalMetric, value: f64, now: DateTime<Utc>) {
        let value = if value.is_finite() { unit(value) } else { DEFAULT_BELIEF };
        match metric {
            PhysicalMetric::Energy => self.physical.energy = value,
            PhysicalMetric::Hydration => self.physical.hydration = value,
            PhysicalMetric::SleepQuality => self.physical.sleep_quality = value,
            PhysicalMetric::Stress => self.physical.stress = value,
        }
        self.last_updated_at = now;
    }

    pub fn set_context(
        &mut self,
        stage: Option<PregnancyStage>,
        breastfeeding: bool,
        age: Option<u32>,
        now: DateTime<Utc>,
    ) {
        self.context = LifeContext {
            stage,
            breastfeeding,
            age,
        };
        self.last_updated_at = now;
    }

    pub fn report_symptom(&mut self, symptom: &str, now: DateTime<Utc>) {
        let normalized = symptom.trim().to_lowercase();
        if normalized.is_empty() {
            return;
        }
        tracing::info!(symptom = %normalized, "symptom reported");
        self.symptoms.insert(normalized);
        self.last_updated_at = now;
    }

    pub fn clear_symptoms(&mut self) {
        self.symptoms.clear();
    }

    pub fn record_action(&mut self, kind: ActionKind, at: DateTime<Utc>) {
        self.last_action_kind = Some(kind);
        self.last_action_at = Some(at);
    }

    /// Low belief counts only when we are also confident about it.
    pub fn is_critical(&self, nutrient: Nutrient, threshold: f64) -> bool {
        self.belief(nutrient) < threshold && self.confidence(nutrient) > MIN_CONFIDENCE_TO_ACT
    }

    pub fn is_adequate(&self, nutrient: Nutrient, threshold: f64) -> bool {
        self.belief(nutrient) >= threshold
    }

    pub fn summary(&self) -> BeliefSummary {
        BeliefSummary {
            context: self.context,
            nutrients: self
                .nutrients()
                .map(|(nutrient, belief, confidence)| NutrientReading {
                    nutrient,
                    belief,
                    confidence,
                    critical: self.is_critical(nutrient, DEFAULT_CRITICAL_THRESHOLD),
                    adequate: self.is_adequate(nutrient, DEFAULT_ADEQUATE_THRESHOLD),
                })
                .collect(),
            physical: self.physical,
            symptoms: self.symptoms.iter().cloned().collect(),
            last_action_kind: self.last_action_kind,
            last_action_at: self.last_action_at,
            update_count: self.update_count,
            last_updated_at: self.last_updated_at,
        }
    }
}

/// Debug/app view of the belief state. Not shown to the user as scores.
#[derive(Debug, Clone, Serialize)]
pub struct BeliefSummary {
    pub context: LifeContext,
    pub nutrients: Vec<NutrientReading>,
    pub physical: PhysicalState,
    pub symptoms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action_kind: Option<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action_at: Option<DateTime<Utc>>,
    pub update_count: u64,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutrientReading {
    pub nutrient: Nutrient,
    pub belief: f64,
    pub confidence: f64,
    pub critical: bool,
    pub adequate: bool,
}

fn midpoints(value: f64) -> BTreeMap<Nutrient, f64> {
    Nutrient::ALL.into_iter().map(|n| (n, value)).collect()
}

/// Restore a nutrient score map, dropping unknown ids and filling gaps.
fn known_nutrient_scores<'de, D>(deserializer: D) -> Result<BTreeMap<Nutrient, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;
    let mut scores = midpoints(DEFAULT_BELIEF);
    for (key, value) in raw {
        match Nutrient::parse(&key) {
            Some(nutrient) if value.is_finite() => {
                scores.insert(nutrient, unit(value));
            }
            Some(nutrient) => {
                tracing::warn!(
                    nutrient = %nutrient,
                    "non-finite persisted score replaced with default"
                );
            }
            None => {
                tracing::warn!(nutrient = %key, "unknown nutrient dropped from persisted state");
            }
        }
    }
    Ok(scores)
}
