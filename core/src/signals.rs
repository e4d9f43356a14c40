//! Seams to the collaborators around the decision core: nutrient sensors,
//! the text parser and the phrasing layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::belief::BeliefState;
use crate::policy::Decision;
use crate::vocabulary::{Nutrient, Outcome, PregnancyStage, Sentiment};

/// Inputs a sensor may look at. Built from user facts, not from beliefs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextFeatures {
    pub age: Option<u32>,
    pub stage: Option<PregnancyStage>,
    pub breastfeeding: bool,
    pub recent_symptoms: Vec<String>,
    pub days_since_last_check: i64,
}

impl ContextFeatures {
    pub fn from_state(state: &BeliefState, days_since_last_check: i64) -> Self {
        Self {
            age: state.context.age,
            stage: state.context.stage,
            breastfeeding: state.context.breastfeeding,
            recent_symptoms: state.symptoms().iter().cloned().collect(),
            days_since_last_check,
        }
    }

    /// Numeric row for model-backed sensors:
    /// `[age, stage_code, breastfeeding, symptom_count, days_since_last_check]`.
    pub fn as_row(&self) -> [f64; 5] {
        let stage_code = match self.stage {
            None => 0.0,
            Some(PregnancyStage::Planning) => 1.0,
            Some(PregnancyStage::FirstTrimester) => 2.0,
            Some(PregnancyStage::SecondTrimester) => 3.0,
            Some(PregnancyStage::ThirdTrimester) => 4.0,
        };
        [
            f64::from(self.age.unwrap_or(0)),
            stage_code,
            if self.breastfeeding { 1.0 } else { 0.0 },
            self.recent_symptoms.len() as f64,
            self.days_since_last_check as f64,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    pub prediction: f64,
    pub confidence: f64,
}

/// A nutrient-adequacy predictor. Its output is a signal, never a decision.
pub trait NutrientSensor {
    fn nutrient(&self) -> Nutrient;
    fn predict(&self, features: &ContextFeatures) -> SensorReading;
}

/// Stand-in when no model is loaded: a midpoint prediction with no confidence.
#[derive(Debug, Clone, Copy)]
pub struct NeutralSensor {
    nutrient: Nutrient,
}

impl NeutralSensor {
    pub fn new(nutrient: Nutrient) -> Self {
        Self { nutrient }
    }
}

impl NutrientSensor for NeutralSensor {
    fn nutrient(&self) -> Nutrient {
        self.nutrient
    }

    fn predict(&self, _features: &ContextFeatures) -> SensorReading {
        SensorReading {
            prediction: 0.5,
            confidence: 0.0,
        }
    }
}

/// At most one sensor per nutrient, consulted in nutrient order.
#[derive(Default)]
pub struct SensorSuite {
    sensors: Vec<Box<dyn NutrientSensor>>,
}

impl SensorSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// A neutral sensor for every known nutrient.
    pub fn neutral() -> Self {
        let mut suite = Self::new();
        for nutrient in Nutrient::ALL {
            suite.register(Box::new(NeutralSensor::new(nutrient)));
        }
        suite
    }

    /// Replaces any sensor already registered for the same nutrient.
    pub fn register(&mut self, sensor: Box<dyn NutrientSensor>) {
        let nutrient = sensor.nutrient();
        self.sensors.retain(|existing| existing.nutrient() != nutrient);
        self.sensors.push(sensor);
        self.sensors.sort_by_key(|sensor| sensor.nutrient());
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Feed one reading per registered nutrient into the belief state.
    /// Returns how many readings were absorbed.
    pub fn absorb(
        &self,
        state: &mut BeliefState,
        features: &ContextFeatures,
        now: DateTime<Utc>,
    ) -> usize {
        let mut absorbed = 0;
        for sensor in &self.sensors {
            let reading = sensor.predict(features);
            if state.apply_sensor_signal(
                sensor.nutrient().as_str(),
                reading.prediction,
                reading.confidence,
                now,
            ) {
                absorbed += 1;
            }
        }
        absorbed
    }
}

/// "I tried spinach and felt better" as structured data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeReport {
    /// Text of the action the user is talking about, usually a food id.
    pub action: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Parser output consumed by a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedSignals {
    pub symptoms: Vec<String>,
    pub sentiment: Sentiment,
    pub nutrients_mentioned: Vec<String>,
    pub intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_report: Option<OutcomeReport>,
}

/// Turns a decision into user-facing text. Gets a shared reference only,
/// so it cannot change what was decided.
pub trait Phrasing {
    fn phrase(&self, decision: &Decision) -> String;
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ContextFeatures, NutrientSensor, ParsedSignals, SensorReading, SensorSuite};
    use crate::belief::BeliefState;
    use crate::vocabulary::{Nutrient, Outcome, PregnancyStage, Sentiment};

    struct FixedSensor(Nutrient, f64, f64);

    impl NutrientSensor for FixedSensor {
        fn nutrient(&self) -> Nutrient {
            self.0
        }

        fn predict(&self, _features: &ContextFeatures) -> SensorReading {
            SensorReading {
                prediction: self.1,
                confidence: self.2,
            }
        }
    }

    #[test]
    fn neutral_suite_covers_every_nutrient_without_confidence() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap();
        let mut state = BeliefState::new(now);
        let features = ContextFeatures::from_state(&state, 1);

        let suite = SensorSuite::neutral();
        assert_eq!(suite.absorb(&mut state, &features, now), Nutrient::ALL.len());
        for (_, belief, confidence) in state.nutrients() {
            assert!((belief - 0.5).abs() < 1e-9);
            assert!((confidence - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn registering_twice_replaces_the_sensor() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap();
        let mut state = BeliefState::new(now);
        let mut suite = SensorSuite::new();
        suite.register(Box::new(FixedSensor(Nutrient::Iron, 0.0, 1.0)));
        suite.register(Box::new(FixedSensor(Nutrient::Iron, 1.0, 1.0)));
        assert_eq!(suite.len(), 1);

        let features = ContextFeatures::from_state(&state, 0);
        suite.absorb(&mut state, &features, now);
        assert!((state.belief(Nutrient::Iron) - 0.65).abs() < 1e-9);
    }

    #[test]
    fn features_encode_stage() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap();
        let mut state = BeliefState::new(now);
        state.set_context(Some(PregnancyStage::SecondTrimester), true, Some(29), now);
        state.report_symptom("fatigue", now);

        let row = ContextFeatures::from_state(&state, 4).as_row();
        assert_eq!(row, [29.0, 3.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn parsed_signals_accept_partial_json() {
        let parsed: ParsedSignals = serde_json::from_str(
            r#"{"sentiment":"negative","outcome_report":{"action":"spinach","outcome":"negative"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.sentiment, Sentiment::Negative);
        assert!(parsed.symptoms.is_empty());
        assert_eq!(parsed.outcome_report.unwrap().outcome, Outcome::Negative);
    }
}
