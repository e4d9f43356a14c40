use serde::Serialize;

use crate::belief::BeliefState;
use crate::vocabulary::PregnancyStage;

const UNSAFE_FOODS_PREGNANCY: &[&str] = &[
    "raw_milk",
    "unpasteurized_cheese",
    "raw_eggs",
    "high_mercury_fish",
    "pâté",
    "undercooked_meat",
    "alcohol",
    "raw_sprouts",
    "unwashed_vegetables",
];

/// Foods that may reduce milk supply.
const UNSAFE_FOODS_BREASTFEEDING: &[&str] =
    &["sage", "peppermint_tea_excess", "parsley_excess", "alcohol"];

const UNSAFE_MEDICATIONS: &[&str] = &[
    "aspirin",
    "ibuprofen",
    "naproxen",
    "warfarin",
    "retinol_high_dose",
    "methotrexate",
    "lisinopril",
    "ace_inhibitors",
];

const CRITICAL_SYMPTOMS: &[&str] = &[
    "severe_bleeding",
    "severe_abdominal_pain",
    "sudden_severe_headache",
    "vision_changes",
    "seizures",
    "loss_of_consciousness",
    "severe_allergic_reaction",
];

const WARNING_SYMPTOMS: &[&str] = &[
    "persistent_vomiting",
    "severe_dizziness",
    "swelling_with_headache",
    "chest_pain",
    "shortness_of_breath",
];

const TREATMENT_KEYWORDS: &[&str] = &["treat", "cure", "disease", "infection", "medicine"];
const PROMPT_MEDICAL_KEYWORDS: &[&str] =
    &["treat", "cure", "medicine", "dose", "prescribe", "diagnos"];

const ALERT_NUTRIENT_BELIEF: f64 = 0.2;
const ALERT_NUTRIENT_CONFIDENCE: f64 = 0.8;
const ALERT_FATIGUE_LEVEL: f64 = 0.3;

pub const MEDICATION_POLICY_REASON: &str =
    "System is not authorized to suggest medications. Recommend consulting doctor.";
pub const MEDICAL_TREATMENT_REASON: &str =
    "Cannot suggest medical treatment. Recommend doctor consultation.";
pub const INTENSE_EXERCISE_REASON: &str = "Intense exercise not recommended in third trimester";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum SafetyVerdict {
    Safe,
    /// Allowed, but worth surfacing to the user.
    Warning(String),
    Unsafe(String),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        !matches!(self, SafetyVerdict::Unsafe(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SafetyVerdict::Safe => None,
            SafetyVerdict::Warning(reason) | SafetyVerdict::Unsafe(reason) => Some(reason),
        }
    }
}

/// Violations and alerts collected during one decision cycle.
///
/// Created fresh for every cycle, so nothing leaks from one cycle into the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub violations: Vec<String>,
    pub alerts: Vec<String>,
}

impl SafetyReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty() && self.alerts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    Food,
    Lifestyle,
    Water,
    Rest,
}

/// Non-negotiable safety rules. The tables are fixed; nothing here is learned.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGuard;

impl SafetyGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn check_food_safety(
        &self,
        food: &str,
        stage: Option<PregnancyStage>,
        breastfeeding: bool,
        report: &mut SafetyReport,
    ) -> SafetyVerdict {
        let food_lower = food.to_lowercase();
        if stage.is_some_and(PregnancyStage::is_pregnant)
            && UNSAFE_FOODS_PREGNANCY.contains(&food_lower.as_str())
        {
            return violation(report, format!("{food} is not safe during pregnancy"));
        }
        if breastfeeding && UNSAFE_FOODS_BREASTFEEDING.contains(&food_lower.as_str()) {
            return violation(
                report,
                format!("{food} may affect milk supply during breastfeeding"),
            );
        }
        SafetyVerdict::Safe
    }

    /// Never `Safe`: medication is outside what the system may suggest.
    pub fn check_medication_safety(
        &self,
        medication: &str,
        report: &mut SafetyReport,
    ) -> SafetyVerdict {
        let med_lower = medication.to_lowercase();
        if UNSAFE_MEDICATIONS.contains(&med_lower.as_str()) {
            let reason = format!("SAFETY VIOLATION: Cannot suggest {medication} to pregnant women");
            tracing::error!(medication, "{reason}");
            return violation(report, reason);
        }
        tracing::warn!(medication, "medication suggestion attempt");
        SafetyVerdict::Unsafe(MEDICATION_POLICY_REASON.to_string())
    }

    pub fn check_critical_symptom(
        &self,
        symptom: &str,
        report: &mut SafetyReport,
    ) -> SafetyVerdict {
        let symptom_lower = symptom.to_lowercase();
        if CRITICAL_SYMPTOMS.contains(&symptom_lower.as_str()) {
            let alert = format!("CRITICAL: User reported {symptom}. ALERT MEDICAL PROFESSIONAL.");
            tracing::error!(symptom, "critical symptom reported");
            report.alerts.push(alert.clone());
            return SafetyVerdict::Unsafe(alert);
        }
        if WARNING_SYMPTOMS.contains(&symptom_lower.as_str()) {
            let alert = format!(
                "WARNING: User reported {symptom}. Monitor and suggest medical consultation."
            );
            tracing::warn!(symptom, "warning symptom reported");
            report.alerts.push(alert.clone());
            return SafetyVerdict::Warning(alert);
        }
        SafetyVerdict::Safe
    }

    pub fn check_suggestion_validity(
        &self,
        suggestion: &str,
        kind: SuggestionKind,
        stage: Option<PregnancyStage>,
        breastfeeding: bool,
        report: &mut SafetyReport,
    ) -> SafetyVerdict {
        let lower = suggestion.to_lowercase();
        if TREATMENT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return violation(report, MEDICAL_TREATMENT_REASON.to_string());
        }
        match kind {
            SuggestionKind::Food => {
                self.check_food_safety(suggestion, stage, breastfeeding, report)
            }
            SuggestionKind::Lifestyle
                if lower.contains("intense exercise")
                    && stage == Some(PregnancyStage::ThirdTrimester) =>
            {
                violation(report, INTENSE_EXERCISE_REASON.to_string())
            }
            _ => SafetyVerdict::Safe,
        }
    }

    /// Whole-state patterns that warrant a doctor, regardless of cooldown.
    pub fn scan_state_for_alerts(
        &self,
        state: &BeliefState,
        report: &mut SafetyReport,
    ) -> Option<String> {
        let mut alerts = Vec::new();

        let critical: Vec<&str> = state
            .nutrients()
            .filter(|(_, belief, confidence)| {
                *belief < ALERT_NUTRIENT_BELIEF && *confidence > ALERT_NUTRIENT_CONFIDENCE
            })
            .map(|(nutrient, _, _)| nutrient.as_str())
            .collect();
        if !critical.is_empty() {
            alerts.push(format!(
                "Multiple critical nutrients detected: {}. Suggest blood test and doctor consultation.",
                critical.join(", ")
            ));
        }

        let physical = state.physical();
        if physical.energy < ALERT_FATIGUE_LEVEL && physical.sleep_quality < ALERT_FATIGUE_LEVEL {
            alerts.push(
                "Persistent fatigue with poor sleep. Suggest doctor consultation.".to_string(),
            );
        }

        if alerts.is_empty() {
            return None;
        }
        let combined = alerts.join(" | ");
        tracing::warn!(alert = %combined, "state-based alert");
        report.alerts.push(combined.clone());
        Some(combined)
    }

    /// Conservative screen for text handed to a phrasing backend.
    pub fn is_prompt_safe(text: &str) -> bool {
        let lower = text.to_lowercase();
        !PROMPT_MEDICAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }
}

fn violation(report: &mut SafetyReport, reason: String) -> SafetyVerdict {
    report.violations.push(reason.clone());
    SafetyVerdict::Unsafe(reason)
}
