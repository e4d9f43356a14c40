use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::belief::{BeliefState, MIN_CONFIDENCE_TO_ACT};
use crate::config::PolicyConfig;
use crate::knowledge;
use crate::memory::MemoryLog;
use crate::safety::{SafetyGuard, SafetyReport};
use crate::vocabulary::{ActionKind, Nutrient};

pub const CRITICAL_THRESHOLD: f64 = 0.25;
pub const LOW_THRESHOLD: f64 = 0.40;

const REST_ENERGY_BELOW: f64 = 0.4;
const REST_SLEEP_BELOW: f64 = 0.5;
const WATER_HYDRATION_BELOW: f64 = 0.4;
const WATER_GLASSES: u32 = 3;

/// Most recent decisions kept for audit.
const DECISION_LOG_CAPACITY: usize = 500;

pub const DEFAULT_CHECK_IN_QUESTION: &str = "How are you feeling today?";

/// The one action chosen for a cycle, with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionPlan {
    AlertMedical {
        alert: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symptom: Option<String>,
    },
    Observe {
        reason: String,
    },
    SuggestFood {
        nutrient: Nutrient,
        food: String,
        reason: String,
    },
    SuggestRest {
        suggestion: String,
    },
    SuggestWater {
        glasses: u32,
        timing: String,
    },
    CheckIn {
        question: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nutrient: Option<Nutrient>,
    },
}

impl ActionPlan {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPlan::AlertMedical { .. } => ActionKind::AlertMedical,
            ActionPlan::Observe { .. } => ActionKind::Observe,
            ActionPlan::SuggestFood { .. } => ActionKind::SuggestFood,
            ActionPlan::SuggestRest { .. } => ActionKind::SuggestRest,
            ActionPlan::SuggestWater { .. } => ActionKind::SuggestWater,
            ActionPlan::CheckIn { .. } => ActionKind::CheckIn,
        }
    }

    /// Text stored in the memory log. For food this is the bare food id,
    /// which is what failure and recency checks match against.
    pub fn log_text(&self) -> String {
        match self {
            ActionPlan::AlertMedical { alert, .. } => alert.clone(),
            ActionPlan::Observe { reason } => reason.clone(),
            ActionPlan::SuggestFood { food, .. } => food.clone(),
            ActionPlan::SuggestRest { suggestion } => suggestion.clone(),
            ActionPlan::SuggestWater { glasses, timing } => {
                format!("{glasses} glasses of water {timing}")
            }
            ActionPlan::CheckIn { question, .. } => question.clone(),
        }
    }

    pub fn targeted_nutrients(&self) -> Vec<Nutrient> {
        match self {
            ActionPlan::SuggestFood { nutrient, .. } => vec![*nutrient],
            ActionPlan::CheckIn {
                nutrient: Some(nutrient),
                ..
            } => vec![*nutrient],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub plan: ActionPlan,
    pub rationale: String,
    /// Alerts and violations raised while deciding.
    pub safety: SafetyReport,
}

impl Decision {
    pub fn kind(&self) -> ActionKind {
        self.plan.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub decided_at: DateTime<Utc>,
    pub kind: ActionKind,
    pub plan: ActionPlan,
    pub rationale: String,
}

/// Picks exactly one action per cycle from belief, memory and safety rules.
///
/// Evaluation is a fixed priority ladder that stops at the first match:
/// state alert, critical symptom, rate limit, pressing nutrient, lifestyle,
/// then a generic check-in. Given the same inputs and `now` the result is
/// always the same.
#[derive(Debug, Clone, Default)]
pub struct DecisionPolicy {
    config: PolicyConfig,
    decisions: Vec<DecisionRecord>,
}

impl DecisionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            decisions: Vec::new(),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    pub fn decide(
        &mut self,
        state: &BeliefState,
        memory: &MemoryLog,
        guard: &SafetyGuard,
        now: DateTime<Utc>,
    ) -> Decision {
        let mut report = SafetyReport::default();
        let (plan, rationale) = self.evaluate(state, memory, guard, &mut report, now);
        let decision = Decision {
            plan,
            rationale,
            safety: report,
        };
        self.record(&decision, now);
        decision
    }

    fn evaluate(
        &self,
        state: &BeliefState,
        memory: &MemoryLog,
        guard: &SafetyGuard,
        report: &mut SafetyReport,
        now: DateTime<Utc>,
    ) -> (ActionPlan, String) {
        if let Some(alert) = guard.scan_state_for_alerts(state, report) {
            return (
                ActionPlan::AlertMedical {
                    alert,
                    symptom: None,
                },
                "Critical state detected. Medical consultation needed.".to_string(),
            );
        }

        for symptom in state.symptoms() {
            let verdict = guard.check_critical_symptom(symptom, report);
            if !verdict.is_safe() {
                return (
                    ActionPlan::AlertMedical {
                        alert: verdict.reason().unwrap_or_default().to_string(),
                        symptom: Some(symptom.clone()),
                    },
                    format!("Critical symptom: {symptom}"),
                );
            }
        }

        if self.within_rate_limit(state, now) {
            return (
                ActionPlan::Observe {
                    reason: "No urgent action needed".to_string(),
                },
                "System observing. No action needed today.".to_string(),
            );
        }

        if let Some(nutrient) = pressing_nutrient(state) {
            return self.suggest_for_nutrient(nutrient, state, memory, guard, report, now);
        }

        if let Some(lifestyle) = suggest_lifestyle(state) {
            return lifestyle;
        }

        (
            ActionPlan::CheckIn {
                question: DEFAULT_CHECK_IN_QUESTION.to_string(),
                nutrient: None,
            },
            "Regular check-in to understand current state.".to_string(),
        )
    }

    fn within_rate_limit(&self, state: &BeliefState, now: DateTime<Utc>) -> bool {
        state
            .last_action_at()
            .is_some_and(|last| now - last <= Duration::hours(self.config.rate_limit_hours))
    }

    /// Bounded linear scan over the nutrient's candidate foods.
    fn suggest_for_nutrient(
        &self,
        nutrient: Nutrient,
        state: &BeliefState,
        memory: &MemoryLog,
        guard: &SafetyGuard,
        report: &mut SafetyReport,
        now: DateTime<Utc>,
    ) -> (ActionPlan, String) {
        let known = knowledge::foods_for_nutrient(nutrient);
        let proven: Vec<String> = memory
            .successful_patterns()
            .into_iter()
            .map(|pattern| pattern.text)
            .filter(|text| known.contains(&text.as_str()))
            .collect();
        let candidates = proven.iter().map(String::as_str).chain(
            known
                .iter()
                .copied()
                .filter(|food| !proven.iter().any(|p| p == food)),
        );

        for food in candidates {
            if memory.should_avoid(food) {
                continue;
            }
            if memory.was_recently_suggested(food, self.config.recent_window_days, now) {
                continue;
            }
            let verdict = guard.check_food_safety(
                food,
                state.context.stage,
                state.context.breastfeeding,
                report,
            );
            if !verdict.is_safe() {
                tracing::warn!(
                    food,
                    nutrient = %nutrient,
                    reason = verdict.reason(),
                    "candidate failed safety check"
                );
                continue;
            }
            return (
                ActionPlan::SuggestFood {
                    nutrient,
                    food: food.to_string(),
                    reason: format!("Your {nutrient} levels seem low"),
                },
                format!("Suggesting {food} to address {nutrient}"),
            );
        }

        (
            ActionPlan::CheckIn {
                question: format!("How have you been feeling about your {nutrient} intake?"),
                nutrient: Some(nutrient),
            },
            format!("No safe food candidates left for {nutrient}. Need user feedback."),
        )
    }

    fn record(&mut self, decision: &Decision, now: DateTime<Utc>) {
        tracing::info!(
            kind = %decision.kind(),
            rationale = %decision.rationale,
            alerts = decision.safety.alerts.len(),
            violations = decision.safety.violations.len(),
            "decision made"
        );
        if self.decisions.len() >= DECISION_LOG_CAPACITY {
            self.decisions.remove(0);
        }
        self.decisions.push(DecisionRecord {
            decided_at: now,
            kind: decision.kind(),
            plan: decision.plan.clone(),
            rationale: decision.rationale.clone(),
        });
    }
}

/// Lowest confident belief among critical nutrients, else among low ones.
/// Ties keep nutrient declaration order.
fn pressing_nutrient(state: &BeliefState) -> Option<Nutrient> {
    let confident: Vec<(Nutrient, f64)> = state
        .nutrients()
        .filter(|(_, _, confidence)| *confidence > MIN_CONFIDENCE_TO_ACT)
        .map(|(nutrient, belief, _)| (nutrient, belief))
        .collect();

    let lowest = |band: &dyn Fn(f64) -> bool| {
        let mut matches: Vec<(Nutrient, f64)> =
            confident.iter().copied().filter(|(_, belief)| band(*belief)).collect();
        matches.sort_by(|a, b| a.1.total_cmp(&b.1));
        matches.first().map(|(nutrient, _)| *nutrient)
    };

    lowest(&|belief| belief < CRITICAL_THRESHOLD)
        .or_else(|| lowest(&|belief| (CRITICAL_THRESHOLD..LOW_THRESHOLD).contains(&belief)))
}

fn suggest_lifestyle(state: &BeliefState) -> Option<(ActionPlan, String)> {
    let physical = state.physical();
    if physical.energy < REST_ENERGY_BELOW && physical.sleep_quality < REST_SLEEP_BELOW {
        return Some((
            ActionPlan::SuggestRest {
                suggestion: "Try to get more sleep tonight".to_string(),
            },
            "Low energy and poor sleep detected".to_string(),
        ));
    }
    if physical.hydration < WATER_HYDRATION_BELOW {
        return Some((
            ActionPlan::SuggestWater {
                glasses: WATER_GLASSES,
                timing: "throughout the day".to_string(),
            },
            "Hydration levels low".to_string(),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{ActionPlan, DEFAULT_CHECK_IN_QUESTION, DecisionPolicy};
    use crate::belief::{BeliefState, PhysicalMetric};
    use crate::config::PolicyConfig;
    use crate::knowledge::foods_for_nutrient;
    use crate::memory::MemoryLog;
    use crate::safety::SafetyGuard;
    use crate::vocabulary::{ActionKind, Nutrient, Outcome, PregnancyStage};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn setup() -> (DecisionPolicy, BeliefState, MemoryLog, SafetyGuard) {
        (
            DecisionPolicy::new(PolicyConfig::default()),
            BeliefState::new(t0()),
            MemoryLog::new("u1", t0()),
            SafetyGuard::new(),
        )
    }

    fn low_iron(state: &mut BeliefState) {
        state.set_belief(Nutrient::Iron, 0.35);
        state.set_confidence(Nutrient::Iron, 0.9);
    }

    fn chosen_food(plan: &ActionPlan) -> Option<&str> {
        match plan {
            ActionPlan::SuggestFood { food, .. } => Some(food),
            _ => None,
        }
    }

    #[test]
    fn very_low_confident_iron_escalates() {
        let (mut policy, mut state, memory, guard) = setup();
        state.set_belief(Nutrient::Iron, 0.15);
        state.set_confidence(Nutrient::Iron, 0.85);

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(decision.kind(), ActionKind::AlertMedical);
        assert_eq!(decision.safety.alerts.len(), 1);
    }

    #[test]
    fn low_iron_suggests_food_from_iron_list() {
        let (mut policy, mut state, memory, guard) = setup();
        low_iron(&mut state);

        let decision = policy.decide(&state, &memory, &guard, t0());
        match &decision.plan {
            ActionPlan::SuggestFood { nutrient, food, reason } => {
                assert_eq!(*nutrient, Nutrient::Iron);
                assert!(foods_for_nutrient(Nutrient::Iron).contains(&food.as_str()));
                assert_eq!(food, "spinach");
                assert_eq!(reason, "Your iron levels seem low");
            }
            other => panic!("expected food suggestion, got {other:?}"),
        }
        assert_eq!(decision.rationale, "Suggesting spinach to address iron");
    }

    #[test]
    fn failed_food_is_never_suggested_again() {
        let (mut policy, mut state, mut memory, guard) = setup();
        low_iron(&mut state);
        let id = memory.log_action(
            ActionKind::SuggestFood,
            "spinach",
            "test",
            vec![Nutrient::Folic],
            t0() - Duration::days(30),
        );
        memory.record_outcome(id, Outcome::Negative, None, t0() - Duration::days(29));

        for day in 0..5 {
            let decision = policy.decide(&state, &memory, &guard, t0() + Duration::days(day));
            assert_ne!(chosen_food(&decision.plan), Some("spinach"));
        }

        state.set_belief(Nutrient::Iron, 0.9);
        state.set_belief(Nutrient::Folic, 0.3);
        state.set_confidence(Nutrient::Folic, 0.95);
        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(chosen_food(&decision.plan), Some("broccoli"));
    }

    #[test]
    fn recent_action_means_observe_even_when_low() {
        let (mut policy, mut state, memory, guard) = setup();
        low_iron(&mut state);
        state.record_action(ActionKind::SuggestFood, t0());

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(decision.kind(), ActionKind::Observe);

        let at_limit = policy.decide(&state, &memory, &guard, t0() + Duration::hours(20));
        assert_eq!(at_limit.kind(), ActionKind::Observe);

        let after = policy.decide(&state, &memory, &guard, t0() + Duration::hours(21));
        assert_eq!(after.kind(), ActionKind::SuggestFood);
    }

    #[test]
    fn alerts_bypass_rate_limit() {
        let (mut policy, mut state, memory, guard) = setup();
        state.record_action(ActionKind::CheckIn, t0());
        state.report_symptom("Vision_Changes", t0());

        let decision = policy.decide(&state, &memory, &guard, t0());
        match decision.plan {
            ActionPlan::AlertMedical { symptom, .. } => {
                assert_eq!(symptom.as_deref(), Some("vision_changes"))
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn warning_symptom_does_not_escalate() {
        let (mut policy, mut state, memory, guard) = setup();
        state.report_symptom("chest_pain", t0());

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(decision.kind(), ActionKind::CheckIn);
        assert_eq!(decision.safety.alerts.len(), 1);
    }

    #[test]
    fn lowest_belief_wins_and_ties_keep_order() {
        let (mut policy, mut state, memory, guard) = setup();
        for (nutrient, belief) in [
            (Nutrient::Calcium, 0.22),
            (Nutrient::Protein, 0.21),
            (Nutrient::Iodine, 0.21),
        ] {
            state.set_belief(nutrient, belief);
            state.set_confidence(nutrient, 0.75);
        }

        let decision = policy.decide(&state, &memory, &guard, t0());
        match decision.plan {
            ActionPlan::SuggestFood { nutrient, .. } => assert_eq!(nutrient, Nutrient::Protein),
            other => panic!("expected food suggestion, got {other:?}"),
        }
    }

    #[test]
    fn critical_band_beats_low_band() {
        let (mut policy, mut state, memory, guard) = setup();
        state.set_belief(Nutrient::Iron, 0.26);
        state.set_confidence(Nutrient::Iron, 0.9);
        state.set_belief(Nutrient::Iodine, 0.24);
        state.set_confidence(Nutrient::Iodine, 0.75);

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(decision.plan.targeted_nutrients(), vec![Nutrient::Iodine]);
    }

    #[test]
    fn unconfident_beliefs_are_not_acted_on() {
        let (mut policy, mut state, memory, guard) = setup();
        state.set_belief(Nutrient::Iron, 0.1);
        state.set_confidence(Nutrient::Iron, 0.7);

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(
            decision.plan,
            ActionPlan::CheckIn {
                question: DEFAULT_CHECK_IN_QUESTION.to_string(),
                nutrient: None,
            }
        );
    }

    #[test]
    fn proven_food_is_tried_first() {
        let (mut policy, mut state, mut memory, guard) = setup();
        low_iron(&mut state);
        let earlier = t0() - Duration::days(10);
        let id = memory.log_action(ActionKind::SuggestFood, "lentils", "test", vec![Nutrient::Iron], earlier);
        memory.record_outcome(id, Outcome::Positive, None, earlier);

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(chosen_food(&decision.plan), Some("lentils"));
    }

    #[test]
    fn recently_suggested_food_is_skipped() {
        let (mut policy, mut state, mut memory, guard) = setup();
        low_iron(&mut state);
        memory.log_action(
            ActionKind::SuggestFood,
            "spinach",
            "test",
            vec![Nutrient::Iron],
            t0() - Duration::days(1),
        );

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(chosen_food(&decision.plan), Some("red_meat"));
    }

    #[test]
    fn exhausted_candidates_fall_back_to_nutrient_check_in() {
        let (mut policy, mut state, mut memory, guard) = setup();
        state.context.stage = Some(PregnancyStage::SecondTrimester);
        low_iron(&mut state);
        for food in foods_for_nutrient(Nutrient::Iron) {
            memory.add_contraindication(food, "test", t0());
        }

        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(
            decision.plan,
            ActionPlan::CheckIn {
                question: "How have you been feeling about your iron intake?".to_string(),
                nutrient: Some(Nutrient::Iron),
            }
        );
    }

    #[test]
    fn lifestyle_fallbacks_in_order() {
        let (mut policy, mut state, memory, guard) = setup();
        state.set_physical(PhysicalMetric::Energy, 0.35, t0());
        state.set_physical(PhysicalMetric::SleepQuality, 0.45, t0());
        state.set_physical(PhysicalMetric::Hydration, 0.2, t0());
        assert_eq!(policy.decide(&state, &memory, &guard, t0()).kind(), ActionKind::SuggestRest);

        state.set_physical(PhysicalMetric::SleepQuality, 0.8, t0());
        let decision = policy.decide(&state, &memory, &guard, t0());
        assert_eq!(
            decision.plan,
            ActionPlan::SuggestWater {
                glasses: 3,
                timing: "throughout the day".to_string(),
            }
        );
    }

    #[test]
    fn every_decision_is_audited() {
        let (mut policy, state, memory, guard) = setup();
        policy.decide(&state, &memory, &guard, t0());
        policy.decide(&state, &memory, &guard, t0() + Duration::hours(1));
        assert_eq!(policy.decisions().len(), 2);
        assert_eq!(policy.decisions()[1].decided_at, t0() + Duration::hours(1));
    }

    #[test]
    fn restored_copies_decide_identically() {
        let (mut policy, mut state, mut memory, guard) = setup();
        low_iron(&mut state);
        let id = memory.log_action(
            ActionKind::SuggestFood,
            "spinach",
            "test",
            vec![Nutrient::Iron],
            t0() - Duration::days(5),
        );
        memory.record_outcome(id, Outcome::Negative, None, t0() - Duration::days(5));

        let state_copy: BeliefState =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        let memory_copy: MemoryLog =
            serde_json::from_str(&serde_json::to_string(&memory).unwrap()).unwrap();

        let original = policy.decide(&state, &memory, &guard, t0());
        let restored = policy.decide(&state_copy, &memory_copy, &guard, t0());
        assert_eq!(original.plan, restored.plan);
    }

    #[test]
    fn plan_serializes_with_action_tag() {
        let plan = ActionPlan::SuggestFood {
            nutrient: Nutrient::VitaminB12,
            food: "eggs".into(),
            reason: "Your vitamin_b12 levels seem low".into(),
        };
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["action"], "suggest_food");
        assert_eq!(value["nutrient"], "vitamin_b12");
    }
}
