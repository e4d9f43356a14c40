use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::adaptation::AdaptationLearner;
use crate::belief::{BeliefState, LifeContext};
use crate::config::PolicyConfig;
use crate::memory::MemoryLog;
use crate::policy::{Decision, DecisionPolicy};
use crate::safety::SafetyGuard;
use crate::signals::{ContextFeatures, ParsedSignals, SensorSuite};
use crate::store::{SNAPSHOT_VERSION, UserSnapshot};
use crate::vocabulary::{ActionKind, FeedbackDirection, Outcome};

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub decision: Decision,
    /// Set when the decided action was logged to memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<Uuid>,
    /// Whether an outcome report in the input was linked to an action.
    pub outcome_recorded: bool,
}

/// Everything the core knows about one user, passed explicitly into each operation.
///
/// A session is not meant to be shared: callers run at most one cycle per
/// user at a time.
#[derive(Debug, Clone)]
pub struct UserSession {
    user_id: String,
    pub state: BeliefState,
    pub memory: MemoryLog,
    policy: DecisionPolicy,
    learner: AdaptationLearner,
}

impl UserSession {
    pub fn new(
        user_id: impl Into<String>,
        context: LifeContext,
        config: PolicyConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            state: BeliefState::with_context(context, now),
            memory: MemoryLog::new(user_id.clone(), now),
            user_id,
            policy: DecisionPolicy::new(config),
            learner: AdaptationLearner::new(),
        }
    }

    pub fn restore(snapshot: UserSnapshot, config: PolicyConfig) -> Self {
        Self {
            user_id: snapshot.user_id,
            state: snapshot.state,
            memory: snapshot.memory,
            policy: DecisionPolicy::new(config),
            learner: AdaptationLearner::new(),
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> UserSnapshot {
        UserSnapshot {
            version: SNAPSHOT_VERSION,
            user_id: self.user_id.clone(),
            saved_at: now,
            state: self.state.clone(),
            memory: self.memory.clone(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn learner(&self) -> &AdaptationLearner {
        &self.learner
    }

    /// One full cycle: absorb signals, decide once, log what was decided.
    pub fn run_cycle(
        &mut self,
        signals: &ParsedSignals,
        sensors: &SensorSuite,
        guard: &SafetyGuard,
        now: DateTime<Utc>,
    ) -> CycleReport {
        for symptom in &signals.symptoms {
            self.state.report_symptom(symptom, now);
        }
        self.state.apply_sentiment(signals.sentiment, now);

        let mut outcome_recorded = false;
        if let Some(report) = &signals.outcome_report {
            let open = self.memory.latest_open_action(&report.action).map(|record| record.id());
            match open {
                Some(action_id) => {
                    outcome_recorded =
                        self.record_outcome(action_id, report.outcome, report.text.clone(), now);
                }
                None => {
                    tracing::warn!(
                        action = %report.action,
                        "outcome report matches no open action"
                    );
                }
            }
        }

        let days_since_last_check = self
            .state
            .last_action_at()
            .map(|at| (now - at).num_days().max(0))
            .unwrap_or(0);
        let features = ContextFeatures::from_state(&self.state, days_since_last_check);
        sensors.absorb(&mut self.state, &features, now);

        let decision = self.policy.decide(&self.state, &self.memory, guard, now);

        let action_id = if decision.kind() == ActionKind::Observe {
            None
        } else {
            let id = self.memory.log_action(
                decision.kind(),
                decision.plan.log_text(),
                decision.rationale.clone(),
                decision.plan.targeted_nutrients(),
                now,
            );
            self.state.record_action(decision.kind(), now);
            Some(id)
        };

        CycleReport {
            decision,
            action_id,
            outcome_recorded,
        }
    }

    pub fn feedback(
        &mut self,
        nutrient: &str,
        direction: FeedbackDirection,
        now: DateTime<Utc>,
    ) -> bool {
        self.state.apply_user_feedback(nutrient, direction, now)
    }

    pub fn record_outcome(
        &mut self,
        action_id: Uuid,
        outcome: Outcome,
        outcome_text: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        self.learner.learn_from_outcome(
            &mut self.memory,
            action_id,
            outcome,
            outcome_text,
            Some(&mut self.state),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::UserSession;
    use crate::belief::LifeContext;
    use crate::config::PolicyConfig;
    use crate::policy::ActionPlan;
    use crate::safety::SafetyGuard;
    use crate::signals::{OutcomeReport, ParsedSignals, SensorSuite};
    use crate::vocabulary::{ActionKind, Nutrient, Outcome, PregnancyStage};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap()
    }

    fn session() -> UserSession {
        let context = LifeContext {
            stage: Some(PregnancyStage::SecondTrimester),
            breastfeeding: false,
            age: Some(31),
        };
        let mut session = UserSession::new("u1", context, PolicyConfig::default(), t0());
        session.state.set_belief(Nutrient::Iron, 0.35);
        session.state.set_confidence(Nutrient::Iron, 0.9);
        session
    }

    #[test]
    fn cycle_logs_the_decision_and_starts_cooldown() {
        let mut session = session();
        let guard = SafetyGuard::new();
        let sensors = SensorSuite::new();

        let first = session.run_cycle(&ParsedSignals::default(), &sensors, &guard, t0());
        assert_eq!(first.decision.kind(), ActionKind::SuggestFood);
        let id = first.action_id.unwrap();
        assert_eq!(session.memory.action(id).unwrap().text(), "spinach");
        assert_eq!(session.state.last_action_at(), Some(t0()));

        let second = session.run_cycle(&ParsedSignals::default(), &sensors, &guard, t0() + Duration::hours(2));
        assert_eq!(second.decision.kind(), ActionKind::Observe);
        assert!(second.action_id.is_none());
        assert_eq!(session.memory.actions().len(), 1);
        assert_eq!(session.state.last_action_at(), Some(t0()));
    }

    #[test]
    fn outcome_report_links_to_open_action() {
        let mut session = session();
        let guard = SafetyGuard::new();
        let sensors = SensorSuite::new();
        session.run_cycle(&ParsedSignals::default(), &sensors, &guard, t0());

        let signals = ParsedSignals {
            outcome_report: Some(OutcomeReport {
                action: "Spinach".into(),
                outcome: Outcome::Negative,
                text: Some("made me queasy".into()),
            }),
            ..ParsedSignals::default()
        };
        let next_day = t0() + Duration::days(1);
        let report = session.run_cycle(&signals, &sensors, &guard, next_day);

        assert!(report.outcome_recorded);
        assert!(session.memory.should_avoid("spinach"));
        assert!((session.state.confidence(Nutrient::Iron) - 0.8).abs() < 1e-9);
        match report.decision.plan {
            ActionPlan::SuggestFood { food, .. } => assert_ne!(food, "spinach"),
            other => panic!("expected food suggestion, got {other:?}"),
        }
    }

    #[test]
    fn critical_symptom_in_signals_escalates_during_cooldown() {
        let mut session = session();
        let guard = SafetyGuard::new();
        let sensors = SensorSuite::new();
        session.run_cycle(&ParsedSignals::default(), &sensors, &guard, t0());

        let signals = ParsedSignals {
            symptoms: vec!["severe_bleeding".into()],
            ..ParsedSignals::default()
        };
        let report = session.run_cycle(&signals, &sensors, &guard, t0() + Duration::hours(1));
        assert_eq!(report.decision.kind(), ActionKind::AlertMedical);
        assert!(report.action_id.is_some());
    }

    #[test]
    fn snapshot_restores_an_equivalent_session() {
        let mut session = session();
        let guard = SafetyGuard::new();
        session.run_cycle(&ParsedSignals::default(), &SensorSuite::new(), &guard, t0());

        let snapshot = session.snapshot(t0());
        let restored = UserSession::restore(snapshot.clone(), PolicyConfig::default());
        assert_eq!(restored.user_id(), "u1");
        assert_eq!(restored.snapshot(t0()), snapshot);
    }

    #[test]
    fn unmatched_outcome_report_is_ignored() {
        let mut session = session();
        let signals = ParsedSignals {
            outcome_report: Some(OutcomeReport {
                action: "kale".into(),
                outcome: Outcome::Positive,
                text: None,
            }),
            ..ParsedSignals::default()
        };
        let report = session.run_cycle(&signals, &SensorSuite::new(), &SafetyGuard::new(), t0());
        assert!(!report.outcome_recorded);
        assert!(session.learner().trail().is_empty());
    }
}
