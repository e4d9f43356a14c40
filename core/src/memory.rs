use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::vocabulary::{ActionKind, Nutrient, Outcome};

pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 3;
const SUMMARY_WINDOW_DAYS: i64 = 7;

/// One logged unit of system behavior.
///
/// Identity, timestamp, kind, text and targets are fixed at creation;
/// only the outcome fields are filled, once, later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    kind: ActionKind,
    text: String,
    rationale: String,
    #[serde(default)]
    targeted_nutrients: Vec<Nutrient>,
    #[serde(default)]
    outcome: Option<Outcome>,
    #[serde(default)]
    outcome_text: Option<String>,
    #[serde(default)]
    outcome_recorded_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn targeted_nutrients(&self) -> &[Nutrient] {
        &self.targeted_nutrients
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn outcome_text(&self) -> Option<&str> {
        self.outcome_text.as_deref()
    }

    pub fn outcome_recorded_at(&self) -> Option<DateTime<Utc>> {
        self.outcome_recorded_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCount {
    pub text: String,
    pub count: u32,
}

/// Ground-truth log of what was tried for one user and how it went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLog {
    user_id: String,
    #[serde(deserialize_with = "readable_actions")]
    actions: Vec<ActionRecord>,
    #[serde(default)]
    failure_counts: Vec<PatternCount>,
    #[serde(default)]
    success_counts: Vec<PatternCount>,
    #[serde(default)]
    dislikes: BTreeSet<String>,
    #[serde(default)]
    contraindications: BTreeSet<String>,
    #[serde(default)]
    allergies: BTreeSet<String>,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
}

impl MemoryLog {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            actions: Vec::new(),
            failure_counts: Vec::new(),
            success_counts: Vec::new(),
            dislikes: BTreeSet::new(),
            contraindications: BTreeSet::new(),
            allergies: BTreeSet::new(),
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn dislikes(&self) -> &BTreeSet<String> {
        &self.dislikes
    }

    pub fn contraindications(&self) -> &BTreeSet<String> {
        &self.contraindications
    }

    pub fn allergies(&self) -> &BTreeSet<String> {
        &self.allergies
    }

    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    pub fn log_action(
        &mut self,
        kind: ActionKind,
        text: impl Into<String>,
        rationale: impl Into<String>,
        targeted_nutrients: Vec<Nutrient>,
        now: DateTime<Utc>,
    ) -> Uuid {
        let record = ActionRecord {
            id: Uuid::now_v7(),
            created_at: now,
            kind,
            text: text.into(),
            rationale: rationale.into(),
            targeted_nutrients,
            outcome: None,
            outcome_text: None,
            outcome_recorded_at: None,
        };
        let id = record.id;
        tracing::info!(action_id = %id, kind = %kind, text = %record.text, "action logged");
        self.actions.push(record);
        self.last_updated_at = now;
        id
    }

    /// Attach an outcome to a logged action.
    ///
    /// Returns `false` when the id is unknown or the outcome is already set.
    pub fn record_outcome(
        &mut self,
        id: Uuid,
        outcome: Outcome,
        outcome_text: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(record) = self.actions.iter_mut().find(|record| record.id == id) else {
            tracing::warn!(action_id = %id, "outcome for unknown action ignored");
            return false;
        };
        if record.outcome.is_some() {
            tracing::warn!(action_id = %id, "outcome already recorded; ignoring");
            return false;
        }

        record.outcome = Some(outcome);
        record.outcome_text = outcome_text;
        record.outcome_recorded_at = Some(now);
        let text = record.text.clone();

        match outcome {
            Outcome::Positive => {
                bump(&mut self.success_counts, &text);
                tracing::info!(action_id = %id, text = %text, "suggestion worked");
            }
            Outcome::Negative => {
                bump(&mut self.failure_counts, &text);
                tracing::info!(action_id = %id, text = %text, "suggestion failed");
                self.dislikes.insert(text);
            }
            Outcome::Neutral | Outcome::Unknown => {}
        }
        self.last_updated_at = now;
        true
    }

    /// Any prior failure, dislike or contraindication rules a suggestion out.
    pub fn should_avoid(&self, text: &str) -> bool {
        self.dislikes.contains(text)
            || self.contraindications.contains(&text.to_lowercase())
            || self.failure_counts.iter().any(|pattern| pattern.text == text)
    }

    /// Case-insensitive substring match over actions inside the window.
    ///
    /// Actions are time-ordered, so the backward scan stops at the first
    /// record older than the cutoff.
    pub fn was_recently_suggested(&self, text: &str, window_days: i64, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::days(window_days);
        let needle = text.to_lowercase();
        for record in self.actions.iter().rev() {
            if record.created_at < cutoff {
                break;
            }
            if record.text.to_lowercase().contains(&needle) {
                return true;
            }
        }
        false
    }

    pub fn successful_patterns(&self) -> Vec<PatternCount> {
        ranked(&self.success_counts)
    }

    pub fn failed_patterns(&self) -> Vec<PatternCount> {
        ranked(&self.failure_counts)
    }

    pub fn success_count(&self, text: &str) -> u32 {
        count_of(&self.success_counts, text)
    }

    pub fn failure_count(&self, text: &str) -> u32 {
        count_of(&self.failure_counts, text)
    }

    pub fn action(&self, id: Uuid) -> Option<&ActionRecord> {
        self.actions.iter().find(|record| record.id == id)
    }

    pub fn recent_actions(&self, days: i64, now: DateTime<Utc>) -> Vec<&ActionRecord> {
        let cutoff = now - Duration::days(days);
        self.actions
            .iter()
            .filter(|record| record.created_at >= cutoff)
            .collect()
    }

    /// Most recent action with this exact text (ignoring case) still awaiting an outcome.
    pub fn latest_open_action(&self, text: &str) -> Option<&ActionRecord> {
        let needle = text.trim().to_lowercase();
        self.actions
            .iter()
            .rev()
            .find(|record| record.outcome.is_none() && record.text.to_lowercase() == needle)
    }

    /// Count of logged actions whose text contains `text`, ignoring case.
    pub fn times_suggested(&self, text: &str) -> usize {
        let needle = text.to_lowercase();
        self.actions
            .iter()
            .filter(|record| record.text.to_lowercase().contains(&needle))
            .count()
    }

    pub fn add_contraindication(&mut self, item: &str, reason: &str, now: DateTime<Utc>) {
        let item = item.trim().to_lowercase();
        tracing::info!(item = %item, reason, "contraindication added");
        self.contraindications.insert(item);
        self.last_updated_at = now;
    }

    pub fn add_allergy(&mut self, allergen: &str, now: DateTime<Utc>) {
        let allergen = allergen.trim().to_lowercase();
        tracing::info!(allergen = %allergen, "allergy recorded");
        self.allergies.insert(allergen.clone());
        self.contraindications.insert(allergen);
        self.last_updated_at = now;
    }

    /// Recompute outcome-derived indices from the action log.
    /// Contraindications and allergies are explicit and kept as they are.
    pub fn rebuild_indices(&mut self) {
        self.success_counts.clear();
        self.failure_counts.clear();
        self.dislikes.clear();
        for record in &self.actions {
            match record.outcome {
                Some(Outcome::Positive) => bump(&mut self.success_counts, &record.text),
                Some(Outcome::Negative) => {
                    bump(&mut self.failure_counts, &record.text);
                    self.dislikes.insert(record.text.clone());
                }
                _ => {}
            }
        }
    }

    pub fn summary(&self, now: DateTime<Utc>) -> MemorySummary {
        MemorySummary {
            user_id: self.user_id.clone(),
            total_actions: self.actions.len(),
            actions_last_7_days: self.recent_actions(SUMMARY_WINDOW_DAYS, now).len(),
            successful_patterns: self.successful_patterns(),
            failed_patterns: self.failed_patterns(),
            dislikes: self.dislikes.iter().cloned().collect(),
            contraindications: self.contraindications.iter().cloned().collect(),
            allergies: self.allergies.iter().cloned().collect(),
            last_updated_at: self.last_updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySummary {
    pub user_id: String,
    pub total_actions: usize,
    pub actions_last_7_days: usize,
    pub successful_patterns: Vec<PatternCount>,
    pub failed_patterns: Vec<PatternCount>,
    pub dislikes: Vec<String>,
    pub contraindications: Vec<String>,
    pub allergies: Vec<String>,
    pub last_updated_at: DateTime<Utc>,
}

fn bump(counts: &mut Vec<PatternCount>, text: &str) {
    match counts.iter_mut().find(|pattern| pattern.text == text) {
        Some(pattern) => pattern.count += 1,
        None => counts.push(PatternCount {
            text: text.to_string(),
            count: 1,
        }),
    }
}

fn count_of(counts: &[PatternCount], text: &str) -> u32 {
    counts
        .iter()
        .find(|pattern| pattern.text == text)
        .map(|pattern| pattern.count)
        .unwrap_or(0)
}

/// Count descending; `sort_by` is stable so ties keep insertion order.
fn ranked(counts: &[PatternCount]) -> Vec<PatternCount> {
    let mut out = counts.to_vec();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// Restore the action log, skipping individual records that fail to parse.
fn readable_actions<'de, D>(deserializer: D) -> Result<Vec<ActionRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let mut actions = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<ActionRecord>(value) {
            Ok(record) => actions.push(record),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed action record");
            }
        }
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::MemoryLog;
    use crate::vocabulary::{ActionKind, Nutrient, Outcome};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn suggest(memory: &mut MemoryLog, food: &str, at: DateTime<Utc>) -> uuid::Uuid {
        memory.log_action(
            ActionKind::SuggestFood,
            food,
            "test",
            vec![Nutrient::Iron],
            at,
        )
    }

    #[test]
    fn outcome_can_only_be_recorded_once() {
        let mut memory = MemoryLog::new("u1", t0());
        let id = suggest(&mut memory, "spinach", t0());

        assert!(memory.record_outcome(id, Outcome::Positive, None, t0()));
        assert!(!memory.record_outcome(id, Outcome::Positive, None, t0()));
        assert!(!memory.record_outcome(id, Outcome::Negative, None, t0()));

        assert_eq!(memory.success_count("spinach"), 1);
        assert_eq!(memory.failure_count("spinach"), 0);
        assert!(!memory.should_avoid("spinach"));
    }

    #[test]
    fn unknown_action_id_reports_failure() {
        let mut memory = MemoryLog::new("u1", t0());
        assert!(!memory.record_outcome(uuid::Uuid::now_v7(), Outcome::Positive, None, t0()));
    }

    #[test]
    fn negative_outcome_marks_dislike_and_failure() {
        let mut memory = MemoryLog::new("u1", t0());
        let id = suggest(&mut memory, "spinach", t0());
        assert!(memory.record_outcome(id, Outcome::Negative, Some("upset stomach".into()), t0()));

        assert!(memory.dislikes().contains("spinach"));
        assert_eq!(memory.failure_count("spinach"), 1);
        assert!(memory.should_avoid("spinach"));
        let record = memory.action(id).unwrap();
        assert_eq!(record.outcome_text(), Some("upset stomach"));
        assert_eq!(record.outcome_recorded_at(), Some(t0()));
    }

    #[test]
    fn neutral_outcome_leaves_indices_alone() {
        let mut memory = MemoryLog::new("u1", t0());
        let id = suggest(&mut memory, "milk", t0());
        assert!(memory.record_outcome(id, Outcome::Neutral, None, t0()));
        assert!(memory.failed_patterns().is_empty());
        assert!(memory.successful_patterns().is_empty());
        assert!(memory.dislikes().is_empty());
    }

    #[test]
    fn contraindications_and_allergies_are_lower_cased() {
        let mut memory = MemoryLog::new("u1", t0());
        memory.add_contraindication("Raw_Milk", "food safety", t0());
        memory.add_allergy("Peanuts", t0());

        assert!(memory.should_avoid("raw_milk"));
        assert!(memory.should_avoid("PEANUTS"));
        assert!(memory.allergies().contains("peanuts"));
        assert!(memory.contraindications().contains("peanuts"));
    }

    #[test]
    fn recency_scan_respects_window() {
        let mut memory = MemoryLog::new("u1", t0());
        suggest(&mut memory, "lentils", t0());
        suggest(&mut memory, "Red_Meat", t0() + Duration::days(4));

        let now = t0() + Duration::days(5);
        assert!(memory.was_recently_suggested("red_meat", 3, now));
        assert!(!memory.was_recently_suggested("lentils", 3, now));
        assert!(memory.was_recently_suggested("lentils", 6, now));
    }

    #[test]
    fn patterns_rank_by_count_then_insertion() {
        let mut memory = MemoryLog::new("u1", t0());
        for (food, outcome) in [
            ("eggs", Outcome::Positive),
            ("milk", Outcome::Positive),
            ("milk", Outcome::Positive),
            ("yogurt", Outcome::Positive),
        ] {
            let id = suggest(&mut memory, food, t0());
            memory.record_outcome(id, outcome, None, t0());
        }

        let ranked: Vec<_> = memory
            .successful_patterns()
            .into_iter()
            .map(|p| (p.text, p.count))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("milk".to_string(), 2),
                ("eggs".to_string(), 1),
                ("yogurt".to_string(), 1),
            ]
        );
    }

    #[test]
    fn latest_open_action_skips_closed_records() {
        let mut memory = MemoryLog::new("u1", t0());
        let first = suggest(&mut memory, "dates", t0());
        let second = suggest(&mut memory, "dates", t0() + Duration::hours(1));
        assert_eq!(memory.latest_open_action("Dates").map(|r| r.id()), Some(second));

        memory.record_outcome(second, Outcome::Positive, None, t0());
        assert_eq!(memory.latest_open_action("dates").map(|r| r.id()), Some(first));
    }

    #[test]
    fn rebuild_recovers_outcome_indices() {
        let mut memory = MemoryLog::new("u1", t0());
        let id = suggest(&mut memory, "fish", t0());
        memory.record_outcome(id, Outcome::Negative, None, t0());
        memory.add_allergy("shellfish", t0());

        let expected = memory.clone();
        memory.rebuild_indices();
        assert_eq!(memory, expected);
    }

    #[test]
    fn malformed_action_records_are_skipped_on_load() {
        let mut memory = MemoryLog::new("u1", t0());
        suggest(&mut memory, "eggs", t0());
        let mut value = serde_json::to_value(&memory).unwrap();
        value["actions"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"id": "not-a-uuid", "kind": "shout"}));

        let restored: MemoryLog = serde_json::from_value(value).unwrap();
        assert_eq!(restored.actions().len(), 1);
        assert_eq!(restored.actions()[0].text(), "eggs");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_at(level: tracing::Level, run: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, run);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn boundary_updates_log_below_warn() {
        let mut memory = MemoryLog::new("u1", t0());
        let quiet = logged_at(tracing::Level::WARN, || {
            memory.add_contraindication("Liver", "vitamin A", t0());
            memory.add_allergy("peanuts", t0());
        });
        assert!(quiet.is_empty(), "unexpected output: {quiet}");

        let verbose = logged_at(tracing::Level::INFO, || memory.add_allergy("shellfish", t0()));
        assert!(verbose.contains("allergy recorded"));
        assert!(memory.contraindications().contains("liver"));
    }
}
