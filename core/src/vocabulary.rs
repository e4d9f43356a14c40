use serde::{Deserialize, Serialize};

/// Nutrients tracked in the belief state.
///
/// Declaration order is the stable order used for tie-breaks and for
/// every ordered map keyed by nutrient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Iron,
    Protein,
    Calcium,
    Folic,
    VitaminB12,
    Iodine,
}

impl Nutrient {
    pub const ALL: [Nutrient; 6] = [
        Nutrient::Iron,
        Nutrient::Protein,
        Nutrient::Calcium,
        Nutrient::Folic,
        Nutrient::VitaminB12,
        Nutrient::Iodine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Nutrient::Iron => "iron",
            Nutrient::Protein => "protein",
            Nutrient::Calcium => "calcium",
            Nutrient::Folic => "folic",
            Nutrient::VitaminB12 => "vitamin_b12",
            Nutrient::Iodine => "iodine",
        }
    }

    /// Resolve a nutrient id. Returns `None` for ids outside the known set.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Nutrient::ALL
            .into_iter()
            .find(|nutrient| nutrient.as_str() == normalized)
    }
}

impl std::fmt::Display for Nutrient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PregnancyStage {
    Planning,
    FirstTrimester,
    SecondTrimester,
    ThirdTrimester,
}

impl PregnancyStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PregnancyStage::Planning => "planning",
            PregnancyStage::FirstTrimester => "first_trimester",
            PregnancyStage::SecondTrimester => "second_trimester",
            PregnancyStage::ThirdTrimester => "third_trimester",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "planning" => Some(PregnancyStage::Planning),
            "first_trimester" => Some(PregnancyStage::FirstTrimester),
            "second_trimester" => Some(PregnancyStage::SecondTrimester),
            "third_trimester" => Some(PregnancyStage::ThirdTrimester),
            _ => None,
        }
    }

    /// Any trimester counts as pregnant; planning does not.
    pub fn is_pregnant(self) -> bool {
        !matches!(self, PregnancyStage::Planning)
    }
}

/// User-reported result of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Positive => "positive",
            Outcome::Negative => "negative",
            Outcome::Neutral => "neutral",
            Outcome::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Outcome::Positive),
            "negative" => Some(Outcome::Negative),
            "neutral" => Some(Outcome::Neutral),
            "unknown" => Some(Outcome::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackDirection {
    Increase,
    Decrease,
    Stable,
}

impl FeedbackDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "increase" => Some(FeedbackDirection::Increase),
            "decrease" => Some(FeedbackDirection::Decrease),
            "stable" => Some(FeedbackDirection::Stable),
            _ => None,
        }
    }

    pub fn delta(self) -> f64 {
        match self {
            FeedbackDirection::Increase => 0.05,
            FeedbackDirection::Decrease => -0.05,
            FeedbackDirection::Stable => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

/// Kind tag of an emitted action. The payload lives in `policy::ActionPlan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SuggestFood,
    SuggestWater,
    SuggestRest,
    CheckIn,
    Observe,
    AlertMedical,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::SuggestFood => "suggest_food",
            ActionKind::SuggestWater => "suggest_water",
            ActionKind::SuggestRest => "suggest_rest",
            ActionKind::CheckIn => "check_in",
            ActionKind::Observe => "observe",
            ActionKind::AlertMedical => "alert_medical",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
