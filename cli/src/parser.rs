//! Keyword parser turning a free-text message into cycle signals.
//! Pattern matching only; anything it misses is simply not a signal.

use std::sync::LazyLock;

use nourish_core::signals::{OutcomeReport, ParsedSignals};
use nourish_core::vocabulary::{Nutrient, Outcome, Sentiment};
use regex::Regex;

/// Checked in order; the first name per pattern wins and duplicates are dropped.
const SYMPTOM_PATTERNS: &[(&str, &str)] = &[
    (r"severe bleeding|heavy bleeding|bleeding a lot", "severe_bleeding"),
    (r"severe (?:abdominal|stomach|belly) pain", "severe_abdominal_pain"),
    (r"sudden (?:severe )?headache|worst headache", "sudden_severe_headache"),
    (r"blurr(?:y|ed) vision|vision changes|seeing spots", "vision_changes"),
    (r"seizures?|convulsions?", "seizures"),
    (r"fainted|passed out|lost consciousness", "loss_of_consciousness"),
    (r"throat (?:is )?swelling|severe allergic", "severe_allergic_reaction"),
    (r"can'?t stop vomiting|persistent vomiting|vomiting all day", "persistent_vomiting"),
    (r"severe dizziness|very dizzy", "severe_dizziness"),
    (r"chest pain", "chest_pain"),
    (r"shortness of breath|breathless|can'?t breathe", "shortness_of_breath"),
    (r"tired|fatigue|exhausted|sleepy", "fatigue"),
    (r"nausea|vomiting|queasy", "nausea"),
    (r"headache|migraine|head pain", "headache"),
    (r"dizzy|dizziness|vertigo|lightheaded", "dizziness"),
    (r"stomach pain|abdominal pain|belly ache", "stomach_pain"),
    (r"constipat(?:ion|ed)", "constipation"),
    (r"heartburn|acidity|acid reflux", "heartburn"),
    (r"swelling|swollen|edema", "swelling"),
    (r"cramps|cramping", "cramps"),
    (r"weakness|\bweak\b", "weakness"),
];

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "better", "best", "improved", "energetic", "happy", "glad", "thank",
    "helped", "excellent", "wonderful", "nice",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "worse", "worst", "not good", "terrible", "awful", "upset", "sad", "angry",
    "frustrated", "didn't help", "useless", "hate", "dislike", "unable", "poor", "horrible",
];

const NUTRIENT_KEYWORDS: &[(Nutrient, &str)] = &[
    (Nutrient::Iron, r"iron|spinach|red meat|hemoglobin"),
    (Nutrient::Protein, r"protein|meat|chicken|eggs?|milk"),
    (Nutrient::Calcium, r"calcium|milk|bones|teeth|dairy"),
    (Nutrient::Folic, r"folic|folate|spinach|greens"),
    (Nutrient::VitaminB12, r"b12|meat|eggs?"),
    (Nutrient::Iodine, r"iodine|salt|thyroid"),
];

static SYMPTOM_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SYMPTOM_PATTERNS
        .iter()
        .map(|(pattern, name)| {
            (
                Regex::new(&format!("(?i){pattern}")).expect("valid symptom regex"),
                *name,
            )
        })
        .collect()
});

static NUTRIENT_RES: LazyLock<Vec<(Nutrient, Regex)>> = LazyLock::new(|| {
    NUTRIENT_KEYWORDS
        .iter()
        .map(|(nutrient, words)| {
            (
                *nutrient,
                Regex::new(&format!(r"(?i)\b(?:{words})\b")).expect("valid nutrient regex"),
            )
        })
        .collect()
});

static OUTCOME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:i )?(?:tried|had|ate|took|drank) (?:the |some )?(?P<food>[a-z_\- ]+?)(?: (?:yesterday|today|this morning|last night))?\s*(?:,|\.|\band\b|\bbut\b)(?P<rest>.*)$",
    )
    .expect("valid outcome regex")
});
static OUTCOME_NEGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:didn'?t|did not|\bworse\b|\bbad\b|\bpoor\b|\bterrible\b|\bsick\b|\bupset\b|\bqueasy\b)")
        .expect("valid negative outcome regex")
});
static OUTCOME_POSITIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:great|good|better|helped|helpful)\b").expect("valid positive outcome regex")
});
static REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:suggest|recommend|what should i|what can i)\b").expect("valid request regex")
});
static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:what|why|how|do you|can you|should|could|is it)\b").expect("valid question regex")
});
static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:hi|hello|hey|good morning|good evening)\b").expect("valid greeting regex")
});

pub fn parse_message(message: &str) -> ParsedSignals {
    let text = message.trim().to_lowercase();

    let mut symptoms: Vec<String> = Vec::new();
    for (re, name) in SYMPTOM_RES.iter() {
        if re.is_match(&text) && !symptoms.iter().any(|s| s == name) {
            symptoms.push((*name).to_string());
        }
    }

    let nutrients_mentioned: Vec<String> = NUTRIENT_RES
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(nutrient, _)| nutrient.as_str().to_string())
        .collect();

    let outcome_report = extract_outcome(&text);
    let intent = detect_intent(&text, &symptoms, &nutrients_mentioned, outcome_report.as_ref());

    let parsed = ParsedSignals {
        symptoms,
        sentiment: detect_sentiment(&text),
        nutrients_mentioned,
        intent,
        outcome_report,
    };
    tracing::debug!(
        intent = %parsed.intent,
        symptoms = parsed.symptoms.len(),
        outcome = parsed.outcome_report.is_some(),
        "message parsed"
    );
    parsed
}

fn detect_sentiment(text: &str) -> Sentiment {
    let positive = POSITIVE_WORDS.iter().filter(|w| text.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| text.contains(*w)).count();
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

fn extract_outcome(text: &str) -> Option<OutcomeReport> {
    let caps = OUTCOME_RE.captures(text)?;
    let food = caps.name("food")?.as_str().trim();
    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();
    // "didn't feel good" is negative, so look for negatives first.
    let outcome = if OUTCOME_NEGATIVE_RE.is_match(rest) {
        Outcome::Negative
    } else if OUTCOME_POSITIVE_RE.is_match(rest) {
        Outcome::Positive
    } else {
        return None;
    };
    if food.is_empty() {
        return None;
    }
    Some(OutcomeReport {
        action: food.split_whitespace().collect::<Vec<_>>().join("_"),
        outcome,
        text: Some(rest.trim().to_string()).filter(|t| !t.is_empty()),
    })
}

fn detect_intent(
    text: &str,
    symptoms: &[String],
    nutrients: &[String],
    outcome: Option<&OutcomeReport>,
) -> String {
    let intent = match outcome.map(|report| report.outcome) {
        Some(Outcome::Positive) => "give_feedback_positive",
        Some(_) => "give_feedback_negative",
        None if !symptoms.is_empty() => "report_symptom",
        None if REQUEST_RE.is_match(text) => "request_suggestion",
        None if QUESTION_RE.is_match(text) => "ask_question",
        None if !nutrients.is_empty() => "discuss_nutrition",
        None if GREETING_RE.is_match(text) => "greeting",
        None => "general_chat",
    };
    intent.to_string()
}

#[cfg(test)]
mod tests {
    use nourish_core::vocabulary::{Outcome, Sentiment};

    use super::parse_message;

    #[test]
    fn outcome_report_is_extracted() {
        let parsed = parse_message("I tried spinach yesterday and felt great");
        let report = parsed.outcome_report.unwrap();
        assert_eq!(report.action, "spinach");
        assert_eq!(report.outcome, Outcome::Positive);
        assert_eq!(parsed.intent, "give_feedback_positive");
    }

    #[test]
    fn multi_word_food_becomes_id() {
        let parsed = parse_message("I ate red meat, but it didn't feel good");
        let report = parsed.outcome_report.unwrap();
        assert_eq!(report.action, "red_meat");
        assert_eq!(report.outcome, Outcome::Negative);
    }

    #[test]
    fn critical_symptoms_map_to_safety_names() {
        let parsed = parse_message("I have blurry vision and a sudden headache");
        assert!(parsed.symptoms.contains(&"vision_changes".to_string()));
        assert!(parsed.symptoms.contains(&"sudden_severe_headache".to_string()));
        assert_eq!(parsed.intent, "report_symptom");
    }

    #[test]
    fn sentiment_and_nutrients() {
        let parsed = parse_message("Feeling awful and tired, is my iron low?");
        assert_eq!(parsed.sentiment, Sentiment::Negative);
        assert_eq!(parsed.nutrients_mentioned, vec!["iron".to_string()]);
        assert!(parsed.outcome_report.is_none());
    }

    #[test]
    fn plain_greeting() {
        let parsed = parse_message("Hello there");
        assert_eq!(parsed.intent, "greeting");
        assert!(parsed.symptoms.is_empty());
    }
}
