use nourish_core::policy::{ActionPlan, Decision};
use nourish_core::safety::SafetyGuard;
use nourish_core::signals::Phrasing;

const FALLBACK_TEXT: &str = "I'm here to support you. How are you feeling today?";

/// Fixed templates, one per action. Always picks the same wording for the same plan.
pub struct TemplatePhrasing;

impl Phrasing for TemplatePhrasing {
    fn phrase(&self, decision: &Decision) -> String {
        let text = match &decision.plan {
            ActionPlan::SuggestFood { nutrient, food, .. } => format!(
                "I've been thinking... you might feel better if you had some {} today. \
                 It's rich in {}, which your body could use right now. Even a small serving would help!",
                readable(food),
                readable(nutrient.as_str()),
            ),
            ActionPlan::SuggestWater { glasses, timing } => format!(
                "Your body's been working hard. Let's get some water in you: aim for {glasses} glasses {timing}. \
                 Small sips are fine."
            ),
            ActionPlan::SuggestRest { suggestion } => format!(
                "You deserve some rest. {suggestion}, and be kind to yourself. Your body is doing amazing things."
            ),
            ActionPlan::CheckIn { question, .. } => format!(
                "{question}\n\nLet me know what's going on with you. \
                 Any new symptoms, energy levels, or just how you're doing?"
            ),
            ActionPlan::Observe { .. } => {
                "You're doing great. I'm here when you need me.".to_string()
            }
            ActionPlan::AlertMedical { alert, symptom } => {
                let mut warning = format!("{alert}\n\n");
                if let Some(symptom) = symptom {
                    warning.push_str(&format!("You mentioned: {}\n\n", readable(symptom)));
                }
                warning.push_str(
                    "Please reach out to a doctor or nurse as soon as possible. Don't wait. \
                     If this is an emergency, call your local emergency number.",
                );
                // Alerts go out verbatim.
                return warning;
            }
        };

        if SafetyGuard::is_prompt_safe(&text) {
            text
        } else {
            tracing::warn!(
                kind = %decision.kind(),
                "phrased text failed the medical-advice screen"
            );
            FALLBACK_TEXT.to_string()
        }
    }
}

fn readable(id: &str) -> String {
    id.replace('_', " ")
}
