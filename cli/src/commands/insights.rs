use chrono::Utc;
use nourish_core::knowledge::{food_facts, foods_for_nutrient, nutrient_profile};
use nourish_core::vocabulary::Nutrient;
use serde_json::json;

use crate::util::{Context, exit_error, print_json};

pub fn insights(ctx: &Context) -> i32 {
    let session = ctx.load_session();
    let insights = session.learner().learning_insights(&session.memory);
    print_json(&json!({
        "insights": insights,
        "recent_actions": session.memory.recent_actions(7, Utc::now()).len(),
    }))
}

pub fn knowledge(nutrient: &str) -> i32 {
    let Some(nutrient) = Nutrient::parse(nutrient) else {
        exit_error(
            &format!("unknown nutrient '{nutrient}'"),
            Some("Use iron, protein, calcium, folic, vitamin_b12 or iodine."),
        );
    };
    let foods: Vec<_> = foods_for_nutrient(nutrient)
        .iter()
        .map(|food| {
            json!({
                "food": food,
                "facts": food_facts(food),
            })
        })
        .collect();
    print_json(&json!({
        "profile": nutrient_profile(nutrient),
        "foods": foods,
    }))
}
