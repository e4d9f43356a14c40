//! Static nutrition reference data. Read-only; never mutated at runtime.

use serde::Serialize;

use crate::vocabulary::{Nutrient, PregnancyStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    Planning,
    Pregnant,
    Breastfeeding,
}

impl LifeStage {
    /// An absent stage is treated as planning.
    pub fn from_stage(stage: Option<PregnancyStage>) -> Self {
        match stage {
            Some(stage) if stage.is_pregnant() => LifeStage::Pregnant,
            _ => LifeStage::Planning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyNeed {
    pub planning: f64,
    pub pregnant: f64,
    pub breastfeeding: f64,
}

impl DailyNeed {
    pub fn for_stage(&self, stage: LifeStage) -> f64 {
        match stage {
            LifeStage::Planning => self.planning,
            LifeStage::Pregnant => self.pregnant,
            LifeStage::Breastfeeding => self.breastfeeding,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NutrientProfile {
    pub nutrient: Nutrient,
    pub role: &'static str,
    pub unit: &'static str,
    pub daily_need: DailyNeed,
    pub deficiency_symptoms: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FoodFacts {
    pub food: &'static str,
    pub caution: Option<&'static str>,
    pub safe_during: &'static [LifeStage],
}

const ALL_STAGES: &[LifeStage] = &[
    LifeStage::Planning,
    LifeStage::Pregnant,
    LifeStage::Breastfeeding,
];

const FOOD_FACTS: &[FoodFacts] = &[
    FoodFacts {
        food: "spinach",
        caution: None,
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "lentils",
        caution: None,
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "eggs",
        caution: Some("Must be cooked (not raw)"),
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "milk",
        caution: Some("Must be pasteurized"),
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "yogurt",
        caution: Some("Must be pasteurized"),
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "red_meat",
        caution: Some("Must be cooked thoroughly"),
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "chicken",
        caution: Some("Must be cooked thoroughly"),
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "fish",
        caution: Some("Avoid high-mercury fish (shark, swordfish). Low mercury fish OK."),
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "jaggery",
        caution: None,
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "dates",
        caution: None,
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "almonds",
        caution: None,
        safe_during: ALL_STAGES,
    },
    FoodFacts {
        food: "broccoli",
        caution: None,
        safe_during: ALL_STAGES,
    },
];

/// Ordered candidate foods for a nutrient.
pub fn foods_for_nutrient(nutrient: Nutrient) -> &'static [&'static str] {
    match nutrient {
        Nutrient::Iron => &["spinach", "red_meat", "lentils", "fortified_cereal", "pumpkin_seeds"],
        Nutrient::Protein => &["eggs", "chicken", "yogurt", "milk", "beans", "nuts", "fish"],
        Nutrient::Calcium => &["milk", "yogurt", "cheese", "fortified_milk", "dark_leafy_greens"],
        Nutrient::Folic => &["spinach", "broccoli", "lentils", "asparagus", "fortified_grains"],
        Nutrient::VitaminB12 => &["eggs", "milk", "cheese", "meat", "fortified_cereals"],
        Nutrient::Iodine => &["iodized_salt", "fish", "seaweed", "eggs", "dairy"],
    }
}

pub fn nutrient_profile(nutrient: Nutrient) -> NutrientProfile {
    let (role, unit, daily_need, deficiency_symptoms): (_, _, _, &'static [&'static str]) =
        match nutrient {
            Nutrient::Iron => (
                "Oxygen transport, prevents anemia",
                "mg",
                need(18.0, 27.0, 10.0),
                &["fatigue", "shortness_of_breath", "dizziness", "pale_skin"],
            ),
            Nutrient::Protein => (
                "Fetal growth, tissue repair, energy",
                "g",
                need(50.0, 70.0, 70.0),
                &["weakness", "slow_healing", "low_energy"],
            ),
            Nutrient::Calcium => (
                "Fetal bone development, mother's bone health, muscle function",
                "mg",
                need(1000.0, 1000.0, 1000.0),
                &["muscle_cramps", "weak_bones", "dental_problems"],
            ),
            Nutrient::Folic => (
                "Neural tube development, prevents birth defects",
                "mcg",
                need(400.0, 600.0, 500.0),
                &["anemia", "birth_defects", "fatigue"],
            ),
            Nutrient::VitaminB12 => (
                "Energy metabolism, nerve function, red blood cells",
                "mcg",
                need(2.4, 2.6, 2.8),
                &["fatigue", "numbness", "anemia"],
            ),
            Nutrient::Iodine => (
                "Thyroid function, fetal brain development",
                "mcg",
                need(150.0, 220.0, 290.0),
                &["goiter", "fatigue", "brain_effects_in_fetus"],
            ),
        };
    NutrientProfile {
        nutrient,
        role,
        unit,
        daily_need,
        deficiency_symptoms,
    }
}

pub fn food_facts(food: &str) -> Option<&'static FoodFacts> {
    let food = food.trim().to_lowercase();
    FOOD_FACTS.iter().find(|facts| facts.food == food)
}

/// False for foods missing from the reference table.
pub fn is_food_safe_for_stage(food: &str, stage: Option<PregnancyStage>) -> bool {
    food_facts(food)
        .is_some_and(|facts| facts.safe_during.contains(&LifeStage::from_stage(stage)))
}

fn need(planning: f64, pregnant: f64, breastfeeding: f64) -> DailyNeed {
    DailyNeed {
        planning,
        pregnant,
        breastfeeding,
    }
}
