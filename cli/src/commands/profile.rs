use chrono::Utc;
use clap::Args;
use nourish_core::belief::{LifeContext, PhysicalMetric};
use nourish_core::cycle::UserSession;
use nourish_core::error::{CliError, codes};
use nourish_core::store::SnapshotStore;
use nourish_core::vocabulary::PregnancyStage;
use serde_json::json;

use crate::util::{Context, EXIT_USAGE, exit_error, exit_store_error, exit_with, print_json};

#[derive(Args)]
pub struct InitArgs {
    /// planning | first_trimester | second_trimester | third_trimester
    #[arg(long)]
    pub stage: Option<String>,
    /// Currently breastfeeding
    #[arg(long)]
    pub breastfeeding: bool,
    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,
}

#[derive(Args)]
pub struct SymptomArgs {
    /// Symptom name to add (e.g. fatigue, severe_bleeding)
    #[arg(long, required_unless_present = "clear")]
    pub add: Option<String>,
    /// Drop every reported symptom
    #[arg(long, conflicts_with = "add")]
    pub clear: bool,
}

pub fn init(ctx: &Context, args: InitArgs) -> i32 {
    match ctx.store.load(&ctx.user_id) {
        Ok(Some(_)) => exit_with(
            CliError::new(
                codes::CONFLICT,
                format!("a profile already exists for user '{}'", ctx.user_id),
            )
            .with_hint("Use `nourish backup import` to replace it."),
            EXIT_USAGE,
        ),
        Ok(None) => {}
        Err(err) => exit_store_error(&err),
    }

    let stage = args.stage.as_deref().map(|raw| {
        PregnancyStage::parse(raw).unwrap_or_else(|| {
            exit_error(
                &format!("unknown stage '{raw}'"),
                Some("Use planning, first_trimester, second_trimester or third_trimester."),
            )
        })
    });
    let context = LifeContext {
        stage,
        breastfeeding: args.breastfeeding,
        age: args.age,
    };

    let now = Utc::now();
    let session = UserSession::new(ctx.user_id.clone(), context, ctx.config, now);
    ctx.save_session(&session, now);
    tracing::info!(user_id = %ctx.user_id, stage = ?stage, "profile created");
    print_json(&session.state.summary())
}

pub fn symptom(ctx: &Context, args: SymptomArgs) -> i32 {
    let mut session = ctx.load_session();
    let now = Utc::now();
    if args.clear {
        session.state.clear_symptoms();
    } else if let Some(symptom) = args.add.as_deref() {
        if symptom.trim().is_empty() {
            exit_error("symptom must not be empty", None);
        }
        session.state.report_symptom(symptom, now);
    }
    ctx.save_session(&session, now);
    print_json(&json!({ "symptoms": session.state.symptoms() }))
}

pub fn physical(ctx: &Context, metric: &str, value: f64) -> i32 {
    let Some(metric) = PhysicalMetric::parse(metric) else {
        exit_error(
            &format!("unknown metric '{metric}'"),
            Some("Use energy, hydration, sleep_quality or stress."),
        );
    };
    if !value.is_finite() {
        exit_error("value must be a finite number in [0, 1]", None);
    }
    let mut session = ctx.load_session();
    let now = Utc::now();
    session.state.set_physical(metric, value, now);
    ctx.save_session(&session, now);
    print_json(&session.state.physical())
}

pub fn contraindication(ctx: &Context, item: &str, reason: &str) -> i32 {
    if item.trim().is_empty() {
        exit_error("item must not be empty", None);
    }
    let mut session = ctx.load_session();
    let now = Utc::now();
    session.memory.add_contraindication(item, reason, now);
    ctx.save_session(&session, now);
    print_json(&json!({ "contraindications": session.memory.contraindications() }))
}

pub fn allergy(ctx: &Context, item: &str) -> i32 {
    if item.trim().is_empty() {
        exit_error("item must not be empty", None);
    }
    let mut session = ctx.load_session();
    let now = Utc::now();
    session.memory.add_allergy(item, now);
    ctx.save_session(&session, now);
    print_json(&json!({
        "allergies": session.memory.allergies(),
        "contraindications": session.memory.contraindications(),
    }))
}

pub fn show(ctx: &Context) -> i32 {
    let session = ctx.load_session();
    print_json(&json!({
        "belief": session.state.summary(),
        "memory": session.memory.summary(Utc::now()),
    }))
}
