use chrono::Utc;
use clap::Args;
use nourish_core::error::{CliError, codes};
use nourish_core::safety::SafetyGuard;
use nourish_core::signals::{ParsedSignals, Phrasing, SensorSuite};
use nourish_core::vocabulary::{FeedbackDirection, Nutrient, Outcome};
use serde_json::json;
use uuid::Uuid;

use crate::parser::parse_message;
use crate::phrasing::TemplatePhrasing;
use crate::util::{Context, EXIT_USAGE, exit_error, exit_with, print_json, read_json_from_file};

#[derive(Args)]
pub struct CycleArgs {
    /// Free-text message from the user, parsed into signals
    #[arg(long, conflicts_with = "signals")]
    pub message: Option<String>,
    /// Read pre-parsed signals as JSON from file (use '-' for stdin)
    #[arg(long)]
    pub signals: Option<String>,
    /// Register a neutral sensor for every nutrient
    #[arg(long)]
    pub neutral_sensors: bool,
}

#[derive(Args)]
pub struct OutcomeArgs {
    /// Action id printed by `nourish cycle`
    #[arg(long)]
    pub action_id: Uuid,
    /// positive | negative | neutral | unknown
    #[arg(long)]
    pub outcome: String,
    /// Optional free-text note about how it went
    #[arg(long)]
    pub text: Option<String>,
}

pub fn run(ctx: &Context, args: CycleArgs) -> i32 {
    let signals = match (args.message.as_deref(), args.signals.as_deref()) {
        (Some(message), _) => parse_message(message),
        (None, Some(path)) => read_json_from_file::<ParsedSignals>(path)
            .unwrap_or_else(|e| exit_error(&e, Some("Expected a JSON object of parsed signals."))),
        (None, None) => ParsedSignals::default(),
    };
    let sensors = if args.neutral_sensors {
        SensorSuite::neutral()
    } else {
        SensorSuite::new()
    };

    let mut session = ctx.load_session();
    let now = Utc::now();
    let report = session.run_cycle(&signals, &sensors, &SafetyGuard::new(), now);
    ctx.save_session(&session, now);

    tracing::info!(
        user_id = %ctx.user_id,
        kind = %report.decision.kind(),
        action_id = ?report.action_id,
        "cycle finished"
    );
    let message = TemplatePhrasing.phrase(&report.decision);
    print_json(&json!({
        "decision": report.decision,
        "action_id": report.action_id,
        "outcome_recorded": report.outcome_recorded,
        "message": message,
    }))
}

pub fn feedback(ctx: &Context, nutrient: &str, direction: &str) -> i32 {
    let Some(parsed) = Nutrient::parse(nutrient) else {
        exit_error(
            &format!("unknown nutrient '{nutrient}'"),
            Some("Use iron, protein, calcium, folic, vitamin_b12 or iodine."),
        );
    };
    let Some(direction) = FeedbackDirection::parse(direction) else {
        exit_error(
            &format!("unknown direction '{direction}'"),
            Some("Use increase, decrease or stable."),
        );
    };

    let mut session = ctx.load_session();
    let now = Utc::now();
    session.feedback(parsed.as_str(), direction, now);
    ctx.save_session(&session, now);
    print_json(&json!({
        "nutrient": parsed,
        "belief": session.state.belief(parsed),
        "confidence": session.state.confidence(parsed),
    }))
}

pub fn outcome(ctx: &Context, args: OutcomeArgs) -> i32 {
    let Some(outcome) = Outcome::parse(&args.outcome) else {
        exit_error(
            &format!("unknown outcome '{}'", args.outcome),
            Some("Use positive, negative, neutral or unknown."),
        );
    };

    let mut session = ctx.load_session();
    let now = Utc::now();
    if !session.record_outcome(args.action_id, outcome, args.text, now) {
        exit_with(
            CliError::new(
                codes::NOT_FOUND,
                format!("no action {} in memory", args.action_id),
            )
            .with_hint("Use the action_id printed by `nourish cycle`."),
            EXIT_USAGE,
        );
    }
    ctx.save_session(&session, now);

    let recorded = session.memory.action(args.action_id);
    print_json(&json!({
        "action_id": args.action_id,
        "outcome": outcome,
        "text": recorded.map(|record| record.text()),
        "should_avoid": recorded.is_some_and(|record| session.memory.should_avoid(record.text())),
    }))
}
