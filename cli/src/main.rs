use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod parser;
mod phrasing;
mod util;

use commands::backup::BackupCommands;
use commands::cycle::{CycleArgs, OutcomeArgs};
use commands::profile::{InitArgs, SymptomArgs};
use nourish_core::error::CliError;
use util::{Context, EXIT_USAGE, exit_error, exit_with};

#[derive(Parser)]
#[command(
    name = "nourish",
    version,
    about = "Nourish CLI: one considered nutrition action per day, with memory and hard safety rules"
)]
struct Cli {
    /// Directory holding per-user snapshots (default: <data dir>/nourish)
    #[arg(long, env = "NOURISH_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// User id ([A-Za-z0-9_-], up to 64 characters)
    #[arg(long, env = "NOURISH_USER_ID", global = true)]
    user: Option<String>,

    /// Emit logs as JSON on stderr
    #[arg(long, env = "NOURISH_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a profile for the user
    Init(InitArgs),
    /// Run one decision cycle and print the chosen action
    Cycle(CycleArgs),
    /// Tell the system a nutrient went up, down or stayed the same
    Feedback {
        /// Nutrient id (iron, protein, calcium, folic, vitamin_b12, iodine)
        #[arg(long)]
        nutrient: String,
        /// increase | decrease | stable
        #[arg(long)]
        direction: String,
    },
    /// Record how a logged action turned out
    Outcome(OutcomeArgs),
    /// Report or clear symptoms
    Symptom(SymptomArgs),
    /// Set an observed physical metric (energy, hydration, sleep_quality, stress)
    Physical {
        #[arg(long)]
        metric: String,
        /// Value in [0, 1]
        #[arg(long)]
        value: f64,
    },
    /// Add a never-suggest item
    Contraindication {
        #[arg(long)]
        item: String,
        #[arg(long)]
        reason: String,
    },
    /// Record an allergy (also a contraindication)
    Allergy {
        #[arg(long)]
        item: String,
    },
    /// Print belief state and memory summary
    Show,
    /// Print what has been learned from outcomes
    Insights,
    /// Print reference data for a nutrient
    Knowledge {
        #[arg(long)]
        nutrient: String,
    },
    /// Export or import backup packages
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nourish=warn,nourish_core=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let code = dispatch(cli.command, cli.data_dir, cli.user);
    std::process::exit(code);
}

fn resolve_context(data_dir: Option<PathBuf>, user: Option<String>) -> Context {
    let user_id = user.unwrap_or_else(|| {
        exit_error(
            "a user id is required",
            Some("Set --user or NOURISH_USER_ID env var"),
        )
    });
    match Context::resolve(data_dir, user_id) {
        Ok(ctx) => ctx,
        Err(err) => exit_with(CliError::new(err.code(), err.to_string()), EXIT_USAGE),
    }
}

/// The user context is resolved only for commands that work on a profile.
fn dispatch(command: Commands, data_dir: Option<PathBuf>, user: Option<String>) -> i32 {
    let ctx = move || resolve_context(data_dir, user);
    match command {
        Commands::Init(args) => commands::profile::init(&ctx(), args),
        Commands::Cycle(args) => commands::cycle::run(&ctx(), args),
        Commands::Feedback {
            nutrient,
            direction,
        } => commands::cycle::feedback(&ctx(), &nutrient, &direction),
        Commands::Outcome(args) => commands::cycle::outcome(&ctx(), args),
        Commands::Symptom(args) => commands::profile::symptom(&ctx(), args),
        Commands::Physical { metric, value } => commands::profile::physical(&ctx(), &metric, value),
        Commands::Contraindication { item, reason } => {
            commands::profile::contraindication(&ctx(), &item, &reason)
        }
        Commands::Allergy { item } => commands::profile::allergy(&ctx(), &item),
        Commands::Show => commands::profile::show(&ctx()),
        Commands::Insights => commands::insights::insights(&ctx()),
        Commands::Backup { command } => commands::backup::run(&ctx(), command),
        Commands::Knowledge { nutrient } => commands::insights::knowledge(&nutrient),
    }
}
