use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::util::{Context, EXIT_OK, exit_error, exit_store_error, print_json, read_input};

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Write a backup package of the stored snapshot
    Export {
        /// Output file (use '-' for stdout)
        #[arg(long)]
        out: String,
    },
    /// Validate a backup package and restore it
    Import {
        /// Backup package file (use '-' for stdin)
        #[arg(long, short = 'f')]
        file: String,
    },
}

pub fn run(ctx: &Context, command: BackupCommands) -> i32 {
    match command {
        BackupCommands::Export { out } => export(ctx, &out),
        BackupCommands::Import { file } => import(ctx, &file),
    }
}

fn export(ctx: &Context, out: &str) -> i32 {
    let package = ctx
        .store
        .export_backup(&ctx.user_id, Utc::now())
        .unwrap_or_else(|err| exit_store_error(&err));
    if out == "-" {
        println!("{}", String::from_utf8_lossy(&package));
        return EXIT_OK;
    }
    if let Err(e) = std::fs::write(out, &package) {
        exit_error(&format!("Failed to write '{out}': {e}"), None);
    }
    print_json(&json!({
        "user_id": ctx.user_id,
        "out": out,
        "bytes": package.len(),
    }))
}

fn import(ctx: &Context, file: &str) -> i32 {
    let raw = read_input(file).unwrap_or_else(|e| exit_error(&e, None));
    let snapshot = ctx
        .store
        .import_backup(&ctx.user_id, &raw)
        .unwrap_or_else(|err| exit_store_error(&err));
    print_json(&json!({
        "user_id": snapshot.user_id,
        "saved_at": snapshot.saved_at,
        "actions": snapshot.memory.actions().len(),
    }))
}
