use std::io::Read;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use nourish_core::config::PolicyConfig;
use nourish_core::cycle::UserSession;
use nourish_core::error::{CliError, ConfigError, StoreError, codes};
use nourish_core::store::{FileStore, SnapshotStore, validate_user_id};
use serde::Serialize;

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE: i32 = 1;
pub const EXIT_STORE: i32 = 2;

/// Resolved global options shared by every subcommand.
pub struct Context {
    pub store: FileStore,
    pub user_id: String,
    pub config: PolicyConfig,
}

impl Context {
    pub fn resolve(data_dir: Option<PathBuf>, user_id: String) -> Result<Self, ConfigError> {
        let root = match data_dir {
            Some(dir) => dir,
            None => dirs::data_dir().ok_or(ConfigError::NoDataDir)?.join("nourish"),
        };
        if validate_user_id(&user_id).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "--user",
                value: user_id,
            });
        }
        Ok(Self {
            store: FileStore::new(root),
            user_id,
            config: PolicyConfig::from_env(),
        })
    }

    /// Load the user's session, exiting when there is none yet.
    pub fn load_session(&self) -> UserSession {
        match self.store.load(&self.user_id) {
            Ok(Some(snapshot)) => UserSession::restore(snapshot, self.config),
            Ok(None) => exit_with(
                CliError::new(
                    codes::NOT_FOUND,
                    format!("no profile stored for user '{}'", self.user_id),
                )
                .with_hint("Run `nourish init` first."),
                EXIT_USAGE,
            ),
            Err(err) => exit_store_error(&err),
        }
    }

    /// Persist belief and memory together. A failed save exits without
    /// touching what is already on disk.
    pub fn save_session(&self, session: &UserSession, now: DateTime<Utc>) {
        if let Err(err) = self.store.save(&session.snapshot(now)) {
            exit_store_error(&err);
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(body) => {
            println!("{body}");
            EXIT_OK
        }
        Err(err) => exit_error(&format!("failed to render output: {err}"), None),
    }
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = CliError::new(codes::CLI_ERROR, message);
    if let Some(hint) = docs_hint {
        err = err.with_hint(hint);
    }
    exit_with(err, EXIT_USAGE)
}

pub fn exit_store_error(err: &StoreError) -> ! {
    tracing::error!(error = %err, code = err.code(), "store operation failed");
    let hint = match err {
        StoreError::Corrupt { .. } => Some("Restore from a backup with `nourish backup import`."),
        StoreError::InvalidUserId(_) => Some("Use 1-64 characters from [A-Za-z0-9_-]."),
        StoreError::UserMismatch { .. } => {
            Some("Import a backup under the --user it was exported for.")
        }
        StoreError::KeyUnavailable(_) => {
            Some("Backups restore only where the user's .secret.key is present.")
        }
        _ => None,
    };
    let mut body = CliError::new(err.code(), err.to_string());
    if let Some(hint) = hint {
        body = body.with_hint(hint);
    }
    exit_with(body, EXIT_STORE)
}

pub fn exit_with(err: CliError, code: i32) -> ! {
    let rendered = serde_json::to_string_pretty(&err)
        .unwrap_or_else(|_| {
            format!("{{\"error\":\"{}\",\"message\":\"{}\"}}", err.error, err.message)
        });
    eprintln!("{rendered}");
    std::process::exit(code);
}

/// Read a whole file, or stdin when `path` is "-".
pub fn read_input(path: &str) -> Result<Vec<u8>, String> {
    if path == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {e}"))?;
        Ok(buf)
    } else {
        std::fs::read(path).map_err(|e| format!("Failed to read file '{path}': {e}"))
    }
}

pub fn read_json_from_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, String> {
    let raw = read_input(path)?;
    serde_json::from_slice(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}
