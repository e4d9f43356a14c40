use serde::Serialize;
use thiserror::Error;

/// Error body printed by the binary. Meant to be read by scripts as much as by people.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    pub message: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

impl CliError {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            docs_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.docs_hint = Some(hint.into());
        self
    }
}

/// Error codes shared by the library and the binary.
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const STORE_FAILED: &str = "store_failed";
    pub const CORRUPT_SNAPSHOT: &str = "corrupt_snapshot";
    pub const KEY_UNAVAILABLE: &str = "key_unavailable";
    pub const INVALID_USER_ID: &str = "invalid_user_id";
    pub const CONFIG_INVALID: &str = "config_invalid";
    pub const CLI_ERROR: &str = "cli_error";
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid user id '{0}': use 1-64 characters from [A-Za-z0-9_-]")]
    InvalidUserId(String),

    #[error("snapshot belongs to user '{found}', expected '{expected}'")]
    UserMismatch { expected: String, found: String },

    #[error("no snapshot stored for user '{0}'")]
    NotFound(String),

    #[error("snapshot for '{user_id}' is corrupt: {reason}")]
    Corrupt { user_id: String, reason: String },

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("backup package invalid: {0}")]
    BackupInvalid(String),

    #[error("no usable encryption key for user '{0}'")]
    KeyUnavailable(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidUserId(_) => codes::INVALID_USER_ID,
            StoreError::UserMismatch { .. } => codes::CONFLICT,
            StoreError::NotFound(_) => codes::NOT_FOUND,
            StoreError::Corrupt { .. } | StoreError::UnsupportedVersion(_) => {
                codes::CORRUPT_SNAPSHOT
            }
            StoreError::BackupInvalid(_) => codes::VALIDATION_FAILED,
            StoreError::KeyUnavailable(_) => codes::KEY_UNAVAILABLE,
            StoreError::Encryption(_) | StoreError::Io(_) | StoreError::Json(_) => {
                codes::STORE_FAILED
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no data directory available; pass --data-dir or set NOURISH_DATA_DIR")]
    NoDataDir,

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        codes::CONFIG_INVALID
    }
}
