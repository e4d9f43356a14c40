use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::belief::BeliefState;
use crate::error::StoreError;
use crate::memory::MemoryLog;

pub const SNAPSHOT_VERSION: u32 = 2;
pub const BACKUP_VERSION: u32 = 2;
const SNAPSHOT_FILE: &str = "snapshot.json";
const KEY_FILE: &str = ".secret.key";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const MAX_USER_ID_LEN: usize = 64;

/// Belief state and memory of one user, always written together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub version: u32,
    pub user_id: String,
    pub saved_at: DateTime<Utc>,
    pub state: BeliefState,
    pub memory: MemoryLog,
}

pub trait SnapshotStore {
    /// `Ok(None)` when the user has never been saved.
    fn load(&self, user_id: &str) -> Result<Option<UserSnapshot>, StoreError>;
    fn save(&self, snapshot: &UserSnapshot) -> Result<(), StoreError>;
}

/// On-disk wrapper. `ciphertext` is the snapshot JSON sealed with the
/// user's key; `checksum` covers the ciphertext bytes as written.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    nonce: String,
    checksum: String,
    ciphertext: String,
}

/// Carries the encrypted envelope only. The key never leaves the store.
#[derive(Debug, Serialize, Deserialize)]
struct BackupPackage {
    version: u32,
    user_id: String,
    created_at: DateTime<Utc>,
    /// base64 of the envelope bytes
    snapshot: String,
}

pub fn validate_user_id(user_id: &str) -> Result<(), StoreError> {
    let valid = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidUserId(user_id.to_string()))
    }
}

/// One directory per user under `root`, holding the encrypted snapshot
/// and the user's key file.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id).join(SNAPSHOT_FILE)
    }

    pub fn key_path(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id).join(KEY_FILE)
    }

    /// Package the stored snapshot for `user_id` as a portable backup.
    pub fn export_backup(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<u8>, StoreError> {
        validate_user_id(user_id)?;
        let path = self.snapshot_path(user_id);
        if !path.exists() {
            return Err(StoreError::NotFound(user_id.to_string()));
        }
        let raw = std::fs::read(&path)?;
        let key = self.read_key(user_id)?;
        // Refuse to package something that would not load.
        open_envelope(user_id, &key, &raw)?;

        let package = BackupPackage {
            version: BACKUP_VERSION,
            user_id: user_id.to_string(),
            created_at: now,
            snapshot: base64::engine::general_purpose::STANDARD.encode(&raw),
        };
        tracing::info!(user_id, bytes = raw.len(), "backup exported");
        Ok(serde_json::to_vec_pretty(&package)?)
    }

    /// Validate a backup package and restore it as `user_id`'s current snapshot.
    ///
    /// The package must belong to `user_id` and decrypt with that user's key.
    pub fn import_backup(&self, user_id: &str, bytes: &[u8]) -> Result<UserSnapshot, StoreError> {
        validate_user_id(user_id)?;
        let package: BackupPackage = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::BackupInvalid(err.to_string()))?;
        if package.version != BACKUP_VERSION {
            return Err(StoreError::BackupInvalid(format!(
                "unsupported backup version {}",
                package.version
            )));
        }
        if package.user_id != user_id {
            return Err(StoreError::UserMismatch {
                expected: user_id.to_string(),
                found: package.user_id,
            });
        }
        let raw = base64::engine::general_purpose::STANDARD
            .decode(package.snapshot.as_bytes())
            .map_err(|err| StoreError::BackupInvalid(err.to_string()))?;

        let key = self.read_key(user_id)?;
        let snapshot = open_envelope(user_id, &key, &raw)?;
        self.write_atomic(user_id, &raw)?;
        tracing::info!(user_id, created_at = %package.created_at, "backup imported");
        Ok(snapshot)
    }

    fn read_key(&self, user_id: &str) -> Result<[u8; KEY_LEN], StoreError> {
        let path = self.key_path(user_id);
        let encoded = match std::fs::read_to_string(&path) {
            Ok(encoded) => encoded,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::KeyUnavailable(user_id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let bytes = hex::decode(encoded.trim())
            .map_err(|_| StoreError::KeyUnavailable(user_id.to_string()))?;
        bytes
            .try_into()
            .map_err(|_| StoreError::KeyUnavailable(user_id.to_string()))
    }

    /// Existing key, or a fresh one written 0o600 next to the snapshot.
    fn load_or_create_key(&self, user_id: &str) -> Result<[u8; KEY_LEN], StoreError> {
        if self.key_path(user_id).exists() {
            return self.read_key(user_id);
        }
        let bytes: Vec<u8> = (0..KEY_LEN).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
        std::fs::create_dir_all(self.root.join(user_id))?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(self.key_path(user_id))?;
        file.write_all(hex::encode(&bytes).as_bytes())?;
        file.sync_all()?;
        tracing::info!(user_id, "encryption key created");

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(key)
    }

    /// Write to a sibling temp file, then rename over the old snapshot.
    fn write_atomic(&self, user_id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.snapshot_path(user_id);
        let dir = self.root.join(user_id);
        std::fs::create_dir_all(&dir)?;
        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self, user_id: &str) -> Result<Option<UserSnapshot>, StoreError> {
        validate_user_id(user_id)?;
        let path = self.snapshot_path(user_id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let key = self.read_key(user_id)?;
        open_envelope(user_id, &key, &raw).map(Some)
    }

    fn save(&self, snapshot: &UserSnapshot) -> Result<(), StoreError> {
        validate_user_id(&snapshot.user_id)?;
        let key = self.load_or_create_key(&snapshot.user_id)?;
        let bytes = seal_envelope(&key, snapshot)?;
        self.write_atomic(&snapshot.user_id, &bytes)?;
        tracing::info!(
            user_id = %snapshot.user_id,
            actions = snapshot.memory.actions().len(),
            "snapshot saved"
        );
        Ok(())
    }
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn cipher(key: &[u8; KEY_LEN]) -> Result<ChaCha20Poly1305, StoreError> {
    ChaCha20Poly1305::new_from_slice(key).map_err(|err| StoreError::Encryption(err.to_string()))
}

fn seal_envelope(key: &[u8; KEY_LEN], snapshot: &UserSnapshot) -> Result<Vec<u8>, StoreError> {
    let payload = serde_json::to_vec(snapshot)?;
    let nonce: Vec<u8> = (0..NONCE_LEN).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    let ciphertext = cipher(key)?
        .encrypt(Nonce::from_slice(&nonce), payload.as_slice())
        .map_err(|err| StoreError::Encryption(err.to_string()))?;
    let envelope = Envelope {
        version: SNAPSHOT_VERSION,
        nonce: hex::encode(&nonce),
        checksum: checksum(&ciphertext),
        ciphertext: base64::engine::general_purpose::STANDARD.encode(&ciphertext),
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

fn open_envelope(
    user_id: &str,
    key: &[u8; KEY_LEN],
    raw: &[u8],
) -> Result<UserSnapshot, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        user_id: user_id.to_string(),
        reason,
    };

    let envelope: Envelope =
        serde_json::from_slice(raw).map_err(|err| corrupt(format!("unreadable envelope: {err}")))?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion(envelope.version));
    }
    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(envelope.ciphertext.as_bytes())
        .map_err(|err| corrupt(format!("unreadable ciphertext: {err}")))?;
    if checksum(&ciphertext) != envelope.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }
    let nonce = hex::decode(&envelope.nonce)
        .map_err(|err| corrupt(format!("unreadable nonce: {err}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(corrupt(format!("nonce must be {NONCE_LEN} bytes")));
    }

    let payload = cipher(key)?
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| corrupt("decryption failed".to_string()))?;
    let snapshot: UserSnapshot = serde_json::from_slice(&payload)
        .map_err(|err| corrupt(format!("unreadable snapshot: {err}")))?;
    if snapshot.user_id != user_id {
        return Err(StoreError::UserMismatch {
            expected: user_id.to_string(),
            found: snapshot.user_id,
        });
    }
    Ok(snapshot)
}
