//! Save-file persistence for the economy state.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use bincode::Options;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::economy::EconomyState;

/// Directory under the user's config directory used for the save file.
pub const DEFAULT_SAVE_DIR: &str = "sizzlestar";
/// File name of the save inside [`DEFAULT_SAVE_DIR`].
pub const DEFAULT_SAVE_FILE: &str = "save.szs";

const MAGIC: &[u8; 4] = b"SZSV";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;
const MAX_PAYLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Errors raised while reading or writing the save file.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The save exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Save location.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// Writing or replacing the save failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Save location.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The state could not be encoded.
    #[error("failed to encode save: {0}")]
    Encode(#[from] bincode::Error),
    /// The bytes on disk are not a save this build understands.
    #[error("save {} is corrupt: {reason}", path.display())]
    Corrupt {
        /// Save location.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
}

/// Result of looking for a save file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A valid save was read.
    Found(EconomyState),
    /// No save exists yet; start fresh.
    NotFound,
}

#[derive(Serialize)]
struct SavePayloadRef<'a> {
    state: &'a EconomyState,
}

#[derive(Deserialize)]
struct SavePayload {
    state: EconomyState,
}

/// Reads and writes the single save file.
#[derive(Debug, Clone)]
pub struct SaveManager {
    path: PathBuf,
}

impl SaveManager {
    /// Create a manager for the save at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the user's config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_SAVE_DIR)
            .join(DEFAULT_SAVE_FILE)
    }

    /// Location of the save file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `state` atomically: encode into a sibling temp file, then rename over the save.
    pub fn save(&self, state: &EconomyState) -> Result<(), SaveError> {
        let bytes = encode(state)?;
        let write_err = |source| SaveError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(write_err)?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(write_err)?;
        temp.write_all(&bytes).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&self.path)
            .map_err(|err| write_err(err.error))?;

        info!(path = %self.path.display(), bytes = bytes.len(), "Game saved");
        Ok(())
    }

    /// Read the save, distinguishing a missing file from a corrupt one.
    pub fn load(&self) -> Result<LoadOutcome, SaveError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LoadOutcome::NotFound),
            Err(source) => {
                return Err(SaveError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let state = decode(&bytes).map_err(|reason| SaveError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;
        info!(path = %self.path.display(), "Save loaded");
        Ok(LoadOutcome::Found(state))
    }

    /// Move an unreadable save aside so the next save does not overwrite it.
    ///
    /// Earlier quarantined files are kept: the target is `<save>.corrupt`, or
    /// `<save>.corrupt.N` with the first free `N` when that already exists.
    pub fn quarantine(&self) -> Result<PathBuf, SaveError> {
        let target = self.quarantine_target();
        fs::rename(&self.path, &target).map_err(|source| SaveError::Write {
            path: target.clone(),
            source,
        })?;
        warn!(from = %self.path.display(), to = %target.display(), "Moved corrupt save aside");
        Ok(target)
    }

    fn quarantine_target(&self) -> PathBuf {
        let candidate = |suffix: String| {
            let mut name = self.path.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        let mut target = candidate(".corrupt".to_string());
        let mut attempt = 1u32;
        while fs::symlink_metadata(&target).is_ok() {
            target = candidate(format!(".corrupt.{attempt}"));
            attempt += 1;
        }
        target
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_PAYLOAD_BYTES)
        .reject_trailing_bytes()
}

/// Encode `state` into the on-disk format.
pub fn encode(state: &EconomyState) -> Result<Vec<u8>, SaveError> {
    let payload = codec().serialize(&SavePayloadRef { state })?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode the on-disk format, returning why the bytes were rejected.
pub fn decode(bytes: &[u8]) -> Result<EconomyState, String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("file is only {} bytes long", bytes.len()));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[..MAGIC.len()] != MAGIC {
        return Err("missing save header".to_string());
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }

    let decoded: SavePayload = codec()
        .deserialize(payload)
        .map_err(|err| format!("malformed payload: {err}"))?;
    decoded.state.validate()?;
    Ok(decoded.state)
}
