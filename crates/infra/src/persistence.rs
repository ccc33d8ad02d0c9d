//! JSON-file persistence of the learning ledger.
//!
//! Two artifacts live side by side in the data directory:
//! - `learning_entries.json`: the ordered ledger,
//! - `learned_patterns.json`: the pattern table keyed by pattern key.
//!
//! Each save rewrites both files through a temporary sibling and a rename, so a
//! reader never sees a half-written file.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use copilot_learning::{FeedbackEntry, LedgerPersistence, LedgerSnapshot, PatternTable, PersistenceError};

pub const ENTRIES_FILE: &str = "learning_entries.json";
pub const PATTERNS_FILE: &str = "learned_patterns.json";

#[derive(Debug, Clone)]
pub struct JsonFileLedgerPersistence {
    dir: PathBuf,
}

impl JsonFileLedgerPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries_path(&self) -> PathBuf {
        self.dir.join(ENTRIES_FILE)
    }

    pub fn patterns_path(&self) -> PathBuf {
        self.dir.join(PATTERNS_FILE)
    }
}

fn io_error(path: &Path, err: std::io::Error) -> PersistenceError {
    PersistenceError::Io(format!("{}: {err}", path.display()))
}

/// Read and decode `path`; a missing file is `None`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(path, err)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|err| PersistenceError::Serialization(format!("{}: {err}", path.display())))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| PersistenceError::Serialization(format!("{}: {err}", path.display())))?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp).map_err(|err| io_error(&tmp, err))?;
    file.write_all(&bytes).map_err(|err| io_error(&tmp, err))?;
    file.sync_all().map_err(|err| io_error(&tmp, err))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|err| io_error(path, err))
}

impl LedgerPersistence for JsonFileLedgerPersistence {
    fn load(&self) -> Result<LedgerSnapshot, PersistenceError> {
        let entries: Vec<FeedbackEntry> = read_json(&self.entries_path())?.unwrap_or_default();
        let patterns: PatternTable = read_json(&self.patterns_path())?.unwrap_or_default();
        Ok(LedgerSnapshot { entries, patterns })
    }

    fn save(&self, entries: &[FeedbackEntry], patterns: &PatternTable) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|err| io_error(&self.dir, err))?;
        write_json_atomic(&self.entries_path(), entries)?;
        write_json_atomic(&self.patterns_path(), patterns)?;
        tracing::debug!(dir = %self.dir.display(), entries = entries.len(), "learning ledger saved");
        Ok(())
    }
}
