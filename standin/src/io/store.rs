//! Durable keyed storage for session state (`.standin/state/session.json`).
//!
//! The store is the only state that survives between the session-start and
//! session-end triggers, which may run in different processes. Every write
//! reaches disk (temp file, fsync, rename) before returning so a record that
//! was appended is never lost to a crash in the mutation that follows it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, StandinError};

/// Key holding the ordered list of compensation records.
pub const OPERATIONS_KEY: &str = "standin.session.operations";
/// Key holding the "session in use" flag.
pub const IN_USE_KEY: &str = "standin.session.inUse";
/// Key holding the record a failed restore stopped at.
pub const RESTORE_HALTED_KEY: &str = "standin.session.restoreHalted";

/// Keyed, process-durable session state.
pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
    fn clear(&mut self, key: &str) -> Result<()>;
}

/// Session store backed by a single JSON object file.
///
/// The file is re-read on every access; nothing is cached, so a store opened
/// by a later process sees exactly what an earlier one wrote.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|err| self.error(err))?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&contents).map_err(|err| self.error(err))? {
            Value::Object(map) => Ok(map),
            other => Err(self.error(format!("expected a JSON object, found {other}"))),
        }
    }

    fn persist(&self, map: &Map<String, Value>) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(map).map_err(|err| self.error(err))?;
        buf.push('\n');
        write_atomic(&self.path, &buf).map_err(|err| self.error(err))
    }

    fn error(&self, message: impl ToString) -> StandinError {
        StandinError::Store {
            location: self.path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        debug!(path = %self.path.display(), key, "writing session state");
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.persist(&map)
    }

    fn clear(&mut self, key: &str) -> Result<()> {
        let mut map = self.load()?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        debug!(path = %self.path.display(), key, "clearing session state");
        self.persist(&map)
    }
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let mut file = File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_reads_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::new(temp.path().join("state/session.json"));
        assert_eq!(store.get(IN_USE_KEY).expect("get"), None);
    }

    #[test]
    fn values_survive_a_fresh_store_instance() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state/session.json");
        let mut writer = FileSessionStore::new(&path);
        writer.set(IN_USE_KEY, json!(true)).expect("set");
        writer.set(OPERATIONS_KEY, json!([])).expect("set");

        let reader = FileSessionStore::new(&path);
        assert_eq!(reader.get(IN_USE_KEY).expect("get"), Some(json!(true)));
        assert_eq!(reader.get(OPERATIONS_KEY).expect("get"), Some(json!([])));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn clear_removes_only_the_named_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = FileSessionStore::new(temp.path().join("session.json"));
        store.set(IN_USE_KEY, json!(true)).expect("set");
        store.set("other.key", json!(1)).expect("set");
        store.clear(IN_USE_KEY).expect("clear");
        store.clear(IN_USE_KEY).expect("clear twice");

        assert_eq!(store.get(IN_USE_KEY).expect("get"), None);
        assert_eq!(store.get("other.key").expect("get"), Some(json!(1)));
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_reset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("session.json");
        fs::write(&path, "[1, 2").expect("write");
        let store = FileSessionStore::new(&path);
        let err = store.get(OPERATIONS_KEY).expect_err("corrupt store");
        assert!(matches!(err, StandinError::Store { .. }));
    }
}
