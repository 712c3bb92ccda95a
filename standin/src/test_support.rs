//! Test-only helpers: in-memory session store, scratch workspaces, scripted decisions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::types::{Decision, Variable};
use crate::error::Result as StandinResult;
use crate::io::init::StandinPaths;
use crate::io::store::SessionStore;
use crate::session::SessionContext;

/// Session store kept in memory. Behaves like the file store minus durability.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemorySessionStore {
    values: BTreeMap<String, Value>,
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> StandinResult<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> StandinResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&mut self, key: &str) -> StandinResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Decision source that always answers `decision`.
pub fn always(decision: Decision) -> impl FnMut(&Variable, &Path) -> Decision {
    move |_, _| decision
}

/// Scratch workspace rooted in a temp directory.
pub struct TestWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp workspace")?;
        let root = temp.path().to_path_buf();
        Ok(Self { _temp: temp, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> StandinPaths {
        StandinPaths::new(&self.root)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.paths().backup_dir
    }

    /// Write `contents` to a workspace-relative path, creating parents.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
    }

    /// Read a workspace-relative file.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root.join(rel)).expect("read file")
    }

    /// Session context with the given environment, not forced.
    pub fn context<const N: usize>(&self, env: [(&str, &str); N]) -> SessionContext {
        SessionContext {
            workspace_root: self.root.clone(),
            env: env
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            forced: false,
        }
    }
}
