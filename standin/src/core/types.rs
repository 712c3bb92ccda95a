//! Shared deterministic types for the compensation core.
//!
//! These types define the persisted record format and the small enums passed
//! between the session controller, the mutator, and the restore engine. They
//! must stay free of I/O so their serialized form is stable across runs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Filesystem node kind a compensation record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// Forward action that a record compensates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A file was backed up from `source_path` to `destination_path`.
    Copy,
    /// `source_path` must not exist after restore.
    Delete,
    /// A directory at `source_path` was backed up into `destination_path`.
    Create,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Copy => "copy",
            Self::Delete => "delete",
            Self::Create => "create",
        };
        f.write_str(name)
    }
}

/// One logged description of how to undo a mutating filesystem action.
///
/// Records are immutable once appended. Path semantics depend on `action`:
///
/// | action | `source_path`            | `destination_path`      |
/// |--------|--------------------------|-------------------------|
/// | Copy   | original workspace file  | backup copy             |
/// | Create | original workspace dir   | backup directory        |
/// | Delete | path to remove           | empty                   |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationRecord {
    pub node_kind: NodeKind,
    pub action: Action,
    pub source_path: PathBuf,
    #[serde(default)]
    pub destination_path: PathBuf,
}

impl CompensationRecord {
    /// Backup of a single file: restore copies `backup` back over `original`.
    pub fn copy_file(original: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            node_kind: NodeKind::File,
            action: Action::Copy,
            source_path: original.into(),
            destination_path: backup.into(),
        }
    }

    /// Backup of a directory: restore recreates `original` as a directory.
    pub fn create_directory(original: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            node_kind: NodeKind::Directory,
            action: Action::Create,
            source_path: original.into(),
            destination_path: backup.into(),
        }
    }

    /// Marker that `path` must be removed on restore.
    pub fn delete(kind: NodeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            node_kind: kind,
            action: Action::Delete,
            source_path: path.into(),
            destination_path: PathBuf::new(),
        }
    }
}

impl fmt::Display for CompensationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.node_kind {
            NodeKind::File => "file",
            NodeKind::Directory => "dir",
        };
        if self.destination_path.as_os_str().is_empty() {
            write!(f, "{} {kind} {}", self.action, self.source_path.display())
        } else {
            write!(
                f,
                "{} {kind} {} <- {}",
                self.action,
                self.source_path.display(),
                self.destination_path.display()
            )
        }
    }
}

/// How existing destinations are treated before injection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Remove the destination first, then inject.
    #[default]
    Replace,
    /// Inject on top of whatever exists.
    Merge,
}

/// Answer from the decision callback when a required source is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Restore the session immediately and stop injecting.
    Revert,
    /// Skip the missing variable and keep going.
    Continue,
}

/// A configured substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Environment key whose value is the directory holding `source_path`.
    pub name: String,
    /// Path relative to the environment value.
    pub source_path: PathBuf,
    /// Absolute or workspace-relative path that receives the substitute.
    pub destination_path: PathBuf,
    /// Whether a missing source requires a decision.
    #[serde(default)]
    pub enforce: bool,
}
