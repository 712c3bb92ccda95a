//! Recursive copy/remove helpers that log compensation records on request.
//!
//! A record is always appended before the mutation it describes. If the
//! process dies in between, the log names an action that may or may not have
//! happened, and replay is written to tolerate both.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::types::{CompensationRecord, NodeKind};
use crate::error::{Result, mutation};
use crate::io::oplog::OperationLog;
use crate::io::store::SessionStore;

/// Classify `path` without following symlinks. `None` if it does not exist.
pub fn node_kind(path: &Path) -> Option<NodeKind> {
    let meta = fs::symlink_metadata(path).ok()?;
    if meta.is_dir() {
        Some(NodeKind::Directory)
    } else {
        Some(NodeKind::File)
    }
}

/// Where a file copied onto `destination` lands.
///
/// An existing directory receives the file under its own basename; anything
/// else is overwritten in place.
pub fn resolve_file_target(source: &Path, destination: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) if destination.is_dir() => destination.join(name),
        _ => destination.to_path_buf(),
    }
}

/// Copy `source` onto `destination`, recursing into directories.
///
/// With a log, the top-level step is recorded first: `Create` for a directory,
/// `Copy` for a file. Descendants are never recorded individually. A missing
/// source is a silent no-op.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination.display(), logged = log.is_some()))]
pub fn copy_tree<S: SessionStore + ?Sized>(
    source: &Path,
    destination: &Path,
    log: Option<&mut OperationLog<'_, S>>,
) -> Result<()> {
    let Some(kind) = node_kind(source) else {
        debug!("source missing, nothing to copy");
        return Ok(());
    };

    match kind {
        NodeKind::Directory => {
            if let Some(log) = log {
                log.append(CompensationRecord::create_directory(source, destination))?;
            }
            create_directory(destination)?;
            for child in sorted_children(source)? {
                let name = child.file_name().unwrap_or_default();
                copy_tree::<S>(&child, &destination.join(name), None)?;
            }
        }
        NodeKind::File => {
            let target = resolve_file_target(source, destination);
            if let Some(log) = log {
                log.append(CompensationRecord::copy_file(source, &target))?;
            }
            fs::copy(source, &target).map_err(mutation("copy file to", &target))?;
            debug!(target = %target.display(), "copied file");
        }
    }
    Ok(())
}

/// Remove `path` and everything below it. Absent paths are fine.
pub fn remove_tree(path: &Path) -> Result<()> {
    let result = match node_kind(path) {
        None => return Ok(()),
        Some(NodeKind::Directory) => fs::remove_dir_all(path),
        Some(NodeKind::File) => fs::remove_file(path),
    };
    match result {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(mutation("remove", path)(err)),
    }
}

/// Create a single directory level, reusing one that already exists.
fn create_directory(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(err) => Err(mutation("create directory", path)(err)),
    }
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(mutation("read directory", dir))? {
        let entry = entry.map_err(mutation("read directory", dir))?;
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}
