//! Reverse replay of the operation log.
//!
//! Records are applied newest first. Staging appends backups, then removals
//! of the originals, then markers for injected paths; walking backwards undoes
//! the injection before any backup is written back, so nothing later in the
//! session can clobber a restored original.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, error, info, instrument, warn};

use crate::core::types::{Action, CompensationRecord, NodeKind};
use crate::error::{Result, StandinError, mutation};
use crate::io::mutator::{copy_tree, node_kind, remove_tree};
use crate::io::oplog::{HaltMarker, HaltedRestore, OperationLog, SessionFlag};
use crate::io::store::SessionStore;

/// Summary of one restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Records whose compensation was applied.
    pub replayed: usize,
    /// Records with an action/kind pair that has no compensation.
    pub skipped: usize,
    /// True when the pass completed and session state was cleared.
    pub cleaned_up: bool,
}

/// Applies the compensating step for a single record.
pub trait Compensator {
    /// Returns `Ok(false)` when the record has no compensation.
    fn compensate(&mut self, record: &CompensationRecord) -> Result<bool>;
}

/// Filesystem-backed compensator used outside tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsCompensator;

impl Compensator for FsCompensator {
    fn compensate(&mut self, record: &CompensationRecord) -> Result<bool> {
        match (record.action, record.node_kind) {
            (Action::Delete, _) => {
                debug!(path = %record.source_path.display(), "deleting");
                remove_tree(&record.source_path)?;
            }
            (Action::Create, NodeKind::Directory) => {
                // Only the directory itself is guaranteed; its former contents
                // are not rebuilt from the backup.
                debug!(path = %record.source_path.display(), "recreating directory");
                fs::create_dir_all(&record.source_path)
                    .map_err(mutation("recreate directory", &record.source_path))?;
            }
            (Action::Copy, NodeKind::File) => {
                let backup = &record.destination_path;
                if node_kind(backup).is_none() {
                    return Err(mutation("read backup", backup)(io::Error::new(
                        io::ErrorKind::NotFound,
                        "backup no longer exists",
                    )));
                }
                debug!(
                    backup = %backup.display(),
                    original = %record.source_path.display(),
                    "writing backup over original"
                );
                copy_tree::<dyn SessionStore>(backup, &record.source_path, None)?;
            }
            (Action::Copy, NodeKind::Directory) | (Action::Create, NodeKind::File) => {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Replay and clear the active session's log using the filesystem.
pub fn restore<S: SessionStore + ?Sized>(store: &mut S, backup_dir: &Path) -> Result<RestoreReport> {
    restore_with(store, backup_dir, &mut FsCompensator)
}

/// Replay and clear the active session's log with `compensator`.
///
/// With no log and no in-use flag this is a no-op. Otherwise the log is
/// drained up front and replayed in strict reverse order. The first failing
/// step halts the pass: records not yet replayed are gone, the failed record
/// is persisted as a [`HaltMarker`], and the in-use flag and `backup_dir` are
/// left behind for manual repair. Every later restore is refused with
/// `RestoreBlocked` until [`discard`] clears the marker. After a full pass
/// the backup tree is removed and the flag is cleared.
#[instrument(skip_all, fields(backup_dir = %backup_dir.display()))]
pub fn restore_with<S, C>(
    store: &mut S,
    backup_dir: &Path,
    compensator: &mut C,
) -> Result<RestoreReport>
where
    S: SessionStore + ?Sized,
    C: Compensator + ?Sized,
{
    if let Some(halted) = HaltMarker::new(store).get()? {
        warn!(index = halted.index, record = %halted.record, "earlier restore halted, refusing to continue");
        return Err(StandinError::RestoreBlocked {
            index: halted.index,
            record: halted.record,
        });
    }

    let in_use = SessionFlag::new(store).is_set()?;
    let has_log = OperationLog::new(store).is_present()?;
    if !in_use && !has_log {
        debug!("no pending compensations");
        return Ok(RestoreReport::default());
    }

    let queue = OperationLog::new(store).drain_for_replay()?;
    info!(records = queue.len(), "reverting session");

    let mut report = RestoreReport::default();
    for (index, record) in queue {
        match compensator.compensate(&record) {
            Ok(true) => report.replayed += 1,
            Ok(false) => {
                warn!(index, %record, "no compensation for record, skipping");
                report.skipped += 1;
            }
            Err(err) => {
                error!(index, %record, error = %err, "restore halted");
                HaltMarker::new(store).set(&HaltedRestore {
                    index,
                    record: record.clone(),
                })?;
                return Err(StandinError::Restore {
                    index,
                    record,
                    source: Box::new(err),
                });
            }
        }
    }

    remove_tree(backup_dir)?;
    SessionFlag::new(store).clear()?;
    report.cleaned_up = true;
    info!(replayed = report.replayed, skipped = report.skipped, "session restored");
    Ok(report)
}

/// Forget the session without replaying it.
///
/// Clears the log, the in-use flag, and any halt marker, then removes
/// `backup_dir`. Originals that only exist in the backup tree are lost, so
/// this is only reached through an explicit `standin discard`.
#[instrument(skip_all, fields(backup_dir = %backup_dir.display()))]
pub fn discard<S: SessionStore + ?Sized>(store: &mut S, backup_dir: &Path) -> Result<usize> {
    let dropped = OperationLog::new(store).drain_for_replay()?.len();
    remove_tree(backup_dir)?;
    HaltMarker::new(store).clear()?;
    SessionFlag::new(store).clear()?;
    warn!(dropped, "session discarded without restore");
    Ok(dropped)
}
