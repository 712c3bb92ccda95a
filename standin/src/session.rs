//! Orchestration for one substitution session.
//!
//! A session starts on a "session started" trigger: any stale session is
//! restored first, original destinations are backed up, destinations are
//! optionally removed, and substitutes are injected. Every step appends its
//! compensation to the operation log before touching the filesystem. The
//! "session ended" trigger replays that log in reverse.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::core::path::{absolutize, backup_slot, injection_source};
use crate::core::types::{CompensationRecord, Decision, NodeKind, Strategy, Variable};
use crate::error::{Result, mutation};
use crate::io::config::StandinConfig;
use crate::io::mutator::{copy_tree, node_kind, remove_tree, resolve_file_target};
use crate::io::oplog::{OperationLog, SessionFlag};
use crate::io::restore::{RestoreReport, restore};
use crate::io::store::SessionStore;

/// Inputs supplied by the session-started trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Root that relative destinations and the backup tree hang off.
    pub workspace_root: PathBuf,
    /// Environment visible to the session (variable name -> source directory).
    pub env: BTreeMap<String, String>,
    /// Process every configured variable, not just those named in `env`.
    pub forced: bool,
}

/// Answers the revert-or-continue question for a missing required source.
pub trait DecisionSource {
    fn decide(&mut self, variable: &Variable, missing: &Path) -> Decision;
}

impl<F> DecisionSource for F
where
    F: FnMut(&Variable, &Path) -> Decision,
{
    fn decide(&mut self, variable: &Variable, missing: &Path) -> Decision {
        self(variable, missing)
    }
}

/// What a start pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartSummary {
    /// Report of the stale session restored before staging, if any.
    pub healed: Option<RestoreReport>,
    /// Variables whose destination existed and was backed up.
    pub backed_up: Vec<String>,
    /// Destinations removed by the replace strategy.
    pub removed: Vec<PathBuf>,
    /// Paths written by injection.
    pub injected: Vec<PathBuf>,
    /// Variables skipped because their source was missing.
    pub skipped: Vec<String>,
}

/// Result of a start pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Staging and injection ran to the end.
    Started(StartSummary),
    /// A required source was missing and the caller chose to continue.
    ///
    /// Injection stopped at `variable`; it and every variable after it are in
    /// `summary.skipped`. The session stays active with everything logged so
    /// far, and ending it restores as usual.
    Halted {
        summary: StartSummary,
        variable: String,
        missing: PathBuf,
    },
    /// A required source was missing and the caller chose to revert.
    Reverted {
        summary: StartSummary,
        variable: String,
        missing: PathBuf,
        restore: RestoreReport,
    },
}

/// Handle the session-started trigger.
///
/// MutationFailure from any phase aborts the remainder of the pass; records
/// appended so far stay in the log and are replayed by the next restore.
#[instrument(skip_all, fields(workspace = %ctx.workspace_root.display(), forced = ctx.forced))]
pub fn start_session<S, D>(
    store: &mut S,
    backup_dir: &Path,
    config: &StandinConfig,
    ctx: &SessionContext,
    decisions: &mut D,
) -> Result<StartOutcome>
where
    S: SessionStore + ?Sized,
    D: DecisionSource + ?Sized,
{
    let mut summary = StartSummary::default();

    let in_use = SessionFlag::new(store).is_set()?;
    let pending = OperationLog::new(store).len()?;
    if in_use || pending > 0 {
        warn!("previous session was not restored, restoring it first");
        summary.healed = Some(restore(store, backup_dir)?);
    }

    let variables: Vec<&Variable> = config
        .variables
        .iter()
        .filter(|v| ctx.forced || ctx.env.contains_key(&v.name))
        .collect();
    if variables.is_empty() {
        info!("no variables apply to this session");
        return Ok(StartOutcome::Started(summary));
    }

    SessionFlag::new(store).set()?;
    OperationLog::new(store).ensure_started()?;
    fs::create_dir_all(backup_dir).map_err(mutation("create backup directory", backup_dir))?;
    debug!(backup_dir = %backup_dir.display(), "staging");

    if config.restore_after_exit {
        back_up(store, backup_dir, &variables, ctx, &mut summary)?;
    }

    if config.strategy == Strategy::Replace {
        remove_destinations(store, &variables, ctx, &mut summary)?;
    }

    for (position, variable) in variables.iter().enumerate() {
        let source = injection_source(
            ctx.env.get(&variable.name).map(String::as_str),
            &variable.source_path,
            &ctx.workspace_root,
        );
        let destination = absolutize(&variable.destination_path, &ctx.workspace_root);

        let Some(kind) = node_kind(&source) else {
            if !variable.enforce {
                debug!(variable = %variable.name, source = %source.display(), "optional source missing, skipping");
                summary.skipped.push(variable.name.clone());
                continue;
            }
            match decisions.decide(variable, &source) {
                Decision::Continue => {
                    warn!(variable = %variable.name, source = %source.display(), "required source missing, halting injection");
                    summary
                        .skipped
                        .extend(variables[position..].iter().map(|v| v.name.clone()));
                    return Ok(StartOutcome::Halted {
                        summary,
                        variable: variable.name.clone(),
                        missing: source,
                    });
                }
                Decision::Revert => {
                    warn!(variable = %variable.name, source = %source.display(), "required source missing, reverting");
                    let report = restore(store, backup_dir)?;
                    return Ok(StartOutcome::Reverted {
                        summary,
                        variable: variable.name.clone(),
                        missing: source,
                        restore: report,
                    });
                }
            }
        };

        let target = match kind {
            NodeKind::File => resolve_file_target(&source, &destination),
            NodeKind::Directory => destination.clone(),
        };
        OperationLog::new(store).append(CompensationRecord::delete(kind, &target))?;
        copy_tree::<S>(&source, &destination, None)?;
        info!(variable = %variable.name, source = %source.display(), target = %target.display(), "injected");
        summary.injected.push(target);
    }

    info!(
        injected = summary.injected.len(),
        skipped = summary.skipped.len(),
        "session started"
    );
    Ok(StartOutcome::Started(summary))
}

/// Handle the session-ended trigger (normal or forced).
pub fn end_session<S: SessionStore + ?Sized>(
    store: &mut S,
    backup_dir: &Path,
) -> Result<RestoreReport> {
    restore(store, backup_dir)
}

fn back_up<S: SessionStore + ?Sized>(
    store: &mut S,
    backup_dir: &Path,
    variables: &[&Variable],
    ctx: &SessionContext,
    summary: &mut StartSummary,
) -> Result<()> {
    for variable in variables {
        let destination = absolutize(&variable.destination_path, &ctx.workspace_root);
        let slot = backup_slot(backup_dir, &variable.name);
        fs::create_dir_all(&slot).map_err(mutation("create backup slot", &slot))?;
        if node_kind(&destination).is_none() {
            debug!(variable = %variable.name, "destination absent, nothing to back up");
            continue;
        }
        copy_tree(&destination, &slot, Some(&mut OperationLog::new(store)))?;
        debug!(variable = %variable.name, slot = %slot.display(), "backed up");
        summary.backed_up.push(variable.name.clone());
    }
    Ok(())
}

fn remove_destinations<S: SessionStore + ?Sized>(
    store: &mut S,
    variables: &[&Variable],
    ctx: &SessionContext,
    summary: &mut StartSummary,
) -> Result<()> {
    for variable in variables {
        let destination = absolutize(&variable.destination_path, &ctx.workspace_root);
        let Some(kind) = node_kind(&destination) else {
            continue;
        };
        OperationLog::new(store).append(CompensationRecord::delete(kind, &destination))?;
        remove_tree(&destination)?;
        debug!(destination = %destination.display(), "removed for replace");
        summary.removed.push(destination);
    }
    Ok(())
}
