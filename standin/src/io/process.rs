//! Child process helper for `standin run`.
//!
//! The wrapped command *is* the session: it starts after injection and the
//! session ends when it exits, times out, or fails to spawn.

use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::exit_codes;

/// How the session command finished.
#[derive(Debug)]
pub struct CommandOutcome {
    pub status: ExitStatus,
    pub timed_out: bool,
}

impl CommandOutcome {
    /// Exit code to propagate; signals and timeouts map to `FAILED`.
    pub fn exit_code(&self) -> i32 {
        if self.timed_out {
            return exit_codes::FAILED;
        }
        self.status.code().unwrap_or(exit_codes::FAILED)
    }
}

/// Run `cmd` with inherited stdio, killing it once `timeout` elapses.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs())))]
pub fn run_inherited(mut cmd: Command, timeout: Option<Duration>) -> Result<CommandOutcome> {
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    debug!("spawning session command");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn session command");
        }
    };

    let Some(timeout) = timeout else {
        let status = child.wait().context("wait for session command")?;
        debug!(exit_code = ?status.code(), "session command finished");
        return Ok(CommandOutcome {
            status,
            timed_out: false,
        });
    };

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for session command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "session command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill session command")?;
            child.wait().context("wait session command after kill")?
        }
    };

    debug!(exit_code = ?status.code(), timed_out, "session command finished");
    Ok(CommandOutcome { status, timed_out })
}
