//! Temporary workspace file substitution.
//!
//! `standin start` backs up configured destinations and injects substitutes;
//! `standin end` puts the originals back. `standin run -- <cmd>` wraps both
//! around a command.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};

use standin::core::types::{Decision, Variable};
use standin::error::StandinError;
use standin::exit_codes;
use standin::io::config::load_config;
use standin::io::init::{InitOptions, StandinPaths, init_standin};
use standin::io::oplog::{HaltMarker, OperationLog, SessionFlag};
use standin::io::process::run_inherited;
use standin::io::restore::{RestoreReport, discard};
use standin::io::store::FileSessionStore;
use standin::logging;
use standin::session::{SessionContext, StartOutcome, StartSummary, end_session, start_session};

#[derive(Parser)]
#[command(
    name = "standin",
    version,
    about = "Temporarily substitute workspace files and restore them afterwards"
)]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.standin/config.toml` if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Start a session: back up destinations and inject substitutes.
    Start {
        /// Session environment entry naming a variable's source directory.
        #[arg(long = "env", value_name = "NAME=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
        /// Inject every configured variable, not only those given with --env.
        #[arg(short, long)]
        force: bool,
        /// What to do when an enforced source is missing.
        #[arg(long, value_enum, default_value_t = OnMissing::Ask)]
        on_missing: OnMissing,
    },
    /// End the session and restore original files.
    #[command(alias = "restore")]
    End,
    /// Show whether a session is active and what restore would replay.
    Status,
    /// Drop the session without restoring and delete the backup tree.
    ///
    /// Only needed after a restore halted and originals were recovered by hand.
    Discard,
    /// Run a command inside a session, restoring afterwards.
    Run {
        /// Kill the command after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// What to do when an enforced source is missing.
        #[arg(long, value_enum, default_value_t = OnMissing::Ask)]
        on_missing: OnMissing,
        /// Command and arguments.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnMissing {
    /// Prompt on the terminal.
    Ask,
    Revert,
    Continue,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            let code = err
                .downcast_ref::<StandinError>()
                .map_or(exit_codes::INVALID, StandinError::exit_code);
            std::process::exit(code);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = match cli.workspace {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let paths = StandinPaths::new(root);
    match cli.command {
        Command::Init { force } => cmd_init(&paths, force),
        Command::Start {
            env,
            force,
            on_missing,
        } => cmd_start(&paths, env.into_iter().collect(), force, on_missing),
        Command::End => cmd_end(&paths),
        Command::Status => cmd_status(&paths),
        Command::Discard => cmd_discard(&paths),
        Command::Run {
            timeout,
            on_missing,
            command,
        } => cmd_run(&paths, timeout.map(Duration::from_secs), on_missing, &command),
    }
}

fn cmd_init(paths: &StandinPaths, force: bool) -> Result<i32> {
    let paths = init_standin(&paths.root, &InitOptions { force })?;
    println!("wrote {}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_start(
    paths: &StandinPaths,
    env: BTreeMap<String, String>,
    forced: bool,
    on_missing: OnMissing,
) -> Result<i32> {
    let ctx = SessionContext {
        workspace_root: paths.root.clone(),
        env,
        forced,
    };
    start(paths, &ctx, on_missing)
}

fn cmd_end(paths: &StandinPaths) -> Result<i32> {
    let mut store = FileSessionStore::new(&paths.session_path);
    let report = end_session(&mut store, &paths.backup_dir).context("restore session")?;
    print_restore("restored", &report);
    Ok(exit_codes::OK)
}

fn cmd_status(paths: &StandinPaths) -> Result<i32> {
    let mut store = FileSessionStore::new(&paths.session_path);
    let in_use = SessionFlag::new(&mut store).is_set()?;
    let pending = OperationLog::new(&mut store).pending()?;
    let halted = HaltMarker::new(&mut store).get()?;
    println!("session: {}", if in_use { "in use" } else { "idle" });
    if let Some(halted) = halted {
        println!(
            "restore halted at record #{} ({}); recover originals from {}, then run `standin discard`",
            halted.index,
            halted.record,
            paths.backup_dir.display()
        );
    }
    println!("pending compensations: {}", pending.len());
    for (position, record) in pending.iter().enumerate() {
        println!("  #{} {}", position + 1, record);
    }
    Ok(exit_codes::OK)
}

fn cmd_discard(paths: &StandinPaths) -> Result<i32> {
    let mut store = FileSessionStore::new(&paths.session_path);
    let dropped = discard(&mut store, &paths.backup_dir).context("discard session")?;
    println!("discarded {dropped} pending records");
    Ok(exit_codes::OK)
}

fn cmd_run(
    paths: &StandinPaths,
    timeout: Option<Duration>,
    on_missing: OnMissing,
    command: &[String],
) -> Result<i32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("missing command after --"))?;
    let ctx = SessionContext {
        workspace_root: paths.root.clone(),
        env: std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect(),
        forced: false,
    };
    let code = match start(paths, &ctx, on_missing) {
        Ok(code) => code,
        Err(err) => {
            // Undo whatever part of the pass was logged before the failure,
            // unless a restore already halted and the backups must stay put.
            let mut store = FileSessionStore::new(&paths.session_path);
            if HaltMarker::new(&mut store).get()?.is_some() {
                warn!("restore halted, leaving session for manual repair");
            } else if let Err(restore_err) = end_session(&mut store, &paths.backup_dir) {
                warn!(error = %restore_err, "restore after failed start also failed");
            }
            return Err(err);
        }
    };
    if code != exit_codes::OK {
        return Ok(code);
    }

    let mut cmd = ProcessCommand::new(program);
    cmd.args(args).current_dir(&paths.root);
    let outcome = run_inherited(cmd, timeout);

    // The session ends however the command went.
    let mut store = FileSessionStore::new(&paths.session_path);
    let report = end_session(&mut store, &paths.backup_dir).context("restore session")?;
    print_restore("restored", &report);

    let outcome = outcome?;
    debug!(exit_code = outcome.exit_code(), "session command exited");
    Ok(outcome.exit_code())
}

fn start(paths: &StandinPaths, ctx: &SessionContext, on_missing: OnMissing) -> Result<i32> {
    let config = load_config(&paths.config_path)?;
    let mut store = FileSessionStore::new(&paths.session_path);
    let mut decide = |variable: &Variable, missing: &Path| match on_missing {
        OnMissing::Ask => ask(variable, missing),
        OnMissing::Revert => Decision::Revert,
        OnMissing::Continue => Decision::Continue,
    };
    let outcome = start_session(&mut store, &paths.backup_dir, &config, ctx, &mut decide)
        .context("start session")?;

    match outcome {
        StartOutcome::Started(summary) => {
            print_start(&summary);
            Ok(exit_codes::OK)
        }
        StartOutcome::Halted {
            summary,
            variable,
            missing,
        } => {
            print_start(&summary);
            eprintln!(
                "{variable}: {} does not exist, remaining variables were not injected",
                missing.display()
            );
            Ok(exit_codes::OK)
        }
        StartOutcome::Reverted {
            summary,
            variable,
            missing,
            restore,
        } => {
            print_start(&summary);
            let err = StandinError::MissingRequiredSource {
                variable,
                path: missing,
            };
            eprintln!("{err}");
            print_restore("reverted", &restore);
            Ok(exit_codes::REVERTED)
        }
    }
}

fn ask(variable: &Variable, missing: &Path) -> Decision {
    eprint!(
        "{}: file {} does not exist. Revert? [y/N] ",
        variable.name,
        missing.display()
    );
    let _ = io::stderr().flush();
    ask_with(io::stdin().lock(), variable)
}

/// Read one y/N answer. Anything but yes, including no answer at all, continues.
fn ask_with(mut input: impl BufRead, variable: &Variable) -> Decision {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => {
            warn!(variable = %variable.name, "no answer on stdin, continuing");
            Decision::Continue
        }
        Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Decision::Revert,
            _ => Decision::Continue,
        },
        Err(err) => {
            warn!(variable = %variable.name, error = %err, "could not read answer, continuing");
            Decision::Continue
        }
    }
}

fn print_start(summary: &StartSummary) {
    if let Some(healed) = &summary.healed {
        println!(
            "restored unfinished previous session ({} records)",
            healed.replayed
        );
    }
    for path in &summary.injected {
        println!("injected {}", path.display());
    }
    for name in &summary.skipped {
        println!("skipped {name}");
    }
}

fn print_restore(verb: &str, report: &RestoreReport) {
    if report.cleaned_up {
        println!("{verb} {} records", report.replayed);
    } else {
        println!("nothing to restore");
    }
}

/// Parse `NAME=VALUE` for `--env`.
fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    if name.is_empty() {
        return Err(format!("empty variable name in {raw:?}"));
    }
    Ok((name.to_string(), value.to_string()))
}
