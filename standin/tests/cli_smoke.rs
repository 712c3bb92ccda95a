//! CLI tests for the `standin` binary.
//!
//! Spawns the binary against a temp workspace and checks exit codes and the
//! on-disk effect of each subcommand.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use standin::core::types::{Strategy, Variable};
use standin::exit_codes;
use standin::io::config::{StandinConfig, write_config};
use standin::io::init::{InitOptions, StandinPaths, init_standin};

fn standin(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_standin"))
        .current_dir(root)
        .args(args)
        .output()
        .expect("spawn standin")
}

/// Initialized workspace with one enforced `DB` variable on `config/db.json`.
fn workspace() -> (tempfile::TempDir, StandinPaths) {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = init_standin(temp.path(), &InitOptions { force: false }).expect("init");
    let config = StandinConfig {
        strategy: Strategy::Replace,
        restore_after_exit: true,
        variables: vec![Variable {
            name: "DB".to_string(),
            source_path: PathBuf::from("db.json"),
            destination_path: PathBuf::from("config/db.json"),
            enforce: true,
        }],
    };
    write_config(&paths.config_path, &config).expect("write config");
    fs::create_dir_all(temp.path().join("config")).expect("mkdir");
    fs::write(temp.path().join("config/db.json"), "original").expect("write original");
    fs::create_dir_all(temp.path().join("env1")).expect("mkdir env");
    fs::write(temp.path().join("env1/db.json"), "substitute").expect("write substitute");
    (temp, paths)
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");

    let first = standin(temp.path(), &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join(".standin/config.toml").is_file());

    let second = standin(temp.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));

    let forced = standin(temp.path(), &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn start_status_end_round_trip() {
    let (temp, paths) = workspace();
    let env_dir = temp.path().join("env1");
    let env_arg = format!("DB={}", env_dir.display());

    let start = standin(temp.path(), &["start", "--env", &env_arg]);
    assert_eq!(start.status.code(), Some(exit_codes::OK));
    assert_eq!(
        fs::read_to_string(temp.path().join("config/db.json")).expect("read"),
        "substitute"
    );
    assert!(paths.session_path.is_file());

    let status = standin(temp.path(), &["status"]);
    assert_eq!(status.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&status.stdout);
    assert!(stdout.contains("session: in use"), "stdout: {stdout}");
    assert!(stdout.contains("pending compensations: 3"), "stdout: {stdout}");

    let end = standin(temp.path(), &["end"]);
    assert_eq!(end.status.code(), Some(exit_codes::OK));
    assert_eq!(
        fs::read_to_string(temp.path().join("config/db.json")).expect("read"),
        "original"
    );
    assert!(!paths.backup_dir.exists());

    let idle = standin(temp.path(), &["status"]);
    assert!(String::from_utf8_lossy(&idle.stdout).contains("session: idle"));
}

#[test]
fn missing_required_source_with_revert_exits_reverted() {
    let (temp, paths) = workspace();
    let env_arg = format!("DB={}", temp.path().join("nowhere").display());

    let start = standin(
        temp.path(),
        &["start", "--env", &env_arg, "--on-missing", "revert"],
    );
    assert_eq!(start.status.code(), Some(exit_codes::REVERTED));
    assert_eq!(
        fs::read_to_string(temp.path().join("config/db.json")).expect("read"),
        "original"
    );
    assert!(!paths.backup_dir.exists());
}

#[test]
fn start_without_config_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let start = standin(temp.path(), &["start", "--force"]);
    assert_eq!(start.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn end_without_session_reports_nothing_to_restore() {
    let temp = tempfile::tempdir().expect("tempdir");
    let end = standin(temp.path(), &["--workspace", &temp.path().display().to_string(), "end"]);
    assert_eq!(end.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&end.stdout).contains("nothing to restore"));
}

#[cfg(unix)]
#[test]
fn run_wraps_command_in_a_session() {
    let (temp, paths) = workspace();

    let output = Command::new(env!("CARGO_BIN_EXE_standin"))
        .current_dir(temp.path())
        .env("DB", temp.path().join("env1"))
        .args([
            "run",
            "--on-missing",
            "continue",
            "--",
            "sh",
            "-c",
            "cat config/db.json > seen.txt; exit 5",
        ])
        .output()
        .expect("spawn standin run");

    assert_eq!(output.status.code(), Some(5));
    assert_eq!(
        fs::read_to_string(temp.path().join("seen.txt")).expect("read seen"),
        "substitute"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("config/db.json")).expect("read"),
        "original"
    );
    assert!(!paths.backup_dir.exists());
}

/// Two variables staged, then the newer backup disappears mid-session.
fn halted_restore_workspace() -> (tempfile::TempDir, StandinPaths) {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = init_standin(temp.path(), &InitOptions { force: false }).expect("init");
    let config = StandinConfig {
        strategy: Strategy::Replace,
        restore_after_exit: true,
        variables: ["A", "B"]
            .into_iter()
            .map(|name| Variable {
                name: name.to_string(),
                source_path: PathBuf::from(format!("{}.json", name.to_lowercase())),
                destination_path: PathBuf::from(format!("config/{}.json", name.to_lowercase())),
                enforce: true,
            })
            .collect(),
    };
    write_config(&paths.config_path, &config).expect("write config");
    fs::create_dir_all(temp.path().join("config")).expect("mkdir");
    fs::create_dir_all(temp.path().join("env1")).expect("mkdir env");
    for name in ["a", "b"] {
        fs::write(temp.path().join(format!("config/{name}.json")), format!("orig-{name}"))
            .expect("write original");
        fs::write(temp.path().join(format!("env1/{name}.json")), format!("sub-{name}"))
            .expect("write substitute");
    }
    let env = temp.path().join("env1").display().to_string();
    let start = standin(
        temp.path(),
        &["start", "--env", &format!("A={env}"), "--env", &format!("B={env}")],
    );
    assert_eq!(start.status.code(), Some(exit_codes::OK));
    fs::remove_file(paths.backup_dir.join("B/b.json")).expect("lose B backup");

    let end = standin(temp.path(), &["end"]);
    assert_eq!(end.status.code(), Some(exit_codes::FAILED));
    (temp, paths)
}

#[test]
fn halted_restore_keeps_backups_until_discard() {
    let (temp, paths) = halted_restore_workspace();
    let backup_a = paths.backup_dir.join("A/a.json");
    assert!(!temp.path().join("config/a.json").exists());

    let again = standin(temp.path(), &["end"]);
    assert_eq!(again.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&again.stderr).contains("standin discard"));
    assert_eq!(fs::read_to_string(&backup_a).expect("A backup"), "orig-a");

    let status = standin(temp.path(), &["status"]);
    assert!(String::from_utf8_lossy(&status.stdout).contains("restore halted at record #"));

    fs::copy(&backup_a, temp.path().join("config/a.json")).expect("manual repair");
    let discard = standin(temp.path(), &["discard"]);
    assert_eq!(discard.status.code(), Some(exit_codes::OK));
    assert!(!paths.backup_dir.exists());

    let end = standin(temp.path(), &["end"]);
    assert_eq!(end.status.code(), Some(exit_codes::OK));
    assert_eq!(
        fs::read_to_string(temp.path().join("config/a.json")).expect("read"),
        "orig-a"
    );
}

#[cfg(unix)]
#[test]
fn run_after_halted_restore_leaves_backups_alone() {
    let (temp, paths) = halted_restore_workspace();

    let output = Command::new(env!("CARGO_BIN_EXE_standin"))
        .current_dir(temp.path())
        .env("A", temp.path().join("env1"))
        .args(["run", "--on-missing", "continue", "--", "true"])
        .output()
        .expect("spawn standin run");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert_eq!(
        fs::read_to_string(paths.backup_dir.join("A/a.json")).expect("A backup"),
        "orig-a"
    );
}
