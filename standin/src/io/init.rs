//! Workspace layout and `.standin/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// All canonical paths within `.standin/` for a workspace root.
#[derive(Debug, Clone)]
pub struct StandinPaths {
    pub root: PathBuf,
    pub standin_dir: PathBuf,
    pub state_dir: PathBuf,
    /// Per-session backup tree; removed after a successful restore.
    pub backup_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub session_path: PathBuf,
}

impl StandinPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let standin_dir = root.join(".standin");
        let state_dir = standin_dir.join("state");
        Self {
            root: root.clone(),
            standin_dir: standin_dir.clone(),
            state_dir: state_dir.clone(),
            backup_dir: standin_dir.join("backup"),
            gitignore_path: standin_dir.join(".gitignore"),
            config_path: standin_dir.join("config.toml"),
            session_path: state_dir.join("session.json"),
        }
    }
}

/// Options for `init_standin`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config.
    pub force: bool,
}

/// Create `.standin/` scaffolding in `root`.
///
/// Fails if a config already exists unless `options.force` is set. Session
/// state is never touched, so re-initializing mid-session is safe.
pub fn init_standin(root: &Path, options: &InitOptions) -> Result<StandinPaths> {
    let paths = StandinPaths::new(root);
    if paths.standin_dir.exists() && !paths.standin_dir.is_dir() {
        return Err(anyhow!(
            "standin init: .standin exists but is not a directory"
        ));
    }
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "standin init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }

    create_dir(&paths.state_dir)?;
    write_file(&paths.gitignore_path, STANDIN_GITIGNORE)?;
    write_file(&paths.config_path, CONFIG_TEMPLATE)?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const STANDIN_GITIGNORE: &str = "backup/\nstate/\n";

const CONFIG_TEMPLATE: &str = r#"# `replace` removes a destination before injecting; `merge` writes over it.
strategy = "replace"

# Back up destinations so `standin end` can put them back.
restore_after_exit = true

# Each variable injects `<env value of name>/<source_path>` onto
# `destination_path` (absolute or relative to the workspace root).
#
# [[variables]]
# name = "DB"
# source_path = "db.json"
# destination_path = "config/db.json"
# enforce = true
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::{StandinConfig, load_config};

    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_standin(temp.path(), &InitOptions { force: false }).expect("init");

        assert!(paths.state_dir.is_dir());
        assert!(paths.config_path.is_file());
        assert!(!paths.backup_dir.exists());
        assert_eq!(
            fs::read_to_string(&paths.gitignore_path).expect("read"),
            STANDIN_GITIGNORE
        );
        let cfg = load_config(&paths.config_path).expect("template parses");
        assert_eq!(cfg, StandinConfig::default());
    }

    #[test]
    fn init_without_force_refuses_existing_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_standin(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_standin(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_with_force_keeps_session_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_standin(temp.path(), &InitOptions { force: false }).expect("init");
        fs::write(&paths.session_path, "{}\n").expect("write session");
        fs::write(&paths.config_path, "custom").expect("write custom");

        init_standin(temp.path(), &InitOptions { force: true }).expect("re-init");

        assert_eq!(
            fs::read_to_string(&paths.config_path).expect("read"),
            CONFIG_TEMPLATE
        );
        assert!(paths.session_path.is_file());
    }
}
