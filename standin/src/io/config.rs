//! Session configuration stored under `.standin/config.toml`.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::core::types::{Strategy, Variable};
use crate::error::{Result, StandinError};

static VARIABLE_NAME_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Substitution configuration (TOML).
///
/// Missing fields default to a replace strategy that restores on exit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StandinConfig {
    /// `replace` removes a destination before injecting; `merge` writes over it.
    pub strategy: Strategy,

    /// Back up destinations so session end can put them back.
    pub restore_after_exit: bool,

    pub variables: Vec<Variable>,
}

impl Default for StandinConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Replace,
            restore_after_exit: true,
            variables: Vec::new(),
        }
    }
}

impl StandinConfig {
    /// Check names and paths. Variable names double as backup slot names,
    /// so they must be identifier-like and unique.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = BTreeSet::new();
        for variable in &self.variables {
            if !VARIABLE_NAME_RE.is_match(&variable.name) {
                return Err(format!("invalid variable name {:?}", variable.name));
            }
            if !seen.insert(variable.name.as_str()) {
                return Err(format!("duplicate variable name {:?}", variable.name));
            }
            if variable.source_path.as_os_str().is_empty() {
                return Err(format!("variable {} has an empty source_path", variable.name));
            }
            if variable.destination_path.as_os_str().is_empty() {
                return Err(format!(
                    "variable {} has an empty destination_path",
                    variable.name
                ));
            }
        }
        Ok(())
    }
}

/// Load and validate config from a TOML file.
pub fn load_config(path: &Path) -> Result<StandinConfig> {
    let invalid = |message: String| StandinError::Config {
        path: path.to_path_buf(),
        message,
    };
    if !path.exists() {
        return Err(invalid("config file not found".to_string()));
    }
    let contents = fs::read_to_string(path).map_err(|err| invalid(err.to_string()))?;
    let cfg: StandinConfig = toml::from_str(&contents).map_err(|err| invalid(err.to_string()))?;
    cfg.validate().map_err(invalid)?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &StandinConfig) -> Result<()> {
    let invalid = |message: String| StandinError::Config {
        path: path.to_path_buf(),
        message,
    };
    cfg.validate().map_err(invalid)?;
    let mut buf = toml::to_string_pretty(cfg).map_err(|err| invalid(err.to_string()))?;
    buf.push('\n');
    write_atomic(path, &buf).map_err(|err| invalid(err.to_string()))
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}
