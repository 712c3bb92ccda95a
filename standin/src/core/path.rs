//! Pure path resolution rules shared by staging and injection.

use std::path::{Path, PathBuf};

/// Return `target` unchanged if absolute, otherwise joined onto `base`.
pub fn absolutize(target: &Path, base: &Path) -> PathBuf {
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        base.join(target)
    }
}

/// Resolve the live source of a variable.
///
/// `env_value` is the directory the session environment provides for the
/// variable; when absent the workspace root is used. Relative results are
/// anchored at the workspace root.
pub fn injection_source(env_value: Option<&str>, source_path: &Path, workspace: &Path) -> PathBuf {
    let base = match env_value {
        Some(value) if !value.is_empty() => Path::new(value).join(source_path),
        _ => source_path.to_path_buf(),
    };
    absolutize(&base, workspace)
}

/// Directory inside the backup tree that holds one variable's original content.
pub fn backup_slot(backup_dir: &Path, variable_name: &str) -> PathBuf {
    backup_dir.join(variable_name)
}
