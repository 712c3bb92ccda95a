//! Error taxonomy for session staging, injection, and restore.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::CompensationRecord;
use crate::exit_codes;

#[derive(Debug, Error)]
pub enum StandinError {
    /// Configuration is missing or malformed. Raised before any mutation.
    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// An enforced variable's source does not exist.
    #[error("required source for {variable} does not exist: {path}")]
    MissingRequiredSource { variable: String, path: PathBuf },

    /// A copy, delete, or create failed at the OS level.
    #[error("{op} {path}: {source}")]
    Mutation {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A compensation step failed during reverse replay. Replay stopped here.
    #[error("restore halted at record #{index} ({record}): {source}")]
    Restore {
        index: usize,
        record: CompensationRecord,
        #[source]
        source: Box<StandinError>,
    },

    /// An earlier restore halted and its backups have not been dealt with.
    #[error(
        "an earlier restore halted at record #{index} ({record}); recover originals from the backup tree, then run `standin discard`"
    )]
    RestoreBlocked {
        index: usize,
        record: CompensationRecord,
    },

    /// Persisted session state could not be read or written.
    #[error("session store {location}: {message}")]
    Store { location: String, message: String },
}

impl StandinError {
    /// Stable process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::MissingRequiredSource { .. } => exit_codes::INVALID,
            Self::Mutation { .. }
            | Self::Restore { .. }
            | Self::RestoreBlocked { .. }
            | Self::Store { .. } => exit_codes::FAILED,
        }
    }
}

/// Build a `map_err` adapter that tags an I/O error with the failed operation.
pub(crate) fn mutation(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> StandinError {
    let path = path.to_path_buf();
    move |source| StandinError::Mutation { op, path, source }
}

pub type Result<T, E = StandinError> = std::result::Result<T, E>;
