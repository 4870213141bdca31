//! Commit error types.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::checker::CheckError;

/// Result type for commit operations.
pub type Result<T> = std::result::Result<T, CommitError>;

/// Where a commit was when something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    /// Candidate text exists only in memory.
    Draft,
    /// Candidate has been written to a temporary sibling file.
    TempWritten,
    /// The validator accepted the temporary file.
    Validated,
    /// The live file has been copied aside.
    BackedUp,
    /// The temporary file replaced the live file.
    Committed,
    /// The commit was abandoned.
    Failed,
}

impl fmt::Display for CommitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::TempWritten => "temp-written",
            Self::Validated => "validated",
            Self::BackedUp => "backed-up",
            Self::Committed => "committed",
            Self::Failed => "failed",
        })
    }
}

/// Commit errors.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The validator rejected the candidate. The live file is untouched.
    #[error("validation of {target} failed:\n{diagnostic}")]
    ValidationRejected {
        /// File that would have been replaced.
        target: PathBuf,
        /// Validator output, verbatim.
        diagnostic: String,
    },

    /// The validator could not be run. The live file is untouched.
    #[error("could not validate {target}: {source}")]
    Validator {
        /// File that would have been replaced.
        target: PathBuf,
        /// Underlying error.
        #[source]
        source: CheckError,
    },

    /// The server rejected the committed file and the previous version was
    /// restored.
    #[error("reload of {target} failed, {}:\n{diagnostic}", rollback_note(.restored_from))]
    ApplyFailed {
        /// Live file.
        target: PathBuf,
        /// Reload output.
        diagnostic: String,
        /// Backup the live file was restored from, `None` if it was newly
        /// created and has been removed.
        restored_from: Option<PathBuf>,
    },

    /// The server rejected the committed file and restoring the previous
    /// version also failed.
    #[error("reload of {target} failed and rollback failed ({rollback}); {target} may not match the running server:\n{diagnostic}")]
    RollbackFailed {
        /// Live file.
        target: PathBuf,
        /// Reload output.
        diagnostic: String,
        /// Why the rollback failed.
        rollback: io::Error,
    },

    /// A filesystem operation failed.
    #[error("I/O error at stage {stage} on {path}: {source}")]
    Io {
        /// Stage reached before the failure.
        stage: CommitStage,
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

fn rollback_note(restored_from: &Option<PathBuf>) -> String {
    match restored_from {
        Some(path) => format!("restored previous version from {}", path.display()),
        None => "removed the new file".to_string(),
    }
}

impl CommitError {
    /// Creates an I/O error.
    pub fn io(stage: CommitStage, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            stage,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns true if the live file was left as it was before the commit.
    pub fn live_unchanged(&self) -> bool {
        !matches!(self, Self::RollbackFailed { .. })
    }
}
