//! Zone error types.

use std::path::PathBuf;

use thiserror::Error;

use zonewright_commit::CommitError;
use zonewright_conf::ConfError;

/// Result type for zone operations.
pub type Result<T> = std::result::Result<T, ZoneError>;

/// Errors that can occur while working with zone master files.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// No record matched the selector.
    #[error("record not found: {name} {rtype}")]
    RecordNotFound {
        /// Owner name searched for.
        name: String,
        /// Record type searched for.
        rtype: String,
    },

    /// More than one record matched a selector without a value.
    #[error("{count} records match {name} {rtype}; give the record value to pick one")]
    AmbiguousRecord {
        /// Owner name searched for.
        name: String,
        /// Record type searched for.
        rtype: String,
        /// Number of matches.
        count: usize,
    },

    /// A record failed validation.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// A zone name was rejected.
    #[error(transparent)]
    Name(#[from] ConfError),

    /// Reading a zone file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The commit pipeline failed.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl ZoneError {
    /// Creates a new invalid record error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}
