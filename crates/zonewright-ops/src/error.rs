//! Operation error types.

use thiserror::Error;

use zonewright_commit::CommitError;
use zonewright_conf::ConfError;
use zonewright_config::ConfigError;
use zonewright_zone::ZoneError;

/// Result type for operations.
pub type Result<T> = std::result::Result<T, OpsError>;

/// Errors returned by zone and view operations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// The configuration document could not be read or edited.
    #[error(transparent)]
    Conf(#[from] ConfError),

    /// A zone file operation failed.
    #[error(transparent)]
    Zone(#[from] ZoneError),

    /// A commit failed.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Tool configuration or settings failed to load.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The zone is already declared.
    #[error("zone {0} already exists")]
    ZoneExists(String),

    /// A view still holds zones and deletion was not forced.
    #[error("view {view} still contains zones: {}", .zones.join(", "))]
    ViewNotEmpty {
        /// View name.
        view: String,
        /// Zones still in the view.
        zones: Vec<String>,
    },

    /// The operation does not apply to this zone.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl OpsError {
    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Returns true if a zone, view or record was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Conf(e) => e.is_not_found(),
            Self::Zone(ZoneError::RecordNotFound { .. }) => true,
            Self::Zone(ZoneError::Name(e)) => e.is_not_found(),
            _ => false,
        }
    }
}
