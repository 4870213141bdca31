//! Error types for document scanning and editing.

use crate::block::BlockKind;
use thiserror::Error;

/// Errors raised while scanning or editing a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfError {
    /// The named block does not occur in the document.
    #[error("{kind} \"{name}\" not found")]
    NotFound {
        /// Block kind that was searched for.
        kind: BlockKind,
        /// Name that was searched for.
        name: String,
    },

    /// The document is structurally broken around the given offset.
    #[error("malformed document at offset {offset}: {message}")]
    Malformed {
        /// Byte offset where the problem was detected.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// A block with this name already exists where uniqueness is required.
    #[error("{kind} \"{name}\" already exists")]
    Duplicate {
        /// Block kind.
        kind: BlockKind,
        /// Conflicting name.
        name: String,
    },

    /// A caller-supplied value cannot be written into the document.
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Field that was rejected.
        field: String,
        /// Why it was rejected.
        message: String,
    },
}

impl ConfError {
    /// Creates a not-found error.
    pub fn not_found(kind: BlockKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a malformed-document error.
    pub fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid-value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, ConfError>;
