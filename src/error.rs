//! Error types for the exchange engine
//!
//! `ExchangeError` covers everything that can abort an export, import or
//! backup operation. `IssueKind` is the user-facing classification shared by
//! fatal errors and the recoverable warnings collected in an import outcome.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for exchange operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Snapshot was produced by a newer, incompatible engine
    #[error("Incompatible snapshot version {found} (this build reads up to {supported}.x)")]
    IncompatibleVersion { found: String, supported: u64 },

    /// Bytes are not a readable snapshot
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Snapshot is encrypted but no passphrase was given
    #[error("Snapshot is encrypted and requires a passphrase")]
    PassphraseRequired,

    /// Authentication tag did not verify
    #[error("Wrong passphrase or corrupted encrypted data")]
    WrongPassphrase,

    /// The user cancelled the file selection
    #[error("No file selected")]
    NoFileSelected,

    /// Named backup does not exist in the catalog
    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Data store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encryption setup errors (cipher or key derivation)
    #[error("Encryption error: {0}")]
    Encryption(String),
}

impl ExchangeError {
    /// Create a "malformed document" error
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedDocument(detail.into())
    }

    /// Create a "backup not found" error
    pub fn backup_not_found(name: impl Into<String>) -> Self {
        Self::BackupNotFound(name.into())
    }

    /// Classify this error for the caller
    pub fn kind(&self) -> IssueKind {
        match self {
            Self::IncompatibleVersion { .. } => IssueKind::IncompatibleVersion,
            Self::MalformedDocument(_) | Self::Json(_) => IssueKind::MalformedDocument,
            Self::PassphraseRequired => IssueKind::PassphraseRequired,
            Self::WrongPassphrase => IssueKind::WrongPassphrase,
            Self::NoFileSelected => IssueKind::NoFileSelected,
            Self::BackupNotFound(_) => IssueKind::BackupNotFound,
            Self::Storage(_) => IssueKind::StoreFailure,
            Self::Config(_) | Self::Io(_) | Self::Encryption(_) => IssueKind::TransportFailure,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BackupNotFound(_))
    }

    /// Check if the user can fix this by supplying another passphrase
    pub fn is_passphrase_problem(&self) -> bool {
        matches!(self, Self::PassphraseRequired | Self::WrongPassphrase)
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Class of a problem reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    // Fatal
    IncompatibleVersion,
    MalformedDocument,
    PassphraseRequired,
    WrongPassphrase,
    NoFileSelected,
    BackupNotFound,
    TransportFailure,

    // Per record
    InvalidRecord,
    StoreFailure,

    // Warnings
    ChecksumMismatch,
    UnknownMinorField,
    NewerMinorVersion,
    PartialCollectionFailure,
    SkippedDuplicate,
}

impl IssueKind {
    /// Stable name of this class
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncompatibleVersion => "IncompatibleVersion",
            Self::MalformedDocument => "MalformedDocument",
            Self::PassphraseRequired => "PassphraseRequired",
            Self::WrongPassphrase => "WrongPassphrase",
            Self::NoFileSelected => "NoFileSelected",
            Self::BackupNotFound => "BackupNotFound",
            Self::TransportFailure => "TransportFailure",
            Self::InvalidRecord => "InvalidRecord",
            Self::StoreFailure => "StoreFailure",
            Self::ChecksumMismatch => "ChecksumMismatch",
            Self::UnknownMinorField => "UnknownMinorField",
            Self::NewerMinorVersion => "NewerMinorVersion",
            Self::PartialCollectionFailure => "PartialCollectionFailure",
            Self::SkippedDuplicate => "SkippedDuplicate",
        }
    }

    /// Whether this class aborts the whole operation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleVersion
                | Self::MalformedDocument
                | Self::PassphraseRequired
                | Self::WrongPassphrase
                | Self::NoFileSelected
                | Self::BackupNotFound
                | Self::TransportFailure
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified message in an import outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl From<&ExchangeError> for Issue {
    fn from(err: &ExchangeError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}
