//! Transport adapters
//!
//! A transport moves snapshot bytes between the engine and the user. The
//! engine never touches paths or dialogs directly; the embedding application
//! picks the adapter that matches its runtime:
//! - `FilesystemTransport` for a privileged host with filesystem access
//! - `SandboxedTransport` for a sandboxed host that can only offer downloads
//!   and accept uploads

mod filesystem;
mod sandboxed;

pub use filesystem::{FilePicker, FilesystemTransport, FixedPicker};
pub use sandboxed::{MemoryHost, SandboxHost, SandboxedTransport};

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ExchangeResult;

/// Where written bytes ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File written on the local filesystem
    Path(PathBuf),
    /// Download handed to a sandboxed host, identified by file name
    Download(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Download(name) => write!(f, "download:{}", name),
        }
    }
}

/// Byte sink and source for snapshots
#[async_trait]
pub trait Transport: Send + Sync {
    /// Persist or hand off `bytes`; `name_hint` is a suggested file name
    async fn write(&self, name_hint: &str, bytes: &[u8]) -> ExchangeResult<Location>;

    /// Obtain bytes chosen by the user
    ///
    /// Returns `ExchangeError::NoFileSelected` when the user cancels.
    async fn read(&self) -> ExchangeResult<Vec<u8>>;
}
