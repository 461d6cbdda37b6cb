//! mc-l10n-exchange - snapshot export/import and rotating backups
//!
//! This library moves the local state of the Minecraft localization manager
//! (projects, translation entries, settings, cache) in and out of portable
//! snapshots, and keeps rotating backups of it.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `snapshot`: Snapshot document, serializer, version gate and checksum
//! - `codec`: Compression stage and the encode/decode pipeline
//! - `crypto`: Passphrase-based encryption stage
//! - `merge`: Import merge policies
//! - `storage`: Data store trait and implementations
//! - `transport`: Byte sinks/sources for privileged and sandboxed hosts
//! - `exchange`: The engine wiring everything into export and import
//! - `backup`: Backup catalog and rotation
//! - `config`: Configuration and path management
//! - `error`: Error and issue types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mc_l10n_exchange::config::{ExchangePaths, ExchangeSettings};
//! use mc_l10n_exchange::exchange::{ExchangeEngine, ExportOptions};
//! use mc_l10n_exchange::storage::JsonFileStore;
//! use mc_l10n_exchange::transport::{FilesystemTransport, FixedPicker};
//!
//! let paths = ExchangePaths::new()?;
//! let settings = ExchangeSettings::load_or_create(&paths)?;
//! let engine = ExchangeEngine::new(
//!     Arc::new(JsonFileStore::new(paths.data_dir())),
//!     Arc::new(FilesystemTransport::new(paths.export_dir(), FixedPicker::cancelled())),
//!     settings,
//! );
//!
//! let receipt = engine.export(&ExportOptions::new()).await?;
//! println!("Exported to {}", receipt.location);
//! ```

pub mod backup;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod merge;
pub mod snapshot;
pub mod storage;
pub mod transport;

pub use error::{ExchangeError, ExchangeResult, Issue, IssueKind};
pub use exchange::{ExchangeEngine, ExportOptions, ImportOptions, ImportOutcome};
