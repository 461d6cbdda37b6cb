//! Rotating backups
//!
//! # Architecture
//!
//! - `BackupManager`: creates full snapshots, lists, restores, prunes and
//!   deletes them. All operations are serialized.
//! - `BackupCatalog`: where the snapshot bytes live. `DirectoryCatalog`
//!   stores `<name>.snapshot` files; `MemoryCatalog` keeps them in memory.
//!
//! # Naming
//!
//! Backups are named `{origin}-{YYYYMMDDTHHMMSSmmmZ}`, for example
//! `scheduled-20251127T143022456Z`. Names are unique within a catalog.
//!
//! # Retention
//!
//! After each create, backups of the same origin beyond the configured count
//! are deleted, oldest first. By default the manager keeps 10 manual and
//! 5 scheduled backups.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mc_l10n_exchange::backup::{BackupManager, BackupOrigin, DirectoryCatalog};
//!
//! let catalog = Arc::new(DirectoryCatalog::new(paths.backup_dir()));
//! let manager = BackupManager::new(engine, catalog);
//!
//! let record = manager.create(BackupOrigin::Scheduled).await?;
//! let outcome = manager.restore(&record.name, None).await;
//! println!("{}", outcome.summary());
//! ```

mod catalog;
mod manager;

pub use catalog::{BackupCatalog, CatalogEntry, DirectoryCatalog, MemoryCatalog, SNAPSHOT_EXTENSION};
pub use manager::{format_backup_name, parse_backup_name, BackupManager, BackupOrigin, BackupRecord};
