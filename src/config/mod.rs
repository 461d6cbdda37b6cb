//! Configuration
//!
//! - Path resolution for data, backups and exports
//! - Exchange settings persistence

pub mod paths;
pub mod settings;

pub use paths::ExchangePaths;
pub use settings::{BackupRetention, ExchangeSettings};
