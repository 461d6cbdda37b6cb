//! Exchange settings
//!
//! Defaults for exports, imports and backups. Every field has a serde default
//! so older or hand-edited files keep loading.

use serde::{Deserialize, Serialize};

use super::paths::ExchangePaths;
use crate::backup::BackupOrigin;
use crate::codec::Compression;
use crate::crypto::KeyDerivationParams;
use crate::error::{ExchangeError, ExchangeResult};
use crate::merge::MergePolicy;
use crate::storage::write_json_atomic;

/// How many backups of each origin to keep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRetention {
    #[serde(default = "default_retain_manual")]
    pub retain_manual: usize,
    #[serde(default = "default_retain_scheduled")]
    pub retain_scheduled: usize,
}

fn default_retain_manual() -> usize {
    10
}

fn default_retain_scheduled() -> usize {
    5
}

impl Default for BackupRetention {
    fn default() -> Self {
        Self {
            retain_manual: default_retain_manual(),
            retain_scheduled: default_retain_scheduled(),
        }
    }
}

impl BackupRetention {
    pub fn for_origin(&self, origin: BackupOrigin) -> usize {
        match origin {
            BackupOrigin::Manual => self.retain_manual,
            BackupOrigin::Scheduled => self.retain_scheduled,
        }
    }
}

/// Settings for the exchange engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Written into snapshot metadata
    #[serde(default)]
    pub producer_label: String,

    /// Used when an import does not name a policy
    #[serde(default)]
    pub default_policy: MergePolicy,

    /// Compression for user exports
    #[serde(default)]
    pub compression: Compression,

    #[serde(default)]
    pub backup: BackupRetention,

    /// Compression for backups
    #[serde(default = "default_backup_compression")]
    pub backup_compression: Compression,

    /// Argon2id costs for encrypted exports
    #[serde(default)]
    pub kdf: KeyDerivationParams,
}

fn default_schema_version() -> u32 {
    1
}

fn default_backup_compression() -> Compression {
    Compression::zstd()
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            producer_label: String::new(),
            default_policy: MergePolicy::default(),
            compression: Compression::default(),
            backup: BackupRetention::default(),
            backup_compression: default_backup_compression(),
            kdf: KeyDerivationParams::default(),
        }
    }
}

impl ExchangeSettings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &ExchangePaths) -> ExchangeResult<Self> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            // Not persisted until the caller saves
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| ExchangeError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| ExchangeError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &ExchangePaths) -> ExchangeResult<()> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = ExchangeSettings::default();
        assert_eq!(settings.default_policy, MergePolicy::SkipExisting);
        assert_eq!(settings.compression, Compression::None);
        assert_eq!(settings.backup.retain_scheduled, 5);
        assert_eq!(settings.backup.for_origin(BackupOrigin::Manual), 10);
        assert!(settings.backup_compression.is_enabled());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ExchangePaths::with_base_dir(temp_dir.path());

        let mut settings = ExchangeSettings::default();
        settings.producer_label = "workstation".into();
        settings.default_policy = MergePolicy::Overwrite;
        settings.backup.retain_scheduled = 3;

        settings.save(&paths).unwrap();

        let loaded = ExchangeSettings::load_or_create(&paths).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: ExchangeSettings =
            serde_json::from_str(r#"{"producer_label": "laptop", "backup": {}}"#).unwrap();

        assert_eq!(settings.producer_label, "laptop");
        assert_eq!(settings.backup, BackupRetention::default());
        assert_eq!(settings.kdf, KeyDerivationParams::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ExchangePaths::with_base_dir(temp_dir.path());
        std::fs::write(paths.settings_file(), "{ not json").unwrap();

        let err = ExchangeSettings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, ExchangeError::Config(_)));
    }
}
