//! Path management
//!
//! ## Path Resolution Order
//!
//! 1. `MC_L10N_DATA_DIR` environment variable (if set)
//! 2. The platform data directory from `directories::ProjectDirs`
//!    (`~/.local/share/mc-l10n` on Linux, `~/Library/Application Support/...`
//!    on macOS, `%APPDATA%\...` on Windows)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{ExchangeError, ExchangeResult};

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV: &str = "MC_L10N_DATA_DIR";

/// Manages all paths used by the exchange engine
#[derive(Debug, Clone)]
pub struct ExchangePaths {
    base_dir: PathBuf,
}

impl ExchangePaths {
    /// Resolve the base directory from the environment or the platform default
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> ExchangeResult<Self> {
        let base_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create ExchangePaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Record files used by `JsonFileStore`
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Backup catalog directory
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Default target for filesystem exports
    pub fn export_dir(&self) -> PathBuf {
        self.base_dir.join("exports")
    }

    /// Exchange settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> ExchangeResult<()> {
        for (label, dir) in [
            ("base", self.base_dir.clone()),
            ("data", self.data_dir()),
            ("backup", self.backup_dir()),
            ("export", self.export_dir()),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                ExchangeError::Io(format!("Failed to create {} directory: {}", label, e))
            })?;
        }
        Ok(())
    }
}

fn resolve_default_path() -> ExchangeResult<PathBuf> {
    ProjectDirs::from("dev", "mc-l10n", "mc-l10n")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| ExchangeError::Config("Could not determine home directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ExchangePaths::with_base_dir(temp_dir.path());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
        assert_eq!(paths.export_dir(), temp_dir.path().join("exports"));
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var(DATA_DIR_ENV, temp_dir.path());
        let paths = ExchangePaths::new().unwrap();
        env::remove_var(DATA_DIR_ENV);

        assert_eq!(paths.base_dir(), temp_dir.path());
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ExchangePaths::with_base_dir(temp_dir.path().join("root"));

        paths.ensure_directories().unwrap();

        assert!(paths.data_dir().exists());
        assert!(paths.backup_dir().exists());
        assert!(paths.export_dir().exists());
    }
}
