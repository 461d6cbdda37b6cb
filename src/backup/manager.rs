//! Backup manager
//!
//! Creates full snapshots into a catalog and keeps the newest few of each
//! origin. Backup names carry their origin and creation time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::crypto::SecureString;
use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::{ExchangeEngine, ExportOptions, ImportOptions, ImportOutcome};
use crate::merge::MergePolicy;
use crate::snapshot::CollectionSet;

use super::catalog::{BackupCatalog, CatalogEntry};

/// What triggered a backup; retention is counted per origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupOrigin {
    Manual,
    Scheduled,
}

impl BackupOrigin {
    pub const ALL: [BackupOrigin; 2] = [BackupOrigin::Manual, BackupOrigin::Scheduled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for BackupOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupOrigin {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| ExchangeError::Config(format!("Unknown backup origin '{}'", s)))
    }
}

/// Metadata about a stored backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// `{origin}-{YYYYMMDDTHHMMSSmmmZ}`
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub byte_size: u64,
    pub origin: BackupOrigin,
}

impl BackupRecord {
    fn from_entry(entry: &CatalogEntry) -> Option<Self> {
        let (origin, created_at) = parse_backup_name(&entry.name)?;
        Some(Self {
            name: entry.name.clone(),
            created_at,
            byte_size: entry.byte_size,
            origin,
        })
    }
}

/// Name under which a backup is stored
pub fn format_backup_name(origin: BackupOrigin, created_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}{:03}Z",
        origin,
        created_at.format("%Y%m%dT%H%M%S"),
        created_at.timestamp_subsec_millis()
    )
}

/// Recover origin and timestamp from a backup name
pub fn parse_backup_name(name: &str) -> Option<(BackupOrigin, DateTime<Utc>)> {
    let (origin, stamp) = name.split_once('-')?;
    let origin = origin.parse().ok()?;

    // Expected format: YYYYMMDDTHHMMSSmmmZ
    let stamp = stamp.strip_suffix('Z')?;
    let (date_part, time_part) = stamp.split_once('T')?;
    if date_part.len() != 8 || time_part.len() != 9 || !stamp.is_ascii() {
        return None;
    }

    let year: i32 = date_part[0..4].parse().ok()?;
    let month: u32 = date_part[4..6].parse().ok()?;
    let day: u32 = date_part[6..8].parse().ok()?;
    let hour: u32 = time_part[0..2].parse().ok()?;
    let minute: u32 = time_part[2..4].parse().ok()?;
    let second: u32 = time_part[4..6].parse().ok()?;
    let millis: u32 = time_part[6..9].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;

    Some((origin, NaiveDateTime::new(date, time).and_utc()))
}

/// Creates, lists, restores and rotates backups
///
/// Every operation holds one async mutex, so a create never interleaves with
/// a prune or restore.
pub struct BackupManager {
    engine: Arc<ExchangeEngine>,
    catalog: Arc<dyn BackupCatalog>,
    lock: Mutex<()>,
}

impl BackupManager {
    pub fn new(engine: Arc<ExchangeEngine>, catalog: Arc<dyn BackupCatalog>) -> Self {
        Self {
            engine,
            catalog,
            lock: Mutex::new(()),
        }
    }

    /// Snapshot all collections into the catalog, then apply retention for `origin`
    pub async fn create(&self, origin: BackupOrigin) -> ExchangeResult<BackupRecord> {
        let _guard = self.lock.lock().await;
        let settings = self.engine.settings();

        let exported = self.engine.export_bytes(
            &ExportOptions::new()
                .with_collections(CollectionSet::all())
                .with_compression(settings.backup_compression),
        )?;

        let existing = self.records().await?;
        let mut created_at = exported.document.created_at.trunc_subsecs(3);
        if let Some(newest) = existing.iter().map(|r| r.created_at).max() {
            if created_at <= newest {
                created_at = newest + Duration::milliseconds(1);
            }
        }

        let name = format_backup_name(origin, created_at);
        self.catalog.put(&name, &exported.bytes).await?;

        let record = BackupRecord {
            name,
            created_at,
            byte_size: exported.bytes.len() as u64,
            origin,
        };
        info!(
            name = %record.name,
            bytes = record.byte_size,
            entities = exported.document.metadata.total_entities(),
            "Backup created"
        );

        let mut records = existing;
        records.push(record.clone());
        sort_newest_first(&mut records);
        let retain = settings.backup.for_origin(origin);
        self.prune_records(&records, |o| (o == origin).then_some(retain))
            .await?;

        Ok(record)
    }

    /// All backups, newest first
    pub async fn list(&self) -> ExchangeResult<Vec<BackupRecord>> {
        let _guard = self.lock.lock().await;
        self.records().await
    }

    /// Most recent backup of an origin
    pub async fn latest(&self, origin: BackupOrigin) -> ExchangeResult<Option<BackupRecord>> {
        Ok(self.list().await?.into_iter().find(|r| r.origin == origin))
    }

    /// Replace current data with the contents of a backup
    pub async fn restore(&self, name: &str, passphrase: Option<&SecureString>) -> ImportOutcome {
        let _guard = self.lock.lock().await;

        let bytes = match self.catalog.get(name).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return ImportOutcome::failed(&ExchangeError::backup_not_found(name)),
            Err(e) => return ImportOutcome::failed(&e),
        };

        let mut options = ImportOptions::new().with_policy(MergePolicy::Overwrite);
        options.passphrase = passphrase.cloned();

        let outcome = self.engine.import_bytes(&bytes, &options);
        info!(name, success = outcome.success, "Backup restored");
        outcome
    }

    /// Keep the newest `retain_count` backups of each origin; returns what was deleted
    pub async fn prune(&self, retain_count: usize) -> ExchangeResult<Vec<BackupRecord>> {
        let _guard = self.lock.lock().await;
        let records = self.records().await?;
        self.prune_records(&records, |_| Some(retain_count)).await
    }

    /// Delete one backup by name
    pub async fn delete(&self, name: &str) -> ExchangeResult<()> {
        let _guard = self.lock.lock().await;
        if self.catalog.delete(name).await? {
            info!(name, "Backup deleted");
            Ok(())
        } else {
            Err(ExchangeError::backup_not_found(name))
        }
    }

    async fn records(&self) -> ExchangeResult<Vec<BackupRecord>> {
        let mut records: Vec<BackupRecord> = self
            .catalog
            .list()
            .await?
            .iter()
            .filter_map(BackupRecord::from_entry)
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Delete everything past the retention of each origin
    ///
    /// `records` must be sorted newest first. Origins mapped to `None` are
    /// left alone.
    async fn prune_records(
        &self,
        records: &[BackupRecord],
        retention: impl Fn(BackupOrigin) -> Option<usize>,
    ) -> ExchangeResult<Vec<BackupRecord>> {
        let mut deleted = Vec::new();

        for origin in BackupOrigin::ALL {
            let Some(retain) = retention(origin) else {
                continue;
            };

            for record in records
                .iter()
                .filter(|r| r.origin == origin)
                .skip(retain)
            {
                self.catalog.delete(&record.name).await?;
                debug!(name = %record.name, "Backup pruned");
                deleted.push(record.clone());
            }
        }

        if !deleted.is_empty() {
            info!(count = deleted.len(), "Old backups pruned");
        }
        Ok(deleted)
    }
}

fn sort_newest_first(records: &mut [BackupRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.name.cmp(&a.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{DirectoryCatalog, MemoryCatalog};
    use crate::config::ExchangeSettings;
    use crate::crypto::key_derivation::test_params;
    use crate::error::IssueKind;
    use crate::snapshot::Collection;
    use crate::storage::{DataStore, MemoryStore};
    use crate::transport::{MemoryHost, SandboxedTransport};
    use chrono::{Datelike, Timelike};
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_manager(
        catalog: Arc<dyn BackupCatalog>,
    ) -> (BackupManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new().with_records(
            Collection::Projects,
            vec![json!({"id": "p1", "name": "Create"})],
        ));

        let mut settings = ExchangeSettings {
            kdf: test_params(),
            ..ExchangeSettings::default()
        };
        settings.backup.retain_manual = 3;
        settings.backup.retain_scheduled = 5;

        let engine = ExchangeEngine::new(
            store.clone(),
            Arc::new(SandboxedTransport::new(MemoryHost::new())),
            settings,
        );
        (BackupManager::new(Arc::new(engine), catalog), store)
    }

    #[test]
    fn test_backup_name_round_trip() {
        let at = DateTime::parse_from_rfc3339("2025-11-27T14:30:22.456Z")
            .unwrap()
            .with_timezone(&Utc);

        let name = format_backup_name(BackupOrigin::Scheduled, at);
        assert_eq!(name, "scheduled-20251127T143022456Z");

        let (origin, parsed) = parse_backup_name(&name).unwrap();
        assert_eq!(origin, BackupOrigin::Scheduled);
        assert_eq!(parsed, at);
        assert_eq!(parsed.year(), 2025);
        assert_eq!(parsed.nanosecond(), 456_000_000);
    }

    #[test]
    fn test_parse_backup_name_rejects_foreign_names() {
        for bad in [
            "backup-20251127-143022",
            "weekly-20251127T143022456Z",
            "manual-20251327T143022456Z",
            "manual-20251127T143022Z",
            "manual",
        ] {
            assert!(parse_backup_name(bad).is_none(), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_create_backup() {
        let (manager, _store) = create_test_manager(Arc::new(MemoryCatalog::new()));

        let record = manager.create(BackupOrigin::Manual).await.unwrap();
        assert!(record.name.starts_with("manual-"));
        assert!(record.byte_size > 0);

        let listed = manager.list().await.unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn test_names_unique_and_listed_newest_first() {
        let (manager, _store) = create_test_manager(Arc::new(MemoryCatalog::new()));

        let first = manager.create(BackupOrigin::Manual).await.unwrap();
        let second = manager.create(BackupOrigin::Scheduled).await.unwrap();
        let third = manager.create(BackupOrigin::Manual).await.unwrap();

        assert!(first.created_at < second.created_at);
        assert!(second.created_at < third.created_at);

        let names: Vec<String> = manager
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec![third.name, second.name, first.name]);
    }

    #[tokio::test]
    async fn test_retention_keeps_newest_scheduled() {
        let (manager, _store) = create_test_manager(Arc::new(MemoryCatalog::new()));

        let mut created = Vec::new();
        for _ in 0..8 {
            created.push(manager.create(BackupOrigin::Scheduled).await.unwrap());
        }

        let remaining = manager.list().await.unwrap();
        let expected: Vec<BackupRecord> = created.into_iter().rev().take(5).collect();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_retention_is_per_origin() {
        let (manager, _store) = create_test_manager(Arc::new(MemoryCatalog::new()));

        for _ in 0..4 {
            manager.create(BackupOrigin::Manual).await.unwrap();
        }
        for _ in 0..2 {
            manager.create(BackupOrigin::Scheduled).await.unwrap();
        }

        let records = manager.list().await.unwrap();
        let manual = records.iter().filter(|r| r.origin == BackupOrigin::Manual).count();
        let scheduled = records
            .iter()
            .filter(|r| r.origin == BackupOrigin::Scheduled)
            .count();
        assert_eq!(manual, 3);
        assert_eq!(scheduled, 2);
    }

    #[tokio::test]
    async fn test_prune() {
        let (manager, _store) = create_test_manager(Arc::new(MemoryCatalog::new()));

        for _ in 0..3 {
            manager.create(BackupOrigin::Manual).await.unwrap();
            manager.create(BackupOrigin::Scheduled).await.unwrap();
        }

        let deleted = manager.prune(1).await.unwrap();
        assert_eq!(deleted.len(), 4);

        let remaining = manager.list().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(deleted
            .iter()
            .all(|d| remaining.iter().all(|r| r.created_at > d.created_at || r.origin != d.origin)));
    }

    #[tokio::test]
    async fn test_restore_overwrites() {
        let (manager, store) = create_test_manager(Arc::new(MemoryCatalog::new()));
        let record = manager.create(BackupOrigin::Manual).await.unwrap();

        store
            .put(Collection::Projects, json!({"id": "p1", "name": "Renamed"}))
            .unwrap();
        store
            .put(Collection::Projects, json!({"id": "p9", "name": "Added later"}))
            .unwrap();

        let outcome = manager.restore(&record.name, None).await;

        assert!(outcome.success);
        assert_eq!(outcome.imported_counts[&Collection::Projects], 1);
        let p1 = store.get(Collection::Projects, &"p1".into()).unwrap().unwrap();
        assert_eq!(p1["name"], "Create");
    }

    #[tokio::test]
    async fn test_restore_unknown_backup() {
        let (manager, _store) = create_test_manager(Arc::new(MemoryCatalog::new()));

        let outcome = manager.restore("manual-20000101T000000000Z", None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kinds(), vec![IssueKind::BackupNotFound]);
    }

    #[tokio::test]
    async fn test_delete_and_latest() {
        let (manager, _store) = create_test_manager(Arc::new(MemoryCatalog::new()));

        assert!(manager.latest(BackupOrigin::Manual).await.unwrap().is_none());

        let older = manager.create(BackupOrigin::Manual).await.unwrap();
        let newer = manager.create(BackupOrigin::Manual).await.unwrap();
        assert_eq!(
            manager.latest(BackupOrigin::Manual).await.unwrap(),
            Some(newer.clone())
        );

        manager.delete(&newer.name).await.unwrap();
        assert_eq!(
            manager.latest(BackupOrigin::Manual).await.unwrap(),
            Some(older)
        );

        let err = manager.delete(&newer.name).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_directory_catalog_backups() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = Arc::new(DirectoryCatalog::new(temp_dir.path()));
        let (manager, _store) = create_test_manager(catalog);

        let record = manager.create(BackupOrigin::Scheduled).await.unwrap();

        let file = temp_dir.path().join(format!("{}.snapshot", record.name));
        assert_eq!(std::fs::metadata(&file).unwrap().len(), record.byte_size);
        assert_eq!(manager.list().await.unwrap(), vec![record]);
    }
}
