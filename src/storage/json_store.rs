//! JSON file data store
//!
//! One file per collection under the data directory (`projects.json`,
//! `translations.json`, `cache.json`, `settings.json`). Every write replaces
//! the whole file atomically.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::merge::Identity;
use crate::snapshot::{Collection, Record};

use super::file_io::{read_json, write_json_atomic};
use super::{find, upsert, DataStore};

/// Data store persisting each collection as a JSON file
pub struct JsonFileStore {
    data_dir: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store rooted at `data_dir`; the directory is created on first write
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the file holding a collection
    pub fn collection_file(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(format!("{}.json", collection.as_str()))
    }

    fn load(&self, collection: Collection) -> ExchangeResult<Vec<Record>> {
        read_json(self.collection_file(collection))
    }
}

impl DataStore for JsonFileStore {
    fn get_all(&self, collection: Collection) -> ExchangeResult<Vec<Record>> {
        if collection.is_singleton() {
            return Ok(self.get_settings()?.into_iter().collect());
        }
        self.load(collection)
    }

    fn get(&self, collection: Collection, identity: &Identity) -> ExchangeResult<Option<Record>> {
        if collection.is_singleton() {
            return self.get_settings();
        }
        Ok(find(collection, &self.load(collection)?, identity))
    }

    fn put(&self, collection: Collection, record: Record) -> ExchangeResult<()> {
        self.put_many(collection, std::slice::from_ref(&record))
    }

    /// Load the collection once, apply every upsert, write it back once
    fn put_many(&self, collection: Collection, records: &[Record]) -> ExchangeResult<()> {
        if collection.is_singleton() {
            return match records.last() {
                Some(settings) => self.put_settings(settings.clone()),
                None => Ok(()),
            };
        }
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| ExchangeError::Storage(format!("Failed to acquire lock: {}", e)))?;

        let mut stored = self.load(collection)?;
        for record in records {
            upsert(collection, &mut stored, record.clone())?;
        }
        write_json_atomic(self.collection_file(collection), &stored)?;

        debug!(%collection, written = records.len(), count = stored.len(), "Collection file written");
        Ok(())
    }

    fn get_settings(&self) -> ExchangeResult<Option<Record>> {
        read_json(self.collection_file(Collection::Settings))
    }

    fn put_settings(&self, settings: Record) -> ExchangeResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| ExchangeError::Storage(format!("Failed to acquire lock: {}", e)))?;

        write_json_atomic(self.collection_file(Collection::Settings), &settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, JsonFileStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data"));
        (temp_dir, store)
    }

    #[test]
    fn test_empty_store() {
        let (_temp_dir, store) = create_test_store();

        for collection in Collection::ALL {
            assert!(store.get_all(collection).unwrap().is_empty());
        }
        assert!(store.get_settings().unwrap().is_none());
    }

    #[test]
    fn test_put_persists_across_instances() {
        let (temp_dir, store) = create_test_store();

        store
            .put(
                Collection::Translations,
                json!({"id": "t1", "project_id": "p1", "key": "item.sword"}),
            )
            .unwrap();
        store.put_settings(json!({"target_locale": "ko_kr"})).unwrap();

        let reopened = JsonFileStore::new(temp_dir.path().join("data"));
        let found = reopened.get(Collection::Translations, &"t1".into()).unwrap().unwrap();
        assert_eq!(found["key"], "item.sword");
        assert_eq!(
            reopened.get_settings().unwrap(),
            Some(json!({"target_locale": "ko_kr"}))
        );
    }

    #[test]
    fn test_put_replaces_by_identity() {
        let (_temp_dir, store) = create_test_store();

        store.put(Collection::Cache, json!({"key": "k", "v": 1})).unwrap();
        store.put(Collection::Cache, json!({"key": "k", "v": 2})).unwrap();

        let all = store.get_all(Collection::Cache).unwrap();
        assert_eq!(all, vec![json!({"key": "k", "v": 2})]);
    }

    #[test]
    fn test_put_many_is_all_or_nothing() {
        let (_temp_dir, store) = create_test_store();
        store
            .put(Collection::Projects, json!({"id": "p0", "name": "Kept"}))
            .unwrap();

        let batch = vec![
            json!({"id": "p1", "name": "A"}),
            json!({"name": "no id"}),
        ];
        let err = store.put_many(Collection::Projects, &batch).unwrap_err();
        assert!(matches!(err, ExchangeError::Storage(_)));
        assert_eq!(store.get_all(Collection::Projects).unwrap().len(), 1);

        let batch: Vec<_> = (0..50)
            .map(|i| json!({"id": format!("t{}", i), "project_id": "p0", "key": "k"}))
            .collect();
        store.put_many(Collection::Translations, &batch).unwrap();
        assert_eq!(store.get_all(Collection::Translations).unwrap(), batch);
    }

    #[test]
    fn test_collection_files() {
        let (_temp_dir, store) = create_test_store();
        store
            .put(Collection::Projects, json!({"id": "p1", "name": "P"}))
            .unwrap();

        assert!(store.collection_file(Collection::Projects).exists());
        assert!(!store.collection_file(Collection::Cache).exists());
    }
}
