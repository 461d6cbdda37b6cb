//! In-memory data store
//!
//! Used by tests and by embedders that keep their state elsewhere and only
//! need the exchange pipeline.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{ExchangeError, ExchangeResult};
use crate::merge::Identity;
use crate::snapshot::{Collection, Record};

use super::{find, upsert, DataStore};

/// Data store backed by maps behind `RwLock`s
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Record>>>,
    settings: RwLock<Option<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection, replacing whatever it held
    pub fn with_records(self, collection: Collection, records: Vec<Record>) -> Self {
        if collection.is_singleton() {
            if let Ok(mut settings) = self.settings.write() {
                *settings = records.into_iter().next();
            }
        } else if let Ok(mut collections) = self.collections.write() {
            collections.insert(collection, records);
        }
        self
    }

    /// Number of records held for a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.get_all(collection).map(|r| r.len()).unwrap_or(0)
    }
}

fn lock_error(e: impl std::fmt::Display) -> ExchangeError {
    ExchangeError::Storage(format!("Failed to acquire lock: {}", e))
}

impl DataStore for MemoryStore {
    fn get_all(&self, collection: Collection) -> ExchangeResult<Vec<Record>> {
        if collection.is_singleton() {
            return Ok(self.get_settings()?.into_iter().collect());
        }

        let collections = self.collections.read().map_err(lock_error)?;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    fn get(&self, collection: Collection, identity: &Identity) -> ExchangeResult<Option<Record>> {
        if collection.is_singleton() {
            return self.get_settings();
        }

        let collections = self.collections.read().map_err(lock_error)?;
        Ok(collections
            .get(&collection)
            .and_then(|records| find(collection, records, identity)))
    }

    fn put(&self, collection: Collection, record: Record) -> ExchangeResult<()> {
        if collection.is_singleton() {
            return self.put_settings(record);
        }

        let mut collections = self.collections.write().map_err(lock_error)?;
        upsert(collection, collections.entry(collection).or_default(), record)
    }

    fn get_settings(&self) -> ExchangeResult<Option<Record>> {
        Ok(self.settings.read().map_err(lock_error)?.clone())
    }

    fn put_settings(&self, settings: Record) -> ExchangeResult<()> {
        *self.settings.write().map_err(lock_error)? = Some(settings);
        Ok(())
    }
}
