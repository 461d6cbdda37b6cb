//! Storage layer
//!
//! The exchange engine reads and writes the application's records through the
//! `DataStore` trait. Two implementations ship with the crate: an in-memory
//! store and a JSON file store with atomic writes.

pub mod file_io;
mod json_store;
mod memory;

pub use file_io::{read_json, write_atomic, write_json_atomic};
pub use json_store::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::{ExchangeError, ExchangeResult};
use crate::merge::{identity_of, Identity};
use crate::snapshot::{Collection, Record};

/// Record storage for the array collections and the settings singleton
///
/// `put` inserts or replaces by record identity. Implementations must be safe
/// to share between threads.
pub trait DataStore: Send + Sync {
    /// All records of a collection, in storage order
    ///
    /// For `Collection::Settings` this is the settings record, if any.
    fn get_all(&self, collection: Collection) -> ExchangeResult<Vec<Record>>;

    /// A single record by identity
    fn get(&self, collection: Collection, identity: &Identity) -> ExchangeResult<Option<Record>>;

    /// Insert or replace a record
    fn put(&self, collection: Collection, record: Record) -> ExchangeResult<()>;

    /// Insert or replace several records in order
    ///
    /// Stops at the first failure; records before it may already be stored.
    /// Stores that can write a batch at once should override this.
    fn put_many(&self, collection: Collection, records: &[Record]) -> ExchangeResult<()> {
        for record in records {
            self.put(collection, record.clone())?;
        }
        Ok(())
    }

    fn get_settings(&self) -> ExchangeResult<Option<Record>>;

    fn put_settings(&self, settings: Record) -> ExchangeResult<()>;
}

/// Upsert `record` into `records` keeping storage order
pub(crate) fn upsert(
    collection: Collection,
    records: &mut Vec<Record>,
    record: Record,
) -> ExchangeResult<()> {
    let identity = identity_of(collection, &record)
        .map_err(|reason| ExchangeError::Storage(format!("{}: {}", collection, reason)))?;

    match position_of(collection, records, &identity) {
        Some(pos) => records[pos] = record,
        None => records.push(record),
    }
    Ok(())
}

fn position_of(collection: Collection, records: &[Record], identity: &Identity) -> Option<usize> {
    records
        .iter()
        .position(|r| identity_of(collection, r).as_ref() == Ok(identity))
}

/// Find a record by identity
pub(crate) fn find(
    collection: Collection,
    records: &[Record],
    identity: &Identity,
) -> Option<Record> {
    position_of(collection, records, identity).map(|pos| records[pos].clone())
}
