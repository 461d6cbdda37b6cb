//! Snapshot document model
//!
//! A `SnapshotDocument` is built fresh for every export and never mutated
//! after serialization. The payload holds opaque records keyed by collection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExchangeError;

use super::checksum::{self, Checksum};

/// An opaque record; only its identity field is interpreted
pub type Record = Value;

/// The data collections a snapshot can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Projects,
    Translations,
    Settings,
    Cache,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Projects,
        Collection::Translations,
        Collection::Settings,
        Collection::Cache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Translations => "translations",
            Self::Settings => "settings",
            Self::Cache => "cache",
        }
    }

    /// Settings is a single record rather than an array
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Settings)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ExchangeError::malformed(format!("Unknown collection '{}'", s)))
    }
}

/// A selection of collections to export or import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionSet(BTreeSet<Collection>);

impl CollectionSet {
    pub fn all() -> Self {
        Self(Collection::ALL.into_iter().collect())
    }

    pub fn only(collections: impl IntoIterator<Item = Collection>) -> Self {
        Self(collections.into_iter().collect())
    }

    pub fn contains(&self, collection: Collection) -> bool {
        self.0.contains(&collection)
    }

    pub fn iter(&self) -> impl Iterator<Item = Collection> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for CollectionSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Exported data keyed by collection
///
/// A collection absent from the map was not requested. `Value::Null` marks a
/// requested collection that had nothing to export (settings never saved).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload {
    collections: BTreeMap<Collection, Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array collection
    pub fn with_records(mut self, collection: Collection, records: Vec<Record>) -> Self {
        self.insert(collection, Value::Array(records));
        self
    }

    /// Add the settings record
    pub fn with_settings(mut self, settings: Option<Record>) -> Self {
        self.insert(Collection::Settings, settings.unwrap_or(Value::Null));
        self
    }

    pub fn insert(&mut self, collection: Collection, value: Value) {
        self.collections.insert(collection, value);
    }

    pub fn get(&self, collection: Collection) -> Option<&Value> {
        self.collections.get(&collection)
    }

    pub fn contains(&self, collection: Collection) -> bool {
        self.collections.contains_key(&collection)
    }

    pub fn collections(&self) -> impl Iterator<Item = Collection> + '_ {
        self.collections.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Keep only the selected collections
    pub fn select(&self, selection: &CollectionSet) -> Self {
        Self {
            collections: self
                .collections
                .iter()
                .filter(|(c, _)| selection.contains(**c))
                .map(|(c, v)| (*c, v.clone()))
                .collect(),
        }
    }

    /// The records of a collection; a settings object yields one record
    pub fn records(&self, collection: Collection) -> Vec<Record> {
        match self.collections.get(&collection) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        }
    }

    /// Cardinality of an included collection
    pub fn entity_count(&self, collection: Collection) -> usize {
        match self.collections.get(&collection) {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Null) | None => 0,
            Some(_) => 1,
        }
    }

    pub fn entity_counts(&self) -> BTreeMap<Collection, usize> {
        self.collections
            .keys()
            .map(|c| (*c, self.entity_count(*c)))
            .collect()
    }

    /// Payload as a JSON object keyed by collection name
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.collections
                .iter()
                .map(|(c, v)| (c.as_str().to_string(), v.clone()))
                .collect(),
        )
    }

    /// Stable byte form used for the checksum: sorted keys, no whitespace
    pub fn canonical_bytes(&self) -> Vec<u8> {
        checksum::canonical_json(&self.to_value())
    }
}

/// Descriptive block of a snapshot; never part of the checksum input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Version of the engine that wrote the snapshot
    pub producer_version: String,
    /// Free-form label of the producing installation
    #[serde(default)]
    pub producer_label: String,
    /// Number of records per included collection
    #[serde(default)]
    pub entity_counts: BTreeMap<Collection, usize>,
    /// Byte length of the canonical payload
    #[serde(default)]
    pub payload_byte_size: u64,
}

impl SnapshotMetadata {
    pub const FIELDS: [&'static str; 4] = [
        "producer_version",
        "producer_label",
        "entity_counts",
        "payload_byte_size",
    ];

    /// Total record count across collections
    pub fn total_entities(&self) -> usize {
        self.entity_counts.values().sum()
    }
}

/// The portable export unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDocument {
    pub format_version: String,
    pub created_at: DateTime<Utc>,
    pub metadata: SnapshotMetadata,
    pub payload: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
}

impl SnapshotDocument {
    pub const FIELDS: [&'static str; 5] =
        ["format_version", "created_at", "metadata", "payload", "checksum"];

    /// Compare the stored checksum against the payload
    pub fn checksum_status(&self) -> ChecksumStatus {
        match &self.checksum {
            None => ChecksumStatus::Absent,
            Some(expected) if checksum::verify(&self.payload.canonical_bytes(), expected) => {
                ChecksumStatus::Verified
            }
            Some(_) => ChecksumStatus::Mismatch,
        }
    }
}

/// Result of checking a document's checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Verified,
    Mismatch,
    Absent,
}
