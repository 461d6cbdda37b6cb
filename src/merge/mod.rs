//! Import merge resolution
//!
//! Decides, per collection, how incoming records interact with the records
//! already in the data store. Each record is accepted or rejected as a whole;
//! collections are resolved independently of each other.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Issue, IssueKind};
use crate::snapshot::{Collection, Record};

/// How incoming records treat existing records with the same identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Incoming records replace existing ones
    Overwrite,
    /// Only new identities are added
    Merge,
    /// Like `Merge`, and the number of kept records is surfaced as a warning
    #[default]
    SkipExisting,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overwrite => "overwrite",
            Self::Merge => "merge",
            Self::SkipExisting => "skip_existing",
        })
    }
}

/// Structural rules for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    /// Field holding the record's unique key; `None` for the settings singleton
    pub identity_field: Option<&'static str>,
    /// Fields that must be present and non-null
    pub required_fields: &'static [&'static str],
}

/// Schema used to validate and identify records of a collection
pub fn schema_for(collection: Collection) -> CollectionSchema {
    match collection {
        Collection::Projects => CollectionSchema {
            identity_field: Some("id"),
            required_fields: &["id", "name"],
        },
        Collection::Translations => CollectionSchema {
            identity_field: Some("id"),
            required_fields: &["id", "project_id", "key"],
        },
        Collection::Cache => CollectionSchema {
            identity_field: Some("key"),
            required_fields: &["key"],
        },
        Collection::Settings => CollectionSchema {
            identity_field: None,
            required_fields: &[],
        },
    }
}

/// Key of a record within its collection
///
/// Text and integer keys never compare equal: `7` and `"7"` are different
/// records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    Text(String),
    Integer(i128),
    /// The settings record
    Singleton,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Singleton => f.write_str("settings"),
        }
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Identity {
    fn from(n: i64) -> Self {
        Self::Integer(n.into())
    }
}

impl From<u64> for Identity {
    fn from(n: u64) -> Self {
        Self::Integer(n.into())
    }
}

/// Extract a record's identity without checking its other fields
///
/// Used for records already in the store, which may predate the current
/// required-field rules.
pub fn identity_of(collection: Collection, record: &Record) -> Result<Identity, String> {
    let object = record
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    let Some(field) = schema_for(collection).identity_field else {
        return Ok(Identity::Singleton);
    };

    let invalid = || format!("identity field '{}' must be a string or integer", field);
    match object.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(Identity::Text(s.clone())),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Identity::from)
            .or_else(|| n.as_u64().map(Identity::from))
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Check an incoming record's required fields and return its identity
pub fn validate(collection: Collection, record: &Record) -> Result<Identity, String> {
    let object = record
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    for field in schema_for(collection).required_fields {
        if matches!(object.get(*field), None | Some(Value::Null)) {
            return Err(format!("missing required field '{}'", field));
        }
    }

    identity_of(collection, record)
}

/// What happened to a single incoming record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    Inserted,
    Replaced,
    SkippedDuplicate,
    Rejected(String),
}

impl RecordAction {
    /// Whether the record should be written to the store
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced)
    }
}

/// Outcome for one incoming record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Position in the incoming collection
    pub index: usize,
    pub identity: Option<Identity>,
    pub action: RecordAction,
}

/// Result of resolving one collection
#[derive(Debug, Clone)]
pub struct Resolution {
    pub collection: Collection,
    /// The collection as it should look after the import
    pub final_collection: Vec<Record>,
    pub outcomes: Vec<RecordOutcome>,
    /// Per-record validation failures
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    writes: Vec<Record>,
}

impl Resolution {
    /// Records to write, in the order they must be applied
    pub fn writes(&self) -> &[Record] {
        &self.writes
    }

    pub fn count(&self, action: fn(&RecordAction) -> bool) -> usize {
        self.outcomes.iter().filter(|o| action(&o.action)).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|a| matches!(a, RecordAction::SkippedDuplicate))
    }

    pub fn rejected(&self) -> usize {
        self.count(|a| matches!(a, RecordAction::Rejected(_)))
    }
}

/// Resolve incoming records against the existing collection
///
/// Existing order is kept, replacements happen in place and new records are
/// appended. Only incoming records are validated; existing records are
/// matched by identity alone. Within `incoming`, a repeated identity is
/// treated like a conflict with the earlier occurrence, and under
/// `Overwrite` the earlier occurrence is reported as a skipped duplicate.
pub fn resolve(
    collection: Collection,
    existing: &[Record],
    incoming: &[Record],
    policy: MergePolicy,
) -> Resolution {
    let mut final_collection = existing.to_vec();
    let mut positions: HashMap<Identity, usize> = HashMap::new();
    for (pos, record) in existing.iter().enumerate() {
        if let Ok(id) = identity_of(collection, record) {
            positions.entry(id).or_insert(pos);
        }
    }

    let mut outcomes: Vec<RecordOutcome> = Vec::with_capacity(incoming.len());
    let mut errors = Vec::new();
    let mut writes: Vec<Record> = Vec::new();
    // identity -> (outcome index, write index) of the latest incoming write
    let mut written: HashMap<Identity, (usize, usize)> = HashMap::new();

    for (index, record) in incoming.iter().enumerate() {
        let identity = match validate(collection, record) {
            Ok(id) => id,
            Err(reason) => {
                errors.push(Issue::new(
                    IssueKind::InvalidRecord,
                    format!("{}[{}]: {}", collection, index, reason),
                ));
                outcomes.push(RecordOutcome {
                    index,
                    identity: None,
                    action: RecordAction::Rejected(reason),
                });
                continue;
            }
        };

        let mut action = match (positions.get(&identity).copied(), policy) {
            (Some(pos), MergePolicy::Overwrite) => {
                final_collection[pos] = record.clone();
                RecordAction::Replaced
            }
            (Some(_), MergePolicy::Merge | MergePolicy::SkipExisting) => {
                RecordAction::SkippedDuplicate
            }
            (None, _) => {
                positions.insert(identity.clone(), final_collection.len());
                final_collection.push(record.clone());
                RecordAction::Inserted
            }
        };

        if action.is_write() {
            let outcome_index = outcomes.len();
            match written.get(&identity).copied() {
                Some((superseded, write_index)) => {
                    // inherit the superseded occurrence's action
                    action = std::mem::replace(
                        &mut outcomes[superseded].action,
                        RecordAction::SkippedDuplicate,
                    );
                    writes[write_index] = record.clone();
                    written.insert(identity.clone(), (outcome_index, write_index));
                }
                None => {
                    written.insert(identity.clone(), (outcome_index, writes.len()));
                    writes.push(record.clone());
                }
            }
        }

        outcomes.push(RecordOutcome {
            index,
            identity: Some(identity),
            action,
        });
    }

    let mut resolution = Resolution {
        collection,
        final_collection,
        outcomes,
        errors,
        warnings: Vec::new(),
        writes,
    };

    let skipped = resolution.skipped();
    if policy == MergePolicy::SkipExisting && skipped > 0 {
        resolution.warnings.push(Issue::new(
            IssueKind::SkippedDuplicate,
            format!(
                "{} {} record(s) already existed and were kept",
                skipped, collection
            ),
        ));
    }

    resolution
}
