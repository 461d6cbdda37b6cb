//! Build and parse snapshot documents
//!
//! Parsing runs in two phases. The header phase reads `format_version` and
//! metadata while skipping the payload, so an incompatible snapshot is
//! rejected before any records are materialized. The body phase decodes the
//! rest, ignoring (and reporting) fields this build does not know.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ExchangeError, ExchangeResult, Issue, IssueKind};

use super::checksum::{self, Checksum};
use super::document::{
    ChecksumStatus, Collection, CollectionSet, Payload, SnapshotDocument, SnapshotMetadata,
};
use super::version::{Compatibility, FormatVersion, FORMAT_VERSION};

/// A parsed document together with the recoverable problems found in it
#[derive(Debug, Clone)]
pub struct ParsedSnapshot {
    pub document: SnapshotDocument,
    pub warnings: Vec<Issue>,
}

/// Header-level view of a snapshot, available without decoding the payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub format_version: String,
    pub created_at: DateTime<Utc>,
    pub metadata: SnapshotMetadata,
    pub compatibility: Compatibility,
}

impl SnapshotSummary {
    /// Collections recorded in the metadata
    pub fn collections(&self) -> Vec<Collection> {
        self.metadata.entity_counts.keys().copied().collect()
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .metadata
            .entity_counts
            .iter()
            .map(|(c, n)| format!("{} {}", n, c))
            .collect();
        format!(
            "Snapshot v{} from {} ({})",
            self.format_version,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            parts.join(", ")
        )
    }
}

/// Build a document from fully collected data
///
/// Only collections in `selection` are kept; counts, payload size and the
/// checksum are computed from what remains.
pub fn serialize(
    selection: &CollectionSet,
    collected: &Payload,
    producer_label: &str,
) -> SnapshotDocument {
    let payload = collected.select(selection);
    let canonical = payload.canonical_bytes();

    let metadata = SnapshotMetadata {
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        producer_label: producer_label.to_string(),
        entity_counts: payload.entity_counts(),
        payload_byte_size: canonical.len() as u64,
    };

    SnapshotDocument {
        format_version: FORMAT_VERSION.to_string(),
        created_at: Utc::now(),
        metadata,
        checksum: Some(checksum::digest(&canonical)),
        payload,
    }
}

/// Encode a document as compact JSON with named fields
pub fn to_bytes(document: &SnapshotDocument) -> ExchangeResult<Vec<u8>> {
    Ok(serde_json::to_vec(document)?)
}

/// Header phase: everything except the payload
#[derive(Deserialize)]
struct SnapshotHeader {
    format_version: Option<Value>,
    created_at: Option<Value>,
    metadata: Option<Value>,
}

struct CheckedHeader {
    version: FormatVersion,
    raw_version: String,
    created_at: DateTime<Utc>,
    metadata: SnapshotMetadata,
    warnings: Vec<Issue>,
}

fn read_header(bytes: &[u8]) -> ExchangeResult<CheckedHeader> {
    let header: SnapshotHeader = serde_json::from_slice(bytes)
        .map_err(|e| ExchangeError::malformed(format!("Not a snapshot document: {}", e)))?;

    let raw_version = match header.format_version {
        Some(Value::String(v)) => v,
        Some(_) => return Err(ExchangeError::malformed("format_version is not a string")),
        None => return Err(ExchangeError::malformed("Missing format_version")),
    };
    let version: FormatVersion = raw_version.parse()?;

    let mut warnings = Vec::new();
    match version.compatibility() {
        Compatibility::Incompatible => {
            return Err(ExchangeError::IncompatibleVersion {
                found: raw_version,
                supported: FORMAT_VERSION.major,
            });
        }
        Compatibility::NewerMinor => warnings.push(Issue::new(
            IssueKind::NewerMinorVersion,
            format!(
                "Snapshot version {} is newer than {}; unknown fields are ignored",
                raw_version, FORMAT_VERSION
            ),
        )),
        Compatibility::Native | Compatibility::OlderMajor => {}
    }

    let created_at = header
        .created_at
        .ok_or_else(|| ExchangeError::malformed("Missing created_at"))
        .and_then(|v| {
            serde_json::from_value::<DateTime<Utc>>(v)
                .map_err(|e| ExchangeError::malformed(format!("Invalid created_at: {}", e)))
        })?;

    let metadata = match header.metadata {
        Some(Value::Object(map)) => read_metadata(map, &mut warnings)?,
        Some(_) => return Err(ExchangeError::malformed("metadata is not an object")),
        None => return Err(ExchangeError::malformed("Missing metadata")),
    };

    Ok(CheckedHeader {
        version,
        raw_version,
        created_at,
        metadata,
        warnings,
    })
}

fn read_metadata(
    mut map: Map<String, Value>,
    warnings: &mut Vec<Issue>,
) -> ExchangeResult<SnapshotMetadata> {
    let invalid = |field: &str| ExchangeError::malformed(format!("Invalid metadata.{}", field));

    let producer_version = match map.remove("producer_version") {
        Some(Value::String(s)) => s,
        _ => return Err(invalid("producer_version")),
    };
    let producer_label = match map.remove("producer_label") {
        Some(Value::String(s)) => s,
        None | Some(Value::Null) => String::new(),
        Some(_) => return Err(invalid("producer_label")),
    };
    let payload_byte_size = match map.remove("payload_byte_size") {
        Some(v) => v.as_u64().ok_or_else(|| invalid("payload_byte_size"))?,
        None => 0,
    };

    let mut entity_counts = BTreeMap::new();
    match map.remove("entity_counts") {
        Some(Value::Object(counts)) => {
            for (name, count) in counts {
                let count = count.as_u64().ok_or_else(|| invalid("entity_counts"))?;
                match name.parse::<Collection>() {
                    Ok(collection) => {
                        entity_counts.insert(collection, count as usize);
                    }
                    Err(_) => warnings.push(unknown_field(&format!("metadata.entity_counts.{}", name))),
                }
            }
        }
        None => {}
        Some(_) => return Err(invalid("entity_counts")),
    }

    for key in map.keys() {
        warnings.push(unknown_field(&format!("metadata.{}", key)));
    }

    Ok(SnapshotMetadata {
        producer_version,
        producer_label,
        entity_counts,
        payload_byte_size,
    })
}

fn unknown_field(path: &str) -> Issue {
    Issue::new(
        IssueKind::UnknownMinorField,
        format!("Ignored unknown field '{}'", path),
    )
}

/// Read version and metadata only
pub fn inspect(bytes: &[u8]) -> ExchangeResult<SnapshotSummary> {
    let header = read_header(bytes)?;
    Ok(SnapshotSummary {
        compatibility: header.version.compatibility(),
        format_version: header.raw_version,
        created_at: header.created_at,
        metadata: header.metadata,
    })
}

/// Parse and verify a snapshot document
///
/// Fatal problems (bad version, broken structure) are errors. A checksum
/// mismatch and unknown fields come back as warnings so the caller can
/// decide whether to go on.
pub fn parse(bytes: &[u8]) -> ExchangeResult<ParsedSnapshot> {
    let header = read_header(bytes)?;
    let mut warnings = header.warnings;

    let mut raw: Map<String, Value> = serde_json::from_slice(bytes)
        .map_err(|e| ExchangeError::malformed(format!("Not a snapshot document: {}", e)))?;

    let payload = match raw.remove("payload") {
        Some(Value::Object(map)) => read_payload(map, &mut warnings)?,
        Some(_) => return Err(ExchangeError::malformed("payload is not an object")),
        None => return Err(ExchangeError::malformed("Missing payload")),
    };

    let checksum = match raw.remove("checksum") {
        Some(Value::String(hex)) => Some(Checksum::from_hex(hex)),
        Some(Value::Null) | None => None,
        Some(_) => return Err(ExchangeError::malformed("checksum is not a string")),
    };

    for key in raw.keys() {
        if !SnapshotDocument::FIELDS.contains(&key.as_str()) {
            warnings.push(unknown_field(key));
        }
    }

    let document = SnapshotDocument {
        format_version: header.raw_version,
        created_at: header.created_at,
        metadata: header.metadata,
        payload,
        checksum,
    };

    match document.checksum_status() {
        ChecksumStatus::Verified => debug!("snapshot checksum verified"),
        ChecksumStatus::Absent => debug!("snapshot carries no checksum"),
        ChecksumStatus::Mismatch => {
            warn!(
                expected = %document.checksum.as_ref().map(|c| c.as_str()).unwrap_or_default(),
                "snapshot checksum mismatch"
            );
            warnings.push(Issue::new(
                IssueKind::ChecksumMismatch,
                "Payload does not match its checksum; the snapshot may be corrupted",
            ));
        }
    }

    Ok(ParsedSnapshot { document, warnings })
}

fn read_payload(map: Map<String, Value>, warnings: &mut Vec<Issue>) -> ExchangeResult<Payload> {
    let mut payload = Payload::new();

    for (name, value) in map {
        let collection = match name.parse::<Collection>() {
            Ok(c) => c,
            Err(_) => {
                warnings.push(unknown_field(&format!("payload.{}", name)));
                continue;
            }
        };

        let well_formed = if collection.is_singleton() {
            value.is_object() || value.is_null()
        } else {
            value.is_array() || value.is_null()
        };
        if !well_formed {
            return Err(ExchangeError::malformed(format!(
                "payload.{} has the wrong shape",
                collection
            )));
        }

        payload.insert(collection, value);
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Payload {
        Payload::new()
            .with_records(
                Collection::Projects,
                vec![
                    json!({"id": "p1", "name": "Create", "mods": ["create"]}),
                    json!({"id": "p2", "name": "Mekanism"}),
                ],
            )
            .with_records(
                Collection::Translations,
                vec![json!({"id": "t1", "project_id": "p1", "key": "block.create.cog", "value": "歯車"})],
            )
            .with_settings(Some(json!({"locale": "ja_jp"})))
            .with_records(Collection::Cache, vec![json!({"key": "scan:p1", "hits": 3})])
    }

    #[test]
    fn test_serialize_counts_and_checksum() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "desktop");

        assert_eq!(doc.format_version, "1.0.0");
        assert_eq!(doc.metadata.entity_counts[&Collection::Projects], 2);
        assert_eq!(doc.metadata.entity_counts[&Collection::Translations], 1);
        assert_eq!(doc.metadata.entity_counts[&Collection::Settings], 1);
        assert_eq!(
            doc.metadata.payload_byte_size as usize,
            doc.payload.canonical_bytes().len()
        );
        assert_eq!(doc.checksum_status(), ChecksumStatus::Verified);
    }

    #[test]
    fn test_serialize_respects_selection() {
        let selection = CollectionSet::only([Collection::Projects, Collection::Translations]);
        let doc = serialize(&selection, &sample_payload(), "");

        assert!(!doc.payload.contains(Collection::Settings));
        assert!(!doc.metadata.entity_counts.contains_key(&Collection::Cache));
    }

    #[test]
    fn test_roundtrip_preserves_payload_bytes() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "desktop");
        let bytes = to_bytes(&doc).unwrap();

        let parsed = parse(&bytes).unwrap();
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(parsed.document, doc);
        assert_eq!(
            parsed.document.payload.canonical_bytes(),
            doc.payload.canonical_bytes()
        );
    }

    #[test]
    fn test_roundtrip_keeps_float_bits() {
        let floats = [0.011399999999999999_f64, 0.1 + 0.2, 2.0 / 3.0, 1e-300, 123456.789e10];
        let records: Vec<_> = floats
            .iter()
            .enumerate()
            .map(|(i, f)| json!({"key": format!("ratio:{}", i), "value": f}))
            .collect();
        let payload = Payload::new().with_records(Collection::Cache, records);

        let doc = serialize(&CollectionSet::all(), &payload, "desktop");
        let parsed = parse(&to_bytes(&doc).unwrap()).unwrap();

        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        let reread = parsed.document.payload.records(Collection::Cache);
        for (record, expected) in reread.iter().zip(floats) {
            assert_eq!(record["value"].as_f64().unwrap().to_bits(), expected.to_bits());
        }
    }

    #[test]
    fn test_format_version_is_first_field() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "");
        let bytes = to_bytes(&doc).unwrap();
        assert!(bytes.starts_with(br#"{"format_version":"#));
    }

    #[test]
    fn test_metadata_edit_keeps_checksum_valid() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "desktop");
        let mut value = serde_json::to_value(&doc).unwrap();
        value["metadata"]["producer_label"] = json!("edited elsewhere");

        let parsed = parse(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert_eq!(parsed.document.metadata.producer_label, "edited elsewhere");
        assert_eq!(parsed.document.checksum_status(), ChecksumStatus::Verified);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_payload_edit_is_a_checksum_warning() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "desktop");
        let mut value = serde_json::to_value(&doc).unwrap();
        value["payload"]["projects"][0]["name"] = json!("Crate");

        let parsed = parse(&serde_json::to_vec(&value).unwrap()).unwrap();
        let kinds: Vec<_> = parsed.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![IssueKind::ChecksumMismatch]);
    }

    #[test]
    fn test_next_major_rejected_before_payload_decoding() {
        // The payload is not even valid for this build; the version gate must fire first
        let bytes = format!(
            r#"{{"format_version":"{}.0.0","created_at":"2025-01-01T00:00:00Z","metadata":{{"shape":"new"}},"payload":[1,2,3]}}"#,
            FORMAT_VERSION.major + 1
        );

        let err = parse(bytes.as_bytes()).unwrap_err();
        assert!(matches!(err, ExchangeError::IncompatibleVersion { .. }));
    }

    #[test]
    fn test_next_minor_accepted_with_unknown_fields_ignored() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "desktop");
        let mut value = serde_json::to_value(&doc).unwrap();
        value["format_version"] = json!(format!("{}.{}.0", FORMAT_VERSION.major, FORMAT_VERSION.minor + 1));
        value["signature"] = json!("future");
        value["metadata"]["host"] = json!("web");
        value["payload"]["glossary"] = json!([{"term": "cog"}]);

        let parsed = parse(&serde_json::to_vec(&value).unwrap()).unwrap();
        let kinds: Vec<_> = parsed.warnings.iter().map(|w| w.kind).collect();

        assert!(kinds.contains(&IssueKind::NewerMinorVersion));
        assert_eq!(
            kinds.iter().filter(|k| **k == IssueKind::UnknownMinorField).count(),
            3
        );
        assert_eq!(parsed.document.payload.entity_count(Collection::Projects), 2);
        assert_eq!(parsed.document.checksum_status(), ChecksumStatus::Verified);
    }

    #[test]
    fn test_missing_version_is_malformed() {
        let err = parse(br#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedDocument(_)));

        let err = parse(b"definitely not json").unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedDocument(_)));
    }

    #[test]
    fn test_wrong_collection_shape_is_malformed() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "");
        let mut value = serde_json::to_value(&doc).unwrap();
        value["payload"]["projects"] = json!({"id": "p1"});

        let err = parse(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedDocument(_)));
    }

    #[test]
    fn test_inspect_reads_header_only() {
        let doc = serialize(&CollectionSet::all(), &sample_payload(), "desktop");
        let bytes = to_bytes(&doc).unwrap();

        let summary = inspect(&bytes).unwrap();
        assert_eq!(summary.metadata, doc.metadata);
        assert_eq!(summary.compatibility, Compatibility::Native);
        assert_eq!(summary.collections().len(), 4);
        assert!(summary.summary().contains("2 projects"));
    }
}
