//! Snapshot format
//!
//! # Document layout
//!
//! Snapshots are self-describing JSON objects with named fields:
//! - `format_version`: `MAJOR.MINOR.PATCH`, always checked first
//! - `created_at`: creation timestamp (RFC 3339, UTC)
//! - `metadata`: producer, per-collection counts and canonical payload size
//! - `payload`: collection name to records (`settings` is a single object)
//! - `checksum`: SHA-256 of the canonical payload bytes
//!
//! # Compatibility
//!
//! A newer major version is rejected. Anything else is read, and fields this
//! build does not know are ignored and reported as warnings.

pub mod checksum;
mod document;
mod serializer;
pub mod version;

pub use checksum::{canonical_json, digest, verify, Checksum};
pub use document::{
    ChecksumStatus, Collection, CollectionSet, Payload, Record, SnapshotDocument,
    SnapshotMetadata,
};
pub use serializer::{inspect, parse, serialize, to_bytes, ParsedSnapshot, SnapshotSummary};
pub use version::{Compatibility, FormatVersion, FORMAT_VERSION};
