//! Integrity digest over the canonical payload bytes
//!
//! Only the payload feeds the digest. Metadata can be rewritten without
//! touching the checksum, while any change to the payload content changes it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the digest of canonical payload bytes
pub fn digest(canonical_bytes: &[u8]) -> Checksum {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes);
    Checksum(format!("{:x}", hasher.finalize()))
}

/// Check canonical payload bytes against an expected digest
pub fn verify(canonical_bytes: &[u8], expected: &Checksum) -> bool {
    digest(canonical_bytes).0.eq_ignore_ascii_case(expected.0.trim())
}

/// Rebuild a JSON value with every object's keys in sorted order
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact JSON bytes of the canonical form of a value
pub fn canonical_json(value: &Value) -> Vec<u8> {
    // Serializing a `Value` cannot fail: keys are strings and numbers are finite
    serde_json::to_vec(&canonicalize(value)).unwrap_or_default()
}
