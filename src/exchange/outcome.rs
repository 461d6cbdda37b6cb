//! Results returned by export and import

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ExchangeError, Issue, IssueKind};
use crate::snapshot::{Checksum, Collection, SnapshotDocument};
use crate::transport::Location;

/// Encoded snapshot bytes and the document they were built from
#[derive(Debug, Clone)]
pub struct ExportedSnapshot {
    pub bytes: Vec<u8>,
    pub document: SnapshotDocument,
}

/// Where an export went and what it contained
#[derive(Debug, Clone)]
pub struct ExportReceipt {
    pub location: Location,
    /// File name the transport was asked to use
    pub name: String,
    pub checksum: Checksum,
    pub entity_counts: BTreeMap<Collection, usize>,
    /// Size of the encoded bytes
    pub byte_size: u64,
}

/// Result of an import
///
/// `success` is false only when a fatal error stopped the pipeline before
/// anything was committed. Record-level and commit failures are listed in
/// `errors` but leave `success` set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub imported_counts: BTreeMap<Collection, usize>,
    pub skipped_counts: BTreeMap<Collection, usize>,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ImportOutcome {
    /// An outcome that has not committed anything yet
    pub fn started(warnings: Vec<Issue>) -> Self {
        Self {
            success: true,
            imported_counts: BTreeMap::new(),
            skipped_counts: BTreeMap::new(),
            errors: Vec::new(),
            warnings,
        }
    }

    /// An outcome stopped by a fatal error
    pub fn failed(err: &ExchangeError) -> Self {
        Self {
            success: false,
            imported_counts: BTreeMap::new(),
            skipped_counts: BTreeMap::new(),
            errors: vec![Issue::from(err)],
            warnings: Vec::new(),
        }
    }

    pub fn error_kinds(&self) -> Vec<IssueKind> {
        self.errors.iter().map(|i| i.kind).collect()
    }

    pub fn warning_kinds(&self) -> Vec<IssueKind> {
        self.warnings.iter().map(|i| i.kind).collect()
    }

    pub fn total_imported(&self) -> usize {
        self.imported_counts.values().sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_counts.values().sum()
    }

    /// Whether every record made it in without complaint
    pub fn is_clean(&self) -> bool {
        self.success && self.errors.is_empty() && self.warnings.is_empty()
    }

    /// One-line description for status bars and logs
    pub fn summary(&self) -> String {
        if !self.success {
            let reason = self
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".into());
            return format!("Import failed: {}", reason);
        }

        let parts: Vec<String> = self
            .imported_counts
            .iter()
            .map(|(c, n)| format!("{} {}", n, c))
            .collect();

        let mut summary = format!("Imported: {}", parts.join(", "));
        if self.total_skipped() > 0 {
            summary.push_str(&format!(" ({} skipped)", self.total_skipped()));
        }
        if !self.errors.is_empty() || !self.warnings.is_empty() {
            summary.push_str(&format!(
                " with {} error(s), {} warning(s)",
                self.errors.len(),
                self.warnings.len()
            ));
        }
        summary
    }
}
