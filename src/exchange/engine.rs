//! Export and import orchestration

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec::{self, CodecOptions};
use crate::config::ExchangeSettings;
use crate::crypto::SecureString;
use crate::error::{ExchangeResult, Issue, IssueKind};
use crate::merge::{self, MergePolicy};
use crate::snapshot::{self, Collection, CollectionSet, ParsedSnapshot, Payload, SnapshotSummary};
use crate::storage::DataStore;
use crate::transport::Transport;

use super::options::{ExportOptions, ImportOptions};
use super::outcome::{ExportReceipt, ExportedSnapshot, ImportOutcome};

/// File name suggested to the transport for an export
pub fn export_file_name(created_at: DateTime<Utc>, encoded: bool) -> String {
    format!(
        "mc-l10n-export-{}.{}",
        created_at.format("%Y%m%dT%H%M%SZ"),
        if encoded { "mcl" } else { "json" }
    )
}

/// Wires the data store, snapshot format, codec and transport together
pub struct ExchangeEngine {
    store: Arc<dyn DataStore>,
    transport: Arc<dyn Transport>,
    settings: ExchangeSettings,
}

impl ExchangeEngine {
    pub fn new(
        store: Arc<dyn DataStore>,
        transport: Arc<dyn Transport>,
        settings: ExchangeSettings,
    ) -> Self {
        Self {
            store,
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    /// Read the selected collections from the data store
    pub fn collect(&self, selection: &CollectionSet) -> ExchangeResult<Payload> {
        let mut payload = Payload::new();
        for collection in selection.iter() {
            let value = if collection.is_singleton() {
                self.store.get_settings()?.unwrap_or(Value::Null)
            } else {
                Value::Array(self.store.get_all(collection)?)
            };
            payload.insert(collection, value);
        }
        Ok(payload)
    }

    fn codec_options(
        &self,
        compression: Option<codec::Compression>,
        passphrase: Option<&SecureString>,
    ) -> CodecOptions {
        let mut options = CodecOptions::plain()
            .with_compression(compression.unwrap_or(self.settings.compression))
            .with_kdf(self.settings.kdf.clone());
        options.passphrase = passphrase.cloned();
        options
    }

    /// Build, serialize and encode a snapshot without handing it off
    pub fn export_bytes(&self, options: &ExportOptions) -> ExchangeResult<ExportedSnapshot> {
        let collected = self.collect(&options.collections)?;
        let document =
            snapshot::serialize(&options.collections, &collected, &self.settings.producer_label);

        let json = snapshot::to_bytes(&document)?;
        let codec_options = self.codec_options(options.compression, options.passphrase.as_ref());
        let bytes = codec::encode(&json, &codec_options)?;

        debug!(
            entities = document.metadata.total_entities(),
            json = json.len(),
            encoded = bytes.len(),
            "Snapshot built"
        );
        Ok(ExportedSnapshot { bytes, document })
    }

    /// Export through the transport
    pub async fn export(&self, options: &ExportOptions) -> ExchangeResult<ExportReceipt> {
        let exported = self.export_bytes(options)?;
        let document = exported.document;

        let encoded = options.passphrase.is_some()
            || options
                .compression
                .unwrap_or(self.settings.compression)
                .is_enabled();
        let name = export_file_name(document.created_at, encoded);

        let location = self.transport.write(&name, &exported.bytes).await?;

        info!(
            location = %location,
            entities = document.metadata.total_entities(),
            bytes = exported.bytes.len(),
            "Export complete"
        );

        Ok(ExportReceipt {
            location,
            name,
            checksum: document
                .checksum
                .unwrap_or_else(|| snapshot::digest(&document.payload.canonical_bytes())),
            entity_counts: document.metadata.entity_counts,
            byte_size: exported.bytes.len() as u64,
        })
    }

    /// Import bytes chosen through the transport
    pub async fn import(&self, options: &ImportOptions) -> ImportOutcome {
        match self.transport.read().await {
            Ok(bytes) => self.import_bytes(&bytes, options),
            Err(e) => {
                info!(error = %e, "Import aborted before reading a snapshot");
                ImportOutcome::failed(&e)
            }
        }
    }

    /// Decode, verify and apply snapshot bytes
    pub fn import_bytes(&self, bytes: &[u8], options: &ImportOptions) -> ImportOutcome {
        let parsed = match self.decode(bytes, options.passphrase.as_ref()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Import rejected");
                return ImportOutcome::failed(&e);
            }
        };

        let policy = options.policy.unwrap_or(self.settings.default_policy);
        let payload = parsed.document.payload;
        let mut outcome = ImportOutcome::started(parsed.warnings);

        for collection in payload.collections() {
            if let Some(only) = &options.collections {
                if !only.contains(collection) {
                    continue;
                }
            }
            self.apply_collection(collection, &payload, policy, &mut outcome);
        }

        info!(
            %policy,
            imported = outcome.total_imported(),
            skipped = outcome.total_skipped(),
            errors = outcome.errors.len(),
            warnings = outcome.warnings.len(),
            "Import complete"
        );
        outcome
    }

    /// Read the header of snapshot bytes without applying anything
    pub fn inspect_bytes(
        &self,
        bytes: &[u8],
        passphrase: Option<&SecureString>,
    ) -> ExchangeResult<SnapshotSummary> {
        let decoded = codec::decode(bytes, passphrase)?;
        snapshot::inspect(&decoded)
    }

    fn decode(&self, bytes: &[u8], passphrase: Option<&SecureString>) -> ExchangeResult<ParsedSnapshot> {
        let decoded = codec::decode(bytes, passphrase)?;
        snapshot::parse(&decoded)
    }

    fn apply_collection(
        &self,
        collection: Collection,
        payload: &Payload,
        policy: MergePolicy,
        outcome: &mut ImportOutcome,
    ) {
        let existing = match self.store.get_all(collection) {
            Ok(records) => records,
            Err(e) => {
                warn!(%collection, error = %e, "Could not read collection; skipping");
                outcome.errors.push(Issue::new(
                    IssueKind::StoreFailure,
                    format!("{}: {}", collection, e),
                ));
                outcome.warnings.push(Issue::new(
                    IssueKind::PartialCollectionFailure,
                    format!("{}: nothing imported", collection),
                ));
                outcome.imported_counts.insert(collection, 0);
                outcome.skipped_counts.insert(collection, 0);
                return;
            }
        };

        let incoming = payload.records(collection);
        let resolution = merge::resolve(collection, &existing, &incoming, policy);

        let writes = resolution.writes();
        let mut committed = 0;
        let mut failed = 0;
        if let Err(e) = self.store.put_many(collection, writes) {
            // find out which records made it
            debug!(%collection, error = %e, "Batch commit failed; retrying record by record");
            for record in writes {
                match self.store.put(collection, record.clone()) {
                    Ok(()) => committed += 1,
                    Err(e) => {
                        failed += 1;
                        outcome.errors.push(Issue::new(
                            IssueKind::StoreFailure,
                            format!("{}: {}", collection, e),
                        ));
                    }
                }
            }
        } else {
            committed = writes.len();
        }

        if failed > 0 {
            warn!(%collection, failed, "Some records failed to commit");
            outcome.warnings.push(Issue::new(
                IssueKind::PartialCollectionFailure,
                format!(
                    "{}: {} of {} record(s) failed to commit",
                    collection,
                    failed,
                    writes.len()
                ),
            ));
        }

        debug!(
            %collection,
            committed,
            skipped = resolution.skipped(),
            rejected = resolution.rejected(),
            "Collection applied"
        );

        outcome.errors.extend(resolution.errors.iter().cloned());
        outcome.warnings.extend(resolution.warnings.iter().cloned());
        outcome.imported_counts.insert(collection, committed);
        outcome.skipped_counts.insert(collection, resolution.skipped());
    }
}
