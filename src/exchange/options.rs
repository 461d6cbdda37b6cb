//! Per-call options for export and import

use crate::codec::Compression;
use crate::crypto::SecureString;
use crate::merge::MergePolicy;
use crate::snapshot::CollectionSet;

/// What to export and how to encode it
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub collections: CollectionSet,
    /// Falls back to the configured compression when unset
    pub compression: Option<Compression>,
    /// Encrypt when set
    pub passphrase: Option<SecureString>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collections(mut self, collections: CollectionSet) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<SecureString>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }
}

/// How to apply an incoming snapshot
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Falls back to the configured default policy when unset
    pub policy: Option<MergePolicy>,
    /// Needed only for encrypted snapshots
    pub passphrase: Option<SecureString>,
    /// Restrict the import to these collections
    pub collections: Option<CollectionSet>,
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<SecureString>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_collections(mut self, collections: CollectionSet) -> Self {
        self.collections = Some(collections);
        self
    }
}
