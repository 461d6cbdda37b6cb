//! Reversible byte transforms applied to serialized snapshots
//!
//! Export runs compress-then-encrypt and import runs decrypt-then-decompress.
//! Ciphertext is incompressible, so the order is fixed. Both stages frame
//! their output with a marker, which lets `decode` accept any combination
//! (including plain JSON documents written without either stage).

pub mod compression;

pub use compression::{compress, decompress, is_compressed, Compression, COMPRESSED_MARKER};

use tracing::debug;

use crate::crypto::{self, KeyDerivationParams, SecureString};
use crate::error::ExchangeResult;

/// Options controlling the encode side of the pipeline
#[derive(Debug, Clone, Default)]
pub struct CodecOptions {
    pub compression: Compression,
    /// Encrypt when set
    pub passphrase: Option<SecureString>,
    /// Argon2id costs; a fresh salt is generated per encode
    pub kdf: KeyDerivationParams,
}

impl CodecOptions {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<SecureString>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_kdf(mut self, kdf: KeyDerivationParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.passphrase.is_some()
    }
}

/// Run the export side of the pipeline
pub fn encode(bytes: &[u8], options: &CodecOptions) -> ExchangeResult<Vec<u8>> {
    let compressed = compress(bytes, options.compression)?;

    let out = match &options.passphrase {
        Some(passphrase) => crypto::seal(&compressed, passphrase, &options.kdf)?,
        None => compressed,
    };

    debug!(
        input = bytes.len(),
        output = out.len(),
        compression = ?options.compression,
        encrypted = options.is_encrypted(),
        "encoded snapshot bytes"
    );
    Ok(out)
}

/// Run the import side of the pipeline
pub fn decode(bytes: &[u8], passphrase: Option<&SecureString>) -> ExchangeResult<Vec<u8>> {
    let encrypted = crypto::is_encrypted(bytes);
    let decrypted = if encrypted {
        crypto::open(bytes, passphrase)?
    } else {
        bytes.to_vec()
    };

    let compressed = is_compressed(&decrypted);
    let out = decompress(&decrypted)?;

    debug!(
        input = bytes.len(),
        output = out.len(),
        encrypted,
        compressed,
        "decoded snapshot bytes"
    );
    Ok(out)
}
