//! AES-256-GCM encryption stage of the codec pipeline
//!
//! Each encrypted snapshot is framed as a marker line followed by a JSON
//! `EncryptedFrame` carrying the key derivation parameters, the nonce and
//! the ciphertext with its authentication tag.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

use super::key_derivation::{derive_key, KeyDerivationParams};
use super::SecureString;

/// Marks bytes as an encrypted frame
pub const ENCRYPTED_MARKER: &[u8] = b"MCLENC\x01\n";

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

const FRAME_VERSION: u8 = 1;

/// Encrypted payload with the parameters needed to decrypt it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedFrame {
    /// Version for future algorithm upgrades
    #[serde(default = "default_version")]
    pub version: u8,
    /// Argon2id parameters including the per-export salt
    pub kdf: KeyDerivationParams,
    /// The nonce used for this encryption (base64 encoded)
    pub nonce: String,
    /// The encrypted ciphertext with authentication tag (base64 encoded)
    pub ciphertext: String,
}

fn default_version() -> u8 {
    FRAME_VERSION
}

impl EncryptedFrame {
    fn decode_field(value: &str, what: &str) -> ExchangeResult<Vec<u8>> {
        STANDARD
            .decode(value)
            .map_err(|e| ExchangeError::malformed(format!("Invalid {} encoding: {}", what, e)))
    }
}

/// Check whether bytes carry the encrypted-frame marker
pub fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.starts_with(ENCRYPTED_MARKER)
}

/// Encrypt bytes under a passphrase, returning the framed output
///
/// A fresh salt and nonce are generated on every call.
pub fn seal(
    plaintext: &[u8],
    passphrase: &SecureString,
    costs: &KeyDerivationParams,
) -> ExchangeResult<Vec<u8>> {
    let kdf = costs.with_fresh_salt();
    let key = derive_key(passphrase, &kdf)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| ExchangeError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| ExchangeError::Encryption(format!("Encryption failed: {}", e)))?;

    let frame = EncryptedFrame {
        version: FRAME_VERSION,
        kdf,
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(ciphertext),
    };

    let mut out = ENCRYPTED_MARKER.to_vec();
    serde_json::to_writer(&mut out, &frame)?;
    Ok(out)
}

/// Decrypt a framed payload
///
/// Fails with `PassphraseRequired` when no passphrase is given and with
/// `WrongPassphrase` when the authentication tag does not verify.
pub fn open(framed: &[u8], passphrase: Option<&SecureString>) -> ExchangeResult<Vec<u8>> {
    let body = framed
        .strip_prefix(ENCRYPTED_MARKER)
        .ok_or_else(|| ExchangeError::malformed("Missing encryption marker"))?;

    let passphrase = passphrase.ok_or(ExchangeError::PassphraseRequired)?;

    let frame: EncryptedFrame = serde_json::from_slice(body)
        .map_err(|e| ExchangeError::malformed(format!("Invalid encrypted frame: {}", e)))?;

    if frame.version != FRAME_VERSION {
        return Err(ExchangeError::malformed(format!(
            "Unsupported encryption version: {}",
            frame.version
        )));
    }
    frame.kdf.check_bounds()?;

    let nonce_bytes = EncryptedFrame::decode_field(&frame.nonce, "nonce")?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(ExchangeError::malformed(format!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }
    let ciphertext = EncryptedFrame::decode_field(&frame.ciphertext, "ciphertext")?;

    let key = derive_key(passphrase, &frame.kdf)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| ExchangeError::Encryption(format!("Failed to create cipher: {}", e)))?;

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| ExchangeError::WrongPassphrase)
}
