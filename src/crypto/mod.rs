//! Cryptographic functions for the exchange engine
//!
//! Provides AES-256-GCM encryption with Argon2id key derivation
//! for passphrase-protected snapshots.

pub mod encryption;
pub mod key_derivation;
pub mod secure_memory;

pub use encryption::{is_encrypted, open, seal, EncryptedFrame, ENCRYPTED_MARKER};
pub use key_derivation::{derive_key, DerivedKey, KeyDerivationParams};
pub use secure_memory::SecureString;
