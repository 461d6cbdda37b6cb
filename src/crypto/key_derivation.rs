//! Argon2id key derivation
//!
//! Each encrypted snapshot carries its own salt and cost parameters, so any
//! build can re-derive the key from the passphrase alone.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{ExchangeError, ExchangeResult};

/// Length of the AES-256 key
pub const KEY_LEN: usize = 32;

const SALT_LEN: usize = 16;

/// Upper bounds accepted when reading parameters from a snapshot frame
const MAX_MEMORY_COST: u32 = 1024 * 1024;
const MAX_TIME_COST: u32 = 64;
const MAX_PARALLELISM: u32 = 16;

/// Parameters for key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// Salt for key derivation (base64 encoded)
    #[serde(default)]
    pub salt: String,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism degree (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            salt: String::new(), // Generated per export
            memory_cost: 65536,  // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    /// Create new params with a random salt
    pub fn new() -> Self {
        Self::default().with_fresh_salt()
    }

    /// Create params with specific costs and an empty salt
    pub fn with_costs(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            salt: String::new(),
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Copy these costs with a newly generated salt
    pub fn with_fresh_salt(&self) -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self {
            salt: STANDARD.encode(salt),
            ..self.clone()
        }
    }

    /// Check parameters read from a snapshot frame
    ///
    /// Costs must be accepted by Argon2 and stay below the hard limits, and the
    /// salt must be valid base64 of an acceptable length. Failures are
    /// reported as a malformed document.
    pub fn check_bounds(&self) -> ExchangeResult<()> {
        if self.memory_cost > MAX_MEMORY_COST
            || self.time_cost > MAX_TIME_COST
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(ExchangeError::malformed(format!(
                "Key derivation parameters out of range: m={} t={} p={}",
                self.memory_cost, self.time_cost, self.parallelism
            )));
        }

        self.argon2_params()
            .map_err(|e| ExchangeError::malformed(format!("Invalid key derivation parameters: {}", e)))?;

        let salt = STANDARD
            .decode(&self.salt)
            .map_err(|e| ExchangeError::malformed(format!("Invalid salt encoding: {}", e)))?;
        if !(argon2::MIN_SALT_LEN..=argon2::MAX_SALT_LEN).contains(&salt.len()) {
            return Err(ExchangeError::malformed(format!(
                "Invalid salt length: {} bytes",
                salt.len()
            )));
        }
        Ok(())
    }

    fn argon2_params(&self) -> Result<Params, argon2::Error> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
    }
}

/// A derived encryption key, zeroed on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LEN],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

/// Derive an encryption key from a passphrase
pub fn derive_key(passphrase: &str, params: &KeyDerivationParams) -> ExchangeResult<DerivedKey> {
    let salt = STANDARD
        .decode(&params.salt)
        .map_err(|e| ExchangeError::Encryption(format!("Invalid salt: {}", e)))?;

    let costs = params
        .argon2_params()
        .map_err(|e| ExchangeError::Encryption(format!("Invalid Argon2 parameters: {}", e)))?;

    let mut derived = DerivedKey { key: [0u8; KEY_LEN] };
    Argon2::new(Algorithm::Argon2id, Version::V0x13, costs)
        .hash_password_into(passphrase.as_bytes(), &salt, &mut derived.key)
        .map_err(|e| ExchangeError::Encryption(format!("Key derivation failed: {}", e)))?;

    Ok(derived)
}

#[cfg(test)]
pub(crate) fn test_params() -> KeyDerivationParams {
    KeyDerivationParams::with_costs(64, 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_passphrase_same_key() {
        let params = test_params().with_fresh_salt();
        let key1 = derive_key("test_passphrase", &params).unwrap();
        let key2 = derive_key("test_passphrase", &params).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_passphrase_different_key() {
        let params = test_params().with_fresh_salt();
        let key1 = derive_key("passphrase1", &params).unwrap();
        let key2 = derive_key("passphrase2", &params).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let params1 = test_params().with_fresh_salt();
        let params2 = test_params().with_fresh_salt();
        assert_ne!(params1.salt, params2.salt);
        let key1 = derive_key("same_passphrase", &params1).unwrap();
        let key2 = derive_key("same_passphrase", &params2).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_salt_rejected() {
        let result = derive_key("pass", &test_params());
        assert!(result.is_err());
    }

    #[test]
    fn test_bounds() {
        assert!(KeyDerivationParams::new().check_bounds().is_ok());
        assert!(test_params().with_fresh_salt().check_bounds().is_ok());

        let salted = |p: KeyDerivationParams| p.with_fresh_salt();
        let mut bad_salt = test_params();
        bad_salt.salt = "***not base64***".to_string();
        let mut short_salt = test_params();
        short_salt.salt = STANDARD.encode([1u8, 2, 3]);

        for broken in [
            salted(KeyDerivationParams::with_costs(u32::MAX, 1, 1)),
            salted(KeyDerivationParams::with_costs(64, 0, 1)),
            salted(KeyDerivationParams::with_costs(1, 1, 1)),
            salted(KeyDerivationParams::with_costs(64, 1, 0)),
            test_params(),
            bad_salt,
            short_salt,
        ] {
            assert!(
                matches!(broken.check_bounds(), Err(ExchangeError::MalformedDocument(_))),
                "{:?}",
                broken
            );
        }
    }
}
