//! Password hashing and per-user key material.
//!
//! Login passwords are hashed with Argon2id into PHC strings. Each user also
//! gets a random master-key salt which the client combines with the master
//! password to derive the key that encrypts credential fields; the server
//! only stores and hands out the salt.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version};
use base64::Engine;

use crate::error::ServiceError;

/// Shortest accepted login password, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Size of a master-key salt before encoding.
pub const MASTER_KEY_SALT_LEN: usize = 32;

/// Hashes and verifies login passwords.
pub trait PasswordHasher: Send + Sync + 'static {
    /// # Errors
    ///
    /// [`ServiceError::Internal`] if hashing fails.
    fn hash(&self, plaintext: &str) -> Result<String, ServiceError>;

    /// Returns `Ok(false)` on mismatch.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Internal`] if `hash` is not a valid PHC string.
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, ServiceError>;
}

/// Argon2id with configurable cost.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Build a hasher with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidInput`] if the parameters are out of range
    /// (memory must be at least `8 * parallelism` KiB).
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, ServiceError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| ServiceError::invalid_input(format!("argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    /// 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ServiceError::Internal {
                reason: format!("password hashing failed: {e}"),
            })
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, ServiceError> {
        let parsed = PasswordHash::new(hash).map_err(|e| ServiceError::Internal {
            reason: format!("invalid password hash: {e}"),
        })?;
        // Cost parameters come from the PHC string, not from `self`.
        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ServiceError::Internal {
                reason: format!("password verification failed: {e}"),
            }),
        }
    }
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`].
///
/// # Errors
///
/// [`ServiceError::InvalidInput`] when too short.
pub fn check_password_strength(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::invalid_input(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Generate a fresh base64-encoded master-key salt from the OS CSPRNG.
#[must_use]
pub fn generate_master_key_salt() -> String {
    let mut salt = [0u8; MASTER_KEY_SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    base64::engine::general_purpose::STANDARD.encode(salt)
}

/// `len` random bytes from the OS CSPRNG, for signing keys.
#[must_use]
pub fn random_secret(len: usize) -> Vec<u8> {
    let mut secret = vec![0u8; len];
    OsRng.fill_bytes(&mut secret);
    secret
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn cheap() -> Argon2Hasher {
        Argon2Hasher::new(64, 1, 1).unwrap()
    }

    #[test]
    fn hash_verifies_and_rejects_wrong_password() {
        let hasher = cheap();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(!hasher.verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(cheap().verify("pw", "not-a-phc-string").is_err());
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(Argon2Hasher::new(4, 1, 1).is_err());
    }

    #[test]
    fn salts_are_random_and_sized() {
        let a = generate_master_key_salt();
        let b = generate_master_key_salt();
        assert_ne!(a, b);
        let raw = base64::engine::general_purpose::STANDARD.decode(&a).unwrap();
        assert_eq!(raw.len(), MASTER_KEY_SALT_LEN);
    }

    #[test]
    fn random_secret_has_requested_length() {
        let secret = random_secret(48);
        assert_eq!(secret.len(), 48);
        assert_ne!(secret, random_secret(48));
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(check_password_strength("1234567").is_err());
        assert!(check_password_strength("12345678").is_ok());
    }
}
