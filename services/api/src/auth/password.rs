//! services/api/src/auth/password.rs
//!
//! Salted Argon2id password hashing with a configurable work factor.

use crate::config::PasswordHashConfig;
use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Invalid hashing parameters: {0}")]
    Params(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Stored password hash is unreadable: {0}")]
    InvalidHash(String),
}

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a random secret, verified against when a login names an unknown
    /// account so that both failure paths cost one hash computation.
    decoy_hash: String,
}

impl PasswordHasher {
    pub fn new(config: &PasswordHashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;

        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let mut hasher = Self {
            params,
            decoy_hash: String::new(),
        };
        hasher.decoy_hash = hasher.hash(&hex::encode(secret))?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes a password into a PHC string (algorithm, parameters and salt included).
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Checks a candidate against a stored hash. The parameters recorded in the
    /// hash are used, so hashes made under an older work factor still verify.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Burns the same work as a real verification. Always false.
    pub fn verify_decoy(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.decoy_hash);
        false
    }
}
