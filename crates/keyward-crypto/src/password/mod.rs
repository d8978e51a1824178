//! Local password hashes
//!
//! Hashes are stored as PHC strings. Argon2id is used for new hashes;
//! existing Argon2i and Argon2d hashes still verify.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    #[error("Unsupported password hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Check `password` against a stored PHC hash.
///
/// `Ok(false)` means the password does not match; errors are reserved for
/// hashes that cannot be checked at all.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

    let algorithm = parsed.algorithm.as_str();
    if !is_supported_algorithm(algorithm) {
        return Err(PasswordError::UnsupportedAlgorithm(algorithm.to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::MalformedHash(e.to_string())),
    }
}

fn is_supported_algorithm(algorithm: &str) -> bool {
    matches!(algorithm, "argon2id" | "argon2i" | "argon2d")
}
