use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::{RegistryError, Result};

/// Hash a password into a PHC string with a random salt
#[inline]
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(RegistryError::Validation("Password must not be empty".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RegistryError::Other(anyhow::anyhow!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash counts as a mismatch.
#[inline]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// [`hash_password`] off the async runtime
#[inline]
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| RegistryError::Other(anyhow::anyhow!("Password hashing task failed: {}", e)))?
}

/// [`verify_password`] off the async runtime
#[inline]
pub async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| RegistryError::Other(anyhow::anyhow!("Password verification task failed: {}", e)))
}
