//! crates/achievement_core/src/auth/credentials.rs
//!
//! Username/email + password verification against the stored hash.
//!
//! New hashes are Argon2id PHC strings. Accounts migrated from the previous
//! system carry bcrypt hashes (`$2a$`, `$2b$`, `$2y$`); those still verify.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{debug, warn};

use super::AuthError;
use crate::domain::Identity;
use crate::ports::IdentityStore;

/// Resolves an identity from a login identifier and a plaintext password.
#[derive(Clone)]
pub struct CredentialVerifier {
    identities: Arc<dyn IdentityStore>,
}

impl CredentialVerifier {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }

    /// Looks the account up by username or email and checks the password.
    ///
    /// The password is checked before the active flag, so a disabled account is
    /// only reported to someone who knows its password.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self
            .identities
            .find_by_login(identifier)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !verify_password(password, &identity.password_hash)? {
            debug!(user_id = %identity.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if !identity.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(identity)
    }
}

/// Hashes a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("argon2 hash: {e}")))
}

/// Verifies a password against an Argon2 or bcrypt hash. Comparison is
/// constant-time inside both hash crates. Unreadable hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    if stored_hash.starts_with("$2") {
        return match bcrypt::verify(password, stored_hash) {
            Ok(valid) => Ok(valid),
            Err(e) => {
                warn!(error = %e, "unreadable bcrypt hash");
                Ok(false)
            }
        };
    }

    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "unrecognised password hash format");
            return Ok(false);
        }
    };

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
