//! crates/achievement_core/src/auth/mod.rs
//!
//! Authentication and authorization: password verification, bearer token
//! issuance/validation and the role → permission gate.

pub mod credentials;
pub mod permissions;
pub mod token;

pub use credentials::{hash_password, verify_password, CredentialVerifier};
pub use permissions::{PermissionGate, RolePermissions};
pub use token::{Claims, TokenAuthority, TokenKind, TokenPair, TokenSettings};

use crate::ports::PortError;

/// Authentication errors, shared by the credential verifier and the token authority.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Account not found")]
    NotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Expected a {expected} token")]
    WrongTokenType { expected: TokenKind },

    #[error("Internal auth error: {0}")]
    Internal(String),

    #[error("Identity store error: {0}")]
    Store(#[from] PortError),
}
