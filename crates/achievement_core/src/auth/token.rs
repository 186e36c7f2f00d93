//! crates/achievement_core/src/auth/token.rs
//!
//! HS256 bearer tokens. The signing key is handed in once at construction and
//! is never rotated while the process runs; rotating it means restarting the
//! service, which invalidates every outstanding token.
//!
//! Claims are trusted as issued: a role change only reaches a user's requests
//! once they obtain a new token.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::domain::Identity;

/// Access token lifetime: 24 hours.
const ACCESS_TOKEN_TTL_HOURS: i64 = 24;

/// Refresh token lifetime: 7 days.
const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// The signed payload of every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id.
    pub sub: Uuid,
    pub username: String,
    /// Role name at issuance.
    pub role: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    pub typ: TokenKind,
}

/// Key material and lifetimes, loaded once at startup.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::hours(ACCESS_TOKEN_TTL_HOURS),
            refresh_ttl: Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

/// An access token together with the refresh token that can renew it.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenAuthority {
    pub fn new(settings: TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(&settings.secret),
            decoding: DecodingKey::from_secret(&settings.secret),
            validation,
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Issues an access token for `identity`, valid from now.
    pub fn issue_token(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_at(identity, TokenKind::Access, Utc::now())
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_at(identity, TokenKind::Refresh, Utc::now())
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue_at(identity, TokenKind::Access, now)?,
            refresh_token: self.issue_at(identity, TokenKind::Refresh, now)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Issues a token as if the clock read `now`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: identity.id,
            username: identity.username.clone(),
            role: identity.role_name.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            typ: kind,
        };
        self.sign(&claims)
    }

    /// Verifies signature and expiry and returns the claims unchanged.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed,
            })
    }

    /// Like [`validate_token`](Self::validate_token) but only accepts access tokens.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.typ != TokenKind::Access {
            return Err(AuthError::WrongTokenType {
                expected: TokenKind::Access,
            });
        }
        Ok(claims)
    }

    /// Exchanges a valid refresh token for a fresh access token carrying the
    /// same identity and role.
    pub fn refresh_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.validate_token(refresh_token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(AuthError::WrongTokenType {
                expected: TokenKind::Refresh,
            });
        }

        let now = Utc::now();
        self.sign(&Claims {
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            typ: TokenKind::Access,
            ..claims
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }
}
