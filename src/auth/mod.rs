//! Admin authentication.
//!
//! There is exactly one principal: whoever knows the shared admin password.
//! A successful login yields an HS256 JWT carrying `admin: true` and an
//! absolute expiry. Tokens are not stored server-side and cannot be revoked;
//! expiry is the only way they end.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::AdminCredentials;

/// Claims embedded in an admin token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminClaims {
    pub admin: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid admin password")]
    InvalidPassword,
    #[error("missing authorization header")]
    MissingToken,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// A freshly minted token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Verifies the admin password and issues/validates admin tokens
#[derive(Clone)]
pub struct AdminAuth {
    password: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl AdminAuth {
    pub fn new(credentials: &AdminCredentials) -> Self {
        let secret = credentials.signing_secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // An expired token is expired, no grace period
        validation.leeway = 0;

        Self {
            password: credentials.password.clone(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl: credentials.token_ttl,
        }
    }

    /// Compare against the admin password in constant time
    pub fn check_password(&self, candidate: &str) -> bool {
        let expected = self.password.as_bytes();
        let provided = candidate.as_bytes();
        expected.len() == provided.len() && expected.ct_eq(provided).into()
    }

    /// Exchange the admin password for a token
    pub fn login(&self, password: &str) -> Result<IssuedToken, AuthError> {
        if !self.check_password(password) {
            return Err(AuthError::InvalidPassword);
        }
        self.issue_at(Utc::now())
    }

    /// Mint a token as if issued at `issued_at`
    pub fn issue_at(&self, issued_at: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = issued_at + self.ttl;
        let claims = AdminClaims {
            admin: true,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature, expiry and the admin flag
    pub fn verify(&self, token: &str) -> Result<AdminClaims, AuthError> {
        let data = decode::<AdminClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;

        if !data.claims.admin {
            return Err(AuthError::InvalidToken("not an admin token".to_string()));
        }

        Ok(data.claims)
    }

    /// Verify the token carried by an `Authorization` header value
    pub fn authenticate(&self, header: Option<&str>) -> Result<AdminClaims, AuthError> {
        let token = extract_bearer(header).ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

/// Extract the token from an `Authorization` header value.
/// Accepts `Bearer <token>` as well as a bare token.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let header = header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        return (!token.is_empty()).then_some(token);
    }

    // A bare token never contains whitespace; anything else is another scheme
    let header = header.trim();
    if !header.is_empty() && !header.contains(' ') {
        return Some(header);
    }

    None
}
