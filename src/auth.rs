//! Session tokens and owner extraction.
//!
//! After login the service hands out an HS256 JWT whose subject is the
//! owner id. Handlers under `/api` take an [`Owner`] argument, which rejects
//! the request with 401 unless a valid `Authorization: Bearer` token is sent.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// JWT claims for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Owner id.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issue time of the first token in this refresh chain.
    pub orig_iat: i64,
}

/// A freshly signed token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub expire: DateTime<Utc>,
}

/// Signs and verifies session tokens.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    timeout: Duration,
    max_refresh: Duration,
}

impl SessionKeys {
    pub fn new(secret: &SecretString, timeout: Duration, max_refresh: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            timeout,
            max_refresh,
        }
    }

    /// Issue a token for a fresh login.
    pub fn issue(&self, owner: &str) -> Result<SessionToken, AuthError> {
        self.issue_at(owner, Utc::now(), None)
    }

    /// Re-issue `claims` if the refresh window from the original login is
    /// still open. The original issue time is carried over.
    pub fn refresh(&self, claims: &Claims) -> Result<SessionToken, AuthError> {
        let now = Utc::now();
        if claims.orig_iat + self.max_refresh.as_secs() as i64 <= now.timestamp() {
            return Err(AuthError::RefreshExpired);
        }
        self.issue_at(&claims.sub, now, Some(claims.orig_iat))
    }

    /// Validate signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    fn issue_at(
        &self,
        owner: &str,
        now: DateTime<Utc>,
        orig_iat: Option<i64>,
    ) -> Result<SessionToken, AuthError> {
        let timeout = chrono::Duration::from_std(self.timeout)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let expire = now + timeout;
        let claims = Claims {
            sub: owner.to_string(),
            exp: expire.timestamp(),
            orig_iat: orig_iat.unwrap_or_else(|| now.timestamp()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(SessionToken { token, expire })
    }
}

/// The authenticated owner of a request.
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: String,
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for Owner
where
    Arc<SessionKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = Arc::<SessionKeys>::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("invalid auth header".into()))?;

        let claims = keys.verify(token)?;
        Ok(Owner {
            id: claims.sub.clone(),
            claims,
        })
    }
}
