use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::claims::AccessClaims;
use super::claims::RefreshClaims;
use super::claims::TOKEN_TYPE_ACCESS;
use super::claims::TOKEN_TYPE_REFRESH;
use super::errors::TokenError;
use crate::secrets;

/// The single signing scheme accepted by the codec. A token whose header
/// claims anything else is rejected outright.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Byte length of the random `jti` claim.
const TOKEN_ID_BYTES: usize = 18;

/// Result of signing an access token.
#[derive(Debug, Clone)]
pub struct IssuedAccess {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of signing a refresh token.
#[derive(Debug, Clone)]
pub struct IssuedRefresh {
    pub token: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless codec for signed, time-bounded claim sets.
///
/// Access and refresh tokens are signed with *separate* symmetric secrets
/// so that compromising one signing key cannot forge tokens of the other
/// kind. Secrets are injected once at construction and never read from
/// ambient state, which also lets tests substitute their own.
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Create a codec with distinct secrets per token kind.
    ///
    /// `access_ttl` is expected to be minutes-scale, `refresh_ttl`
    /// days-scale; both come from configuration.
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Sign a short-lived access token for `subject` with `role` inline.
    ///
    /// # Errors
    /// * `SigningFailed` - encoding or token-id generation failed
    pub fn issue_access(&self, subject: &str, role: &str) -> Result<IssuedAccess, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;

        let claims = AccessClaims {
            sub: subject.to_string(),
            role: role.to_string(),
            token_type: TOKEN_TYPE_ACCESS.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: new_token_id()?,
        };

        let token = self.sign(&claims, &self.access_encoding)?;
        Ok(IssuedAccess { token, expires_at })
    }

    /// Sign a long-lived refresh token for `subject`.
    ///
    /// # Errors
    /// * `SigningFailed` - encoding or token-id generation failed
    pub fn issue_refresh(&self, subject: &str) -> Result<IssuedRefresh, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.refresh_ttl;
        let token_id = new_token_id()?;

        let claims = RefreshClaims {
            sub: subject.to_string(),
            token_type: TOKEN_TYPE_REFRESH.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: token_id.clone(),
        };

        let token = self.sign(&claims, &self.refresh_encoding)?;
        Ok(IssuedRefresh {
            token,
            token_id,
            expires_at,
        })
    }

    /// Verify an access token: signature, algorithm, expiry, kind
    /// discriminator, and non-empty subject and role.
    ///
    /// # Errors
    /// * `InvalidToken` - any verification failure, without distinction
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.parse(token, &self.access_decoding)?;

        if claims.token_type != TOKEN_TYPE_ACCESS || claims.sub.is_empty() || claims.role.is_empty()
        {
            return Err(TokenError::InvalidToken);
        }

        Ok(claims)
    }

    /// Verify a refresh token: signature, algorithm, expiry, kind
    /// discriminator, and non-empty subject and token identifier.
    ///
    /// # Errors
    /// * `InvalidToken` - any verification failure, without distinction
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.parse(token, &self.refresh_decoding)?;

        if claims.token_type != TOKEN_TYPE_REFRESH
            || claims.sub.is_empty()
            || claims.jti.is_empty()
        {
            return Err(TokenError::InvalidToken);
        }

        Ok(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T, key: &EncodingKey) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, key)
            .map_err(|e| TokenError::SigningFailed(e.to_string()))
    }

    fn parse<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> Result<T, TokenError> {
        // Validation pins the algorithm to HS256 and checks `exp`, so
        // algorithm-confusion and expired tokens both fail here.
        let validation = Validation::new(ALGORITHM);

        decode::<T>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::InvalidToken)
    }
}

fn new_token_id() -> Result<String, TokenError> {
    secrets::random_token(TOKEN_ID_BYTES).map_err(|e| TokenError::SigningFailed(e.to_string()))
}
