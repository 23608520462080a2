use serde::Deserialize;
use serde::Serialize;

/// Token kind discriminator embedded in access claims.
pub const TOKEN_TYPE_ACCESS: &str = "access";

/// Token kind discriminator embedded in refresh claims.
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Claims carried by a short-lived access token.
///
/// The role travels inline so protected requests never need a store
/// round-trip; possession of a valid access token is authorization for its
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (credential identifier)
    pub sub: String,

    /// Role at issuance time
    pub role: String,

    /// Kind discriminator, always `"access"`
    pub token_type: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Random token identifier
    pub jti: String,
}

/// Claims carried by a long-lived refresh token.
///
/// No role: the store is consulted on every refresh anyway, and the role is
/// re-read from the credential at rotation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Subject (credential identifier)
    pub sub: String,

    /// Kind discriminator, always `"refresh"`
    pub token_type: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Random token identifier
    pub jti: String,
}
