//! Authentication infrastructure library
//!
//! Provides the credential primitives used by the identity service:
//! - Password hashing (Argon2id)
//! - Signed, time-bounded access and refresh tokens with key separation
//! - Token fingerprinting and cryptographically secure random secrets
//!
//! The service defines its own domain ports and adapts these
//! implementations; nothing in here touches storage or the network.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash).unwrap());
//! ```
//!
//! ## Tokens
//! ```
//! use auth::TokenCodec;
//! use chrono::Duration;
//!
//! let codec = TokenCodec::new(
//!     b"access-secret-at-least-32-bytes-long!",
//!     b"refresh-secret-at-least-32-bytes-long",
//!     Duration::minutes(15),
//!     Duration::days(7),
//! );
//! let issued = codec.issue_access("user-123", "author").unwrap();
//! let claims = codec.verify_access(&issued.token).unwrap();
//! assert_eq!(claims.sub, "user-123");
//! ```
//!
//! ## Fingerprints
//! ```
//! use auth::secrets;
//!
//! let raw = secrets::random_token(0).unwrap();
//! // The store only ever sees the fingerprint, never the raw value.
//! assert_eq!(secrets::fingerprint(&raw), secrets::fingerprint(&raw));
//! ```

pub mod password;
pub mod secrets;
pub mod token;

// Re-export commonly used items
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use secrets::SecretsError;
pub use token::AccessClaims;
pub use token::IssuedAccess;
pub use token::IssuedRefresh;
pub use token::RefreshClaims;
pub use token::TokenCodec;
pub use token::TokenError;
