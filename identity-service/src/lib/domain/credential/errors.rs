use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for Role parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Role must be admin, author, or reader, got: {0}")]
    Unknown(String),
}

/// Error for email delivery operations
#[derive(Debug, Clone, Error)]
pub enum EmailDeliveryError {
    #[error("Failed to deliver email: {0}")]
    DeliveryFailed(String),
}

/// Top-level error for credential lifecycle operations.
///
/// Authentication failures are deliberately coarse: `InvalidCredentials`
/// and `InvalidToken` carry no detail about *why* authentication failed,
/// so a caller cannot distinguish an unknown email from a wrong password
/// or a revoked token from a forged one.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid role: {0}")]
    InvalidRole(#[from] RoleError),

    // Domain-level errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Email already in use")]
    EmailAlreadyUsed,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Credential not found: {0}")]
    NotFound(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<auth::PasswordError> for CredentialError {
    fn from(err: auth::PasswordError) -> Self {
        CredentialError::Unknown(format!("password operation failed: {}", err))
    }
}

impl From<auth::TokenError> for CredentialError {
    fn from(err: auth::TokenError) -> Self {
        match err {
            auth::TokenError::InvalidToken => CredentialError::InvalidToken,
            auth::TokenError::SigningFailed(msg) => {
                CredentialError::Unknown(format!("token signing failed: {}", msg))
            }
        }
    }
}

impl From<auth::SecretsError> for CredentialError {
    fn from(err: auth::SecretsError) -> Self {
        CredentialError::Unknown(format!("secret generation failed: {}", err))
    }
}

impl From<anyhow::Error> for CredentialError {
    fn from(err: anyhow::Error) -> Self {
        CredentialError::Unknown(err.to_string())
    }
}
