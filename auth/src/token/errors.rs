use thiserror::Error;

/// Error type for token codec operations.
///
/// Verification failures are deliberately collapsed into a single
/// `InvalidToken` variant so callers cannot leak *why* a token was rejected.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    SigningFailed(String),

    #[error("Token is invalid")]
    InvalidToken,
}
