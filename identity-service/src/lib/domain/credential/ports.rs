use async_trait::async_trait;
use uuid::Uuid;

use crate::credential::errors::CredentialError;
use crate::credential::errors::EmailDeliveryError;
use crate::credential::models::Credential;
use crate::credential::models::EmailAddress;
use crate::credential::models::EmailMessage;
use crate::credential::models::Identity;
use crate::credential::models::LoginCommand;
use crate::credential::models::Pagination;
use crate::credential::models::RegisterCommand;
use crate::credential::models::Role;
use crate::credential::models::TokenKind;
use crate::credential::models::TokenPair;
use crate::credential::models::TokenRecord;
use crate::credential::models::UserId;

/// Port for the credential lifecycle engine.
#[async_trait]
pub trait CredentialServicePort: Send + Sync + 'static {
    /// Register a new credential and issue its first token pair.
    ///
    /// # Errors
    /// * `Validation` - password shorter than the minimum
    /// * `EmailAlreadyUsed` - email taken (pre-check or store constraint)
    async fn register(
        &self,
        command: RegisterCommand,
    ) -> Result<(Identity, TokenPair), CredentialError>;

    /// Verify email/password and issue a fresh token pair.
    ///
    /// Fails with `InvalidCredentials` uniformly for an unknown email and
    /// for a wrong password; other active sessions are left untouched.
    async fn login(&self, command: LoginCommand) -> Result<(Identity, TokenPair), CredentialError>;

    /// Rotate a refresh token: the presented token is revoked and a brand
    /// new pair is issued. No refresh token is ever valid twice.
    ///
    /// # Errors
    /// * `InvalidToken` - verification failure, no active record, subject
    ///   mismatch, or vanished credential
    async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair, CredentialError>;

    /// Revoke the active record for a refresh token. Idempotent: a token
    /// that is already revoked or unknown to the store is a success.
    async fn logout(&self, raw_refresh_token: &str) -> Result<(), CredentialError>;

    /// Create and deliver a single-use password-reset token.
    ///
    /// Always succeeds whether or not the email is registered
    /// (anti-enumeration); delivery failure is logged, not surfaced.
    async fn request_password_reset(&self, email: &EmailAddress) -> Result<(), CredentialError>;

    /// Consume a reset token and set a new password.
    ///
    /// # Errors
    /// * `Validation` - empty token or password below minimum
    /// * `InvalidToken` - no active record for the token, including a
    ///   second confirmation with the same raw token
    async fn confirm_password_reset(
        &self,
        raw_token: &str,
        new_password: &str,
    ) -> Result<(), CredentialError>;

    /// Fetch the public view of one credential.
    ///
    /// # Errors
    /// * `NotFound` - no credential with this id
    async fn get_identity(&self, id: &UserId) -> Result<Identity, CredentialError>;

    /// List credentials for administrative review, newest first.
    async fn list_credentials(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Identity>, Pagination), CredentialError>;

    /// Change a credential's role. Restricted to administrative actors at
    /// the transport layer.
    ///
    /// # Errors
    /// * `NotFound` - no credential with this id
    async fn update_role(&self, id: &UserId, role: Role) -> Result<Identity, CredentialError>;
}

/// Persistence operations for the credential aggregate.
#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    /// Persist a new credential.
    ///
    /// # Errors
    /// * `EmailAlreadyUsed` - unique-email constraint violated (the race
    ///   the service pre-check cannot catch)
    /// * `DatabaseError` - storage operation failed
    async fn create(&self, credential: Credential) -> Result<Credential, CredentialError>;

    /// Look up a credential by normalized email (None if absent).
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Credential>, CredentialError>;

    /// Look up a credential by id (None if absent).
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, CredentialError>;

    /// Overwrite the stored password hash.
    ///
    /// # Errors
    /// * `NotFound` - no credential with this id
    async fn update_password_hash(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<(), CredentialError>;

    /// Overwrite the stored role.
    ///
    /// # Errors
    /// * `NotFound` - no credential with this id
    async fn update_role(&self, id: &UserId, role: Role) -> Result<(), CredentialError>;

    /// Page through credentials, newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Credential>, CredentialError>;

    /// Total number of credentials.
    async fn count(&self) -> Result<i64, CredentialError>;
}

/// Persistence for single-use bounded-lifetime token records.
///
/// One abstraction covers refresh and reset records, parameterized by
/// [`TokenKind`], so the two flows cannot drift apart in their invariant
/// checks. "Active" always means not-consumed AND not-expired, evaluated
/// in a single store-side check against the wallclock.
#[async_trait]
pub trait TokenRepository: Send + Sync + 'static {
    /// Persist a fresh active record.
    async fn create(
        &self,
        kind: TokenKind,
        record: TokenRecord,
    ) -> Result<TokenRecord, CredentialError>;

    /// Look up the active record for a fingerprint (None if absent,
    /// consumed, or expired).
    async fn find_active(
        &self,
        kind: TokenKind,
        fingerprint: &str,
    ) -> Result<Option<TokenRecord>, CredentialError>;

    /// Atomically consume the record for a fingerprint: the update only
    /// succeeds while the row is still unconsumed, so concurrent callers
    /// race safely and at most one observes `true`.
    async fn consume(&self, kind: TokenKind, fingerprint: &str) -> Result<bool, CredentialError>;

    /// Same conditional consumption, keyed by record id.
    async fn consume_by_id(&self, kind: TokenKind, id: Uuid) -> Result<bool, CredentialError>;
}

/// Outbound email delivery.
#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    /// Deliver a message. The reset flow treats failure as non-fatal and
    /// only logs it.
    async fn send(&self, message: EmailMessage) -> Result<(), EmailDeliveryError>;
}
