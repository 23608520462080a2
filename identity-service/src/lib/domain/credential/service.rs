use std::sync::Arc;

use async_trait::async_trait;
use auth::secrets;
use auth::TokenCodec;
use chrono::Duration;
use chrono::Utc;

use crate::credential::errors::CredentialError;
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
use crate::credential::ports::CredentialRepository;
use crate::credential::ports::CredentialServicePort;
use crate::credential::ports::EmailSender;
use crate::credential::ports::TokenRepository;

/// Minimum accepted password length, in bytes.
const MIN_PASSWORD_LENGTH: usize = 8;

const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;

/// Credential lifecycle engine.
///
/// Orchestrates register/login/refresh/logout/reset flows over the codec,
/// the store ports, and the password hasher. It never caches store state
/// across calls: every decision re-reads current rows, and the store's
/// conditional updates are the only synchronization point.
pub struct CredentialService<CR, TR, ES>
where
    CR: CredentialRepository,
    TR: TokenRepository,
    ES: EmailSender,
{
    credentials: Arc<CR>,
    tokens: Arc<TR>,
    email_sender: Arc<ES>,
    codec: TokenCodec,
    password_hasher: auth::PasswordHasher,
    default_role: Role,
    password_reset_ttl: Duration,
    frontend_base_url: String,
}

impl<CR, TR, ES> CredentialService<CR, TR, ES>
where
    CR: CredentialRepository,
    TR: TokenRepository,
    ES: EmailSender,
{
    /// Create a new lifecycle engine with injected collaborators.
    ///
    /// `codec` carries the process-wide signing secrets, established once
    /// at startup; `frontend_base_url` is used to build reset links.
    pub fn new(
        credentials: Arc<CR>,
        tokens: Arc<TR>,
        email_sender: Arc<ES>,
        codec: TokenCodec,
        password_reset_ttl: Duration,
        frontend_base_url: &str,
    ) -> Self {
        Self {
            credentials,
            tokens,
            email_sender,
            codec,
            password_hasher: auth::PasswordHasher::new(),
            default_role: Role::Author,
            password_reset_ttl,
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Sign both tokens, persist only the refresh fingerprint, and hand the
    /// raw values back. The store never sees a raw token.
    async fn issue_token_pair(
        &self,
        subject: UserId,
        role: Role,
    ) -> Result<TokenPair, CredentialError> {
        let access = self.codec.issue_access(&subject.to_string(), role.as_str())?;
        let refresh = self.codec.issue_refresh(&subject.to_string())?;

        let record = TokenRecord::new(
            subject,
            secrets::fingerprint(&refresh.token),
            refresh.expires_at,
        );
        self.tokens.create(TokenKind::Refresh, record).await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }
}

#[async_trait]
impl<CR, TR, ES> CredentialServicePort for CredentialService<CR, TR, ES>
where
    CR: CredentialRepository,
    TR: TokenRepository,
    ES: EmailSender,
{
    async fn register(
        &self,
        command: RegisterCommand,
    ) -> Result<(Identity, TokenPair), CredentialError> {
        if command.password.len() < MIN_PASSWORD_LENGTH {
            return Err(CredentialError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        // Pre-check for a friendlier error; the store's unique constraint
        // still catches the race and surfaces the same variant.
        if self
            .credentials
            .find_by_email(&command.email)
            .await?
            .is_some()
        {
            return Err(CredentialError::EmailAlreadyUsed);
        }

        let password_hash = self.password_hasher.hash(&command.password)?;

        let credential = Credential {
            id: UserId::new(),
            email: command.email,
            password_hash,
            role: self.default_role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let created = self.credentials.create(credential).await?;
        let pair = self.issue_token_pair(created.id, created.role).await?;

        Ok((Identity::from(&created), pair))
    }

    async fn login(&self, command: LoginCommand) -> Result<(Identity, TokenPair), CredentialError> {
        if command.password.trim().is_empty() {
            return Err(CredentialError::Validation(
                "password must not be empty".to_string(),
            ));
        }

        // Unknown email and wrong password collapse into the same error so
        // responses carry no user-existence oracle.
        let credential = self
            .credentials
            .find_by_email(&command.email)
            .await?
            .ok_or(CredentialError::InvalidCredentials)?;

        if !self
            .password_hasher
            .verify(&command.password, &credential.password_hash)?
        {
            return Err(CredentialError::InvalidCredentials);
        }

        let pair = self
            .issue_token_pair(credential.id, credential.role)
            .await?;

        Ok((Identity::from(&credential), pair))
    }

    async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair, CredentialError> {
        let raw = raw_refresh_token.trim();
        if raw.is_empty() {
            return Err(CredentialError::Validation(
                "refresh token must not be empty".to_string(),
            ));
        }

        let claims = self.codec.verify_refresh(raw)?;
        let subject =
            UserId::from_string(&claims.sub).map_err(|_| CredentialError::InvalidToken)?;

        // Primary reuse-detection point: a rotated-out token no longer has
        // an active record under its fingerprint.
        let fingerprint = secrets::fingerprint(raw);
        let stored = self
            .tokens
            .find_active(TokenKind::Refresh, &fingerprint)
            .await?
            .ok_or(CredentialError::InvalidToken)?;

        // A forged claim paired with a stolen, differently-owned record
        // must not rotate.
        if stored.user_id != subject {
            return Err(CredentialError::InvalidToken);
        }

        let credential = self
            .credentials
            .find_by_id(&subject)
            .await?
            .ok_or(CredentialError::InvalidToken)?;

        // Conditional consumption is the rotation race arbiter: of two
        // concurrent refreshes of the same record, exactly one consumes it
        // and the other fails here.
        if !self.tokens.consume(TokenKind::Refresh, &fingerprint).await? {
            return Err(CredentialError::InvalidToken);
        }

        self.issue_token_pair(credential.id, credential.role).await
    }

    async fn logout(&self, raw_refresh_token: &str) -> Result<(), CredentialError> {
        let raw = raw_refresh_token.trim();
        if raw.is_empty() {
            return Err(CredentialError::Validation(
                "refresh token must not be empty".to_string(),
            ));
        }

        self.codec.verify_refresh(raw)?;

        // Already-revoked or unknown records make logout a no-op, not an
        // error: logging out twice succeeds both times.
        let fingerprint = secrets::fingerprint(raw);
        self.tokens.consume(TokenKind::Refresh, &fingerprint).await?;

        Ok(())
    }

    async fn request_password_reset(&self, email: &EmailAddress) -> Result<(), CredentialError> {
        let credential = match self.credentials.find_by_email(email).await? {
            Some(credential) => credential,
            // Anti-enumeration: an unknown email succeeds with the same
            // response shape as a known one.
            None => return Ok(()),
        };

        let raw_token = secrets::random_token(0)?;
        let record = TokenRecord::new(
            credential.id,
            secrets::fingerprint(&raw_token),
            Utc::now() + self.password_reset_ttl,
        );
        self.tokens.create(TokenKind::Reset, record).await?;

        // Raw token is URL-safe base64, so it can go straight into the link.
        let reset_url = format!(
            "{}/reset-password?token={}",
            self.frontend_base_url, raw_token
        );
        let message = EmailMessage {
            to: credential.email.as_str().to_string(),
            subject: "Password Reset Request".to_string(),
            body: format!("Use this link to reset your password: {}", reset_url),
        };

        // The token exists regardless of delivery; a failed send is logged
        // and the request still succeeds.
        if let Err(e) = self.email_sender.send(message).await {
            tracing::error!(
                email = %credential.email,
                error = %e,
                "Password reset email delivery failed"
            );
        }

        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        raw_token: &str,
        new_password: &str,
    ) -> Result<(), CredentialError> {
        let raw = raw_token.trim();
        if raw.is_empty() || new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(CredentialError::Validation(format!(
                "token required and password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let fingerprint = secrets::fingerprint(raw);
        let stored = self
            .tokens
            .find_active(TokenKind::Reset, &fingerprint)
            .await?
            .ok_or(CredentialError::InvalidToken)?;

        let password_hash = self.password_hasher.hash(new_password)?;

        match self
            .credentials
            .update_password_hash(&stored.user_id, &password_hash)
            .await
        {
            Ok(()) => {}
            Err(CredentialError::NotFound(_)) => return Err(CredentialError::InvalidToken),
            Err(e) => return Err(e),
        }

        // The used-flag write must land even though the password is already
        // updated: failing here surfaces an error instead of leaving a
        // reusable token behind.
        if !self.tokens.consume_by_id(TokenKind::Reset, stored.id).await? {
            return Err(CredentialError::InvalidToken);
        }

        Ok(())
    }

    async fn get_identity(&self, id: &UserId) -> Result<Identity, CredentialError> {
        let credential = self
            .credentials
            .find_by_id(id)
            .await?
            .ok_or(CredentialError::NotFound(id.to_string()))?;

        Ok(Identity::from(&credential))
    }

    async fn list_credentials(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Identity>, Pagination), CredentialError> {
        let page = page.max(1);
        let limit = if limit <= 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            limit.min(MAX_PAGE_LIMIT)
        };
        // page is attacker-controlled; saturate instead of overflowing.
        let offset = (page - 1).saturating_mul(limit);

        let credentials = self.credentials.list(limit, offset).await?;
        let total = self.credentials.count().await?;

        let identities = credentials.iter().map(Identity::from).collect();
        let total_pages = (total + limit - 1) / limit;

        Ok((
            identities,
            Pagination {
                page,
                limit,
                total,
                total_pages,
            },
        ))
    }

    async fn update_role(&self, id: &UserId, role: Role) -> Result<Identity, CredentialError> {
        self.credentials.update_role(id, role).await?;

        let credential = self
            .credentials
            .find_by_id(id)
            .await?
            .ok_or(CredentialError::NotFound(id.to_string()))?;

        Ok(Identity::from(&credential))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mockall::mock;
    use uuid::Uuid;

    use super::*;
    use crate::credential::errors::EmailDeliveryError;

    const ACCESS_SECRET: &[u8] = b"test-access-secret-at-least-32-bytes!";
    const REFRESH_SECRET: &[u8] = b"test-refresh-secret-at-least-32-bytes";

    mock! {
        pub TestCredentialRepository {}

        #[async_trait]
        impl CredentialRepository for TestCredentialRepository {
            async fn create(&self, credential: Credential) -> Result<Credential, CredentialError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Credential>, CredentialError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, CredentialError>;
            async fn update_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), CredentialError>;
            async fn update_role(&self, id: &UserId, role: Role) -> Result<(), CredentialError>;
            async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Credential>, CredentialError>;
            async fn count(&self) -> Result<i64, CredentialError>;
        }
    }

    mock! {
        pub TestTokenRepository {}

        #[async_trait]
        impl TokenRepository for TestTokenRepository {
            async fn create(&self, kind: TokenKind, record: TokenRecord) -> Result<TokenRecord, CredentialError>;
            async fn find_active(&self, kind: TokenKind, fingerprint: &str) -> Result<Option<TokenRecord>, CredentialError>;
            async fn consume(&self, kind: TokenKind, fingerprint: &str) -> Result<bool, CredentialError>;
            async fn consume_by_id(&self, kind: TokenKind, id: Uuid) -> Result<bool, CredentialError>;
        }
    }

    mock! {
        pub TestEmailSender {}

        #[async_trait]
        impl EmailSender for TestEmailSender {
            async fn send(&self, message: EmailMessage) -> Result<(), EmailDeliveryError>;
        }
    }

    fn test_codec() -> TokenCodec {
        TokenCodec::new(
            ACCESS_SECRET,
            REFRESH_SECRET,
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    fn service(
        credentials: MockTestCredentialRepository,
        tokens: MockTestTokenRepository,
        email_sender: MockTestEmailSender,
    ) -> CredentialService<MockTestCredentialRepository, MockTestTokenRepository, MockTestEmailSender>
    {
        CredentialService::new(
            Arc::new(credentials),
            Arc::new(tokens),
            Arc::new(email_sender),
            test_codec(),
            Duration::minutes(30),
            "http://localhost:5173",
        )
    }

    fn test_credential(email: &str, password_hash: &str, role: Role) -> Credential {
        Credential {
            id: UserId::new(),
            email: EmailAddress::new(email).unwrap(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_success_issues_verifiable_pair() {
        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        credentials
            .expect_create()
            .withf(|credential| {
                credential.email.as_str() == "a@example.com"
                    && credential.role == Role::Author
                    && credential.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(Ok);
        tokens
            .expect_create()
            .withf(|kind, record| *kind == TokenKind::Refresh && record.consumed_at.is_none())
            .times(1)
            .returning(|_, record| Ok(record));

        let service = service(credentials, tokens, email_sender);

        let (identity, pair) = service
            .register(RegisterCommand {
                email: EmailAddress::new("A@Example.com ").unwrap(),
                password: "password123".to_string(),
            })
            .await
            .expect("registration failed");

        assert_eq!(identity.email.as_str(), "a@example.com");
        assert_eq!(identity.role, Role::Author);
        assert_eq!(pair.token_type, "Bearer");

        // The access token decodes back to the registered subject and role.
        let claims = test_codec().verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, identity.id.to_string());
        assert_eq!(claims.role, "author");
    }

    #[tokio::test]
    async fn test_register_short_password() {
        let credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        let service = service(credentials, tokens, email_sender);

        let result = service
            .register(RegisterCommand {
                email: EmailAddress::new("a@example.com").unwrap(),
                password: "short".to_string(),
            })
            .await;

        assert!(matches!(result, Err(CredentialError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_precheck() {
        let mut credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials.expect_find_by_email().times(1).returning(|_| {
            Ok(Some(test_credential(
                "a@example.com",
                "$argon2id$hash",
                Role::Author,
            )))
        });
        credentials.expect_create().times(0);

        let service = service(credentials, tokens, email_sender);

        let result = service
            .register(RegisterCommand {
                email: EmailAddress::new("a@example.com").unwrap(),
                password: "password123".to_string(),
            })
            .await;

        assert!(matches!(result, Err(CredentialError::EmailAlreadyUsed)));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_race_caught_by_store() {
        let mut credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        credentials
            .expect_create()
            .times(1)
            .returning(|_| Err(CredentialError::EmailAlreadyUsed));

        let service = service(credentials, tokens, email_sender);

        let result = service
            .register(RegisterCommand {
                email: EmailAddress::new("a@example.com").unwrap(),
                password: "password123".to_string(),
            })
            .await;

        assert!(matches!(result, Err(CredentialError::EmailAlreadyUsed)));
    }

    #[tokio::test]
    async fn test_login_success() {
        let hasher = auth::PasswordHasher::new();
        let password_hash = hasher.hash("password123").unwrap();
        let credential = test_credential("a@example.com", &password_hash, Role::Reader);
        let credential_id = credential.id;

        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(credential.clone())));
        tokens
            .expect_create()
            .times(1)
            .returning(|_, record| Ok(record));

        let service = service(credentials, tokens, email_sender);

        let (identity, pair) = service
            .login(LoginCommand {
                email: EmailAddress::new("a@example.com").unwrap(),
                password: "password123".to_string(),
            })
            .await
            .expect("login failed");

        assert_eq!(identity.id, credential_id);
        let claims = test_codec().verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.role, "reader");
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_email_indistinguishable() {
        let hasher = auth::PasswordHasher::new();
        let password_hash = hasher.hash("correct password").unwrap();
        let credential = test_credential("a@example.com", &password_hash, Role::Author);

        let mut credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials
            .expect_find_by_email()
            .withf(|email| email.as_str() == "a@example.com")
            .returning(move |_| Ok(Some(credential.clone())));
        credentials
            .expect_find_by_email()
            .withf(|email| email.as_str() == "missing@example.com")
            .returning(|_| Ok(None));

        let service = service(credentials, tokens, email_sender);

        let wrong_password = service
            .login(LoginCommand {
                email: EmailAddress::new("a@example.com").unwrap(),
                password: "wrong password".to_string(),
            })
            .await;
        let unknown_email = service
            .login(LoginCommand {
                email: EmailAddress::new("missing@example.com").unwrap(),
                password: "whatever password".to_string(),
            })
            .await;

        assert!(matches!(
            wrong_password,
            Err(CredentialError::InvalidCredentials)
        ));
        assert!(matches!(
            unknown_email,
            Err(CredentialError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let codec = test_codec();
        let user_id = UserId::new();
        let issued = codec.issue_refresh(&user_id.to_string()).unwrap();
        let old_fingerprint = secrets::fingerprint(&issued.token);

        let credential = Credential {
            id: user_id,
            ..test_credential("a@example.com", "$argon2id$hash", Role::Author)
        };

        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        let record = TokenRecord::new(user_id, old_fingerprint.clone(), issued.expires_at);
        let expected_lookup = old_fingerprint.clone();
        tokens
            .expect_find_active()
            .withf(move |kind, fingerprint| {
                *kind == TokenKind::Refresh && fingerprint == expected_lookup
            })
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));
        credentials
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(credential.clone())));
        let expected_consume = old_fingerprint.clone();
        tokens
            .expect_consume()
            .withf(move |kind, fingerprint| {
                *kind == TokenKind::Refresh && fingerprint == expected_consume
            })
            .times(1)
            .returning(|_, _| Ok(true));
        tokens
            .expect_create()
            .withf(move |kind, record| {
                // The new pair is stored under a different fingerprint.
                *kind == TokenKind::Refresh && record.fingerprint != old_fingerprint
            })
            .times(1)
            .returning(|_, record| Ok(record));

        let service = service(credentials, tokens, email_sender);

        let pair = service.refresh(&issued.token).await.expect("refresh failed");

        let claims = test_codec().verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_ne!(pair.refresh_token, issued.token);
    }

    #[tokio::test]
    async fn test_refresh_without_active_record() {
        let codec = test_codec();
        let user_id = UserId::new();
        let issued = codec.issue_refresh(&user_id.to_string()).unwrap();

        let credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        // Rotated-out token: signature still verifies but no active record.
        tokens
            .expect_find_active()
            .times(1)
            .returning(|_, _| Ok(None));

        let service = service(credentials, tokens, email_sender);

        let result = service.refresh(&issued.token).await;
        assert!(matches!(result, Err(CredentialError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_refresh_subject_mismatch() {
        let codec = test_codec();
        let user_id = UserId::new();
        let issued = codec.issue_refresh(&user_id.to_string()).unwrap();
        let fingerprint = secrets::fingerprint(&issued.token);

        let credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        // Stored record owned by someone else entirely.
        let record = TokenRecord::new(UserId::new(), fingerprint, issued.expires_at);
        tokens
            .expect_find_active()
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));
        tokens.expect_consume().times(0);

        let service = service(credentials, tokens, email_sender);

        let result = service.refresh(&issued.token).await;
        assert!(matches!(result, Err(CredentialError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_refresh_loses_rotation_race() {
        let codec = test_codec();
        let user_id = UserId::new();
        let issued = codec.issue_refresh(&user_id.to_string()).unwrap();
        let fingerprint = secrets::fingerprint(&issued.token);

        let credential = Credential {
            id: user_id,
            ..test_credential("a@example.com", "$argon2id$hash", Role::Author)
        };

        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        let record = TokenRecord::new(user_id, fingerprint, issued.expires_at);
        tokens
            .expect_find_active()
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));
        credentials
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(credential.clone())));
        // A concurrent refresh consumed the record first; no new pair may
        // be issued from this request.
        tokens.expect_consume().times(1).returning(|_, _| Ok(false));
        tokens.expect_create().times(0);

        let service = service(credentials, tokens, email_sender);

        let result = service.refresh(&issued.token).await;
        assert!(matches!(result, Err(CredentialError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_logout_idempotent() {
        let codec = test_codec();
        let issued = codec.issue_refresh(&UserId::new().to_string()).unwrap();

        let credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        // First call revokes, second finds nothing active; both succeed.
        let mut outcomes = vec![true, false].into_iter();
        tokens
            .expect_consume()
            .times(2)
            .returning(move |_, _| Ok(outcomes.next().unwrap()));

        let service = service(credentials, tokens, email_sender);

        service.logout(&issued.token).await.expect("first logout");
        service.logout(&issued.token).await.expect("second logout");
    }

    #[tokio::test]
    async fn test_request_password_reset_unknown_email_succeeds_silently() {
        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let mut email_sender = MockTestEmailSender::new();

        credentials
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        tokens.expect_create().times(0);
        email_sender.expect_send().times(0);

        let service = service(credentials, tokens, email_sender);

        service
            .request_password_reset(&EmailAddress::new("ghost@example.com").unwrap())
            .await
            .expect("reset request must succeed for unknown email");
    }

    #[tokio::test]
    async fn test_request_password_reset_stores_fingerprint_and_sends_link() {
        let credential = test_credential("a@example.com", "$argon2id$hash", Role::Author);
        let credential_id = credential.id;

        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let mut email_sender = MockTestEmailSender::new();

        credentials
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(credential.clone())));
        tokens
            .expect_create()
            .withf(move |kind, record| {
                *kind == TokenKind::Reset
                    && record.user_id == credential_id
                    && record.fingerprint.len() == 64
            })
            .times(1)
            .returning(|_, record| Ok(record));
        email_sender
            .expect_send()
            .withf(|message| {
                message.to == "a@example.com"
                    && message.body.contains("/reset-password?token=")
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(credentials, tokens, email_sender);

        service
            .request_password_reset(&EmailAddress::new("a@example.com").unwrap())
            .await
            .expect("reset request failed");
    }

    #[tokio::test]
    async fn test_request_password_reset_delivery_failure_not_fatal() {
        let credential = test_credential("a@example.com", "$argon2id$hash", Role::Author);

        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let mut email_sender = MockTestEmailSender::new();

        credentials
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(credential.clone())));
        tokens
            .expect_create()
            .times(1)
            .returning(|_, record| Ok(record));
        email_sender.expect_send().times(1).returning(|_| {
            Err(EmailDeliveryError::DeliveryFailed(
                "smtp unreachable".to_string(),
            ))
        });

        let service = service(credentials, tokens, email_sender);

        // The token is stored; the request still succeeds.
        service
            .request_password_reset(&EmailAddress::new("a@example.com").unwrap())
            .await
            .expect("delivery failure must not fail the request");
    }

    #[tokio::test]
    async fn test_confirm_password_reset_success() {
        let raw_token = secrets::random_token(0).unwrap();
        let fingerprint = secrets::fingerprint(&raw_token);
        let user_id = UserId::new();
        let record = TokenRecord::new(user_id, fingerprint.clone(), Utc::now() + Duration::minutes(30));
        let record_id = record.id;

        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        tokens
            .expect_find_active()
            .withf(move |kind, candidate| *kind == TokenKind::Reset && candidate == fingerprint)
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));
        credentials
            .expect_update_password_hash()
            .withf(move |id, hash| *id == user_id && hash.starts_with("$argon2"))
            .times(1)
            .returning(|_, _| Ok(()));
        tokens
            .expect_consume_by_id()
            .withf(move |kind, id| *kind == TokenKind::Reset && *id == record_id)
            .times(1)
            .returning(|_, _| Ok(true));

        let service = service(credentials, tokens, email_sender);

        service
            .confirm_password_reset(&raw_token, "brand new password")
            .await
            .expect("confirmation failed");
    }

    #[tokio::test]
    async fn test_confirm_password_reset_second_use_rejected() {
        let raw_token = secrets::random_token(0).unwrap();

        let credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        // The used record no longer shows up as active.
        tokens
            .expect_find_active()
            .times(1)
            .returning(|_, _| Ok(None));

        let service = service(credentials, tokens, email_sender);

        let result = service
            .confirm_password_reset(&raw_token, "brand new password")
            .await;
        assert!(matches!(result, Err(CredentialError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_confirm_password_reset_short_password() {
        let credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        let service = service(credentials, tokens, email_sender);

        let result = service.confirm_password_reset("some-token", "short").await;
        assert!(matches!(result, Err(CredentialError::Validation(_))));
    }

    #[tokio::test]
    async fn test_confirm_password_reset_mark_used_failure_surfaces() {
        let raw_token = secrets::random_token(0).unwrap();
        let record = TokenRecord::new(
            UserId::new(),
            secrets::fingerprint(&raw_token),
            Utc::now() + Duration::minutes(30),
        );

        let mut credentials = MockTestCredentialRepository::new();
        let mut tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        tokens
            .expect_find_active()
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));
        credentials
            .expect_update_password_hash()
            .times(1)
            .returning(|_, _| Ok(()));
        // The password changed but marking used failed; the caller must see
        // an error rather than a silently still-valid token.
        tokens
            .expect_consume_by_id()
            .times(1)
            .returning(|_, _| Ok(false));

        let service = service(credentials, tokens, email_sender);

        let result = service
            .confirm_password_reset(&raw_token, "brand new password")
            .await;
        assert!(matches!(result, Err(CredentialError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_update_role_success() {
        let credential = test_credential("a@example.com", "$argon2id$hash", Role::Reader);
        let credential_id = credential.id;
        let mut updated = credential.clone();
        updated.role = Role::Admin;

        let mut credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials
            .expect_update_role()
            .withf(move |id, role| *id == credential_id && *role == Role::Admin)
            .times(1)
            .returning(|_, _| Ok(()));
        credentials
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(updated.clone())));

        let service = service(credentials, tokens, email_sender);

        let identity = service
            .update_role(&credential_id, Role::Admin)
            .await
            .expect("role update failed");
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_update_role_not_found() {
        let mut credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        let missing = UserId::new();
        credentials
            .expect_update_role()
            .times(1)
            .returning(move |id, _| Err(CredentialError::NotFound(id.to_string())));

        let service = service(credentials, tokens, email_sender);

        let result = service.update_role(&missing, Role::Admin).await;
        assert!(matches!(result, Err(CredentialError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_credentials_pagination() {
        let mut credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials
            .expect_list()
            .withf(|limit, offset| *limit == 10 && *offset == 10)
            .times(1)
            .returning(|_, _| {
                Ok(vec![test_credential(
                    "a@example.com",
                    "$argon2id$hash",
                    Role::Author,
                )])
            });
        credentials.expect_count().times(1).returning(|| Ok(21));

        let service = service(credentials, tokens, email_sender);

        let (identities, pagination) = service
            .list_credentials(2, 10)
            .await
            .expect("listing failed");

        assert_eq!(identities.len(), 1);
        assert_eq!(pagination.page, 2);
        assert_eq!(pagination.total, 21);
        assert_eq!(pagination.total_pages, 3);
    }

    #[tokio::test]
    async fn test_list_credentials_extreme_page_saturates_offset() {
        let mut credentials = MockTestCredentialRepository::new();
        let tokens = MockTestTokenRepository::new();
        let email_sender = MockTestEmailSender::new();

        credentials
            .expect_list()
            .withf(|limit, offset| *limit == MAX_PAGE_LIMIT && *offset == i64::MAX)
            .times(1)
            .returning(|_, _| Ok(vec![]));
        credentials.expect_count().times(1).returning(|| Ok(2));

        let service = service(credentials, tokens, email_sender);

        let (identities, pagination) = service
            .list_credentials(i64::MAX, MAX_PAGE_LIMIT)
            .await
            .expect("extreme page must yield an empty page, not a panic");

        assert!(identities.is_empty());
        assert_eq!(pagination.page, i64::MAX);
        assert_eq!(pagination.total, 2);
    }
}
