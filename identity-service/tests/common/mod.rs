use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use auth::TokenCodec;
use chrono::Duration;
use chrono::Utc;
use identity_service::credential::errors::CredentialError;
use identity_service::credential::errors::EmailDeliveryError;
use identity_service::credential::models::Credential;
use identity_service::credential::models::EmailAddress;
use identity_service::credential::models::EmailMessage;
use identity_service::credential::models::Role;
use identity_service::credential::models::TokenKind;
use identity_service::credential::models::TokenRecord;
use identity_service::credential::models::UserId;
use identity_service::credential::ports::CredentialRepository;
use identity_service::credential::ports::EmailSender;
use identity_service::credential::ports::TokenRepository;
use identity_service::credential::service::CredentialService;
use uuid::Uuid;

pub const ACCESS_SECRET: &[u8] = b"integration-access-secret-32-bytes!!";
pub const REFRESH_SECRET: &[u8] = b"integration-refresh-secret-32-bytes!";

/// In-memory credential store with the same contract as the Postgres
/// adapter, including the unique-email constraint.
#[derive(Default)]
pub struct InMemoryCredentialRepository {
    rows: Mutex<Vec<Credential>>,
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn create(&self, credential: Credential) -> Result<Credential, CredentialError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|row| row.email == credential.email) {
            return Err(CredentialError::EmailAlreadyUsed);
        }
        rows.push(credential.clone());
        Ok(credential)
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Credential>, CredentialError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|row| row.email == *email).cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, CredentialError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|row| row.id == *id).cloned())
    }

    async fn update_password_hash(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<(), CredentialError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|row| row.id == *id) {
            Some(row) => {
                row.password_hash = password_hash.to_string();
                row.updated_at = Utc::now();
                Ok(())
            }
            None => Err(CredentialError::NotFound(id.to_string())),
        }
    }

    async fn update_role(&self, id: &UserId, role: Role) -> Result<(), CredentialError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|row| row.id == *id) {
            Some(row) => {
                row.role = role;
                row.updated_at = Utc::now();
                Ok(())
            }
            None => Err(CredentialError::NotFound(id.to_string())),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Credential>, CredentialError> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, CredentialError> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

/// In-memory token record store mirroring the conditional-update semantics
/// of the Postgres adapter: consumption only succeeds while the record is
/// still active.
#[derive(Default)]
pub struct InMemoryTokenRepository {
    rows: Mutex<Vec<(TokenKind, TokenRecord)>>,
}

impl InMemoryTokenRepository {
    pub fn record_count(&self, kind: TokenKind) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

fn is_active(record: &TokenRecord) -> bool {
    record.consumed_at.is_none() && record.expires_at > Utc::now()
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn create(
        &self,
        kind: TokenKind,
        record: TokenRecord,
    ) -> Result<TokenRecord, CredentialError> {
        let mut rows = self.rows.lock().unwrap();
        rows.push((kind, record.clone()));
        Ok(record)
    }

    async fn find_active(
        &self,
        kind: TokenKind,
        fingerprint: &str,
    ) -> Result<Option<TokenRecord>, CredentialError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|(k, record)| {
                *k == kind && record.fingerprint == fingerprint && is_active(record)
            })
            .map(|(_, record)| record.clone()))
    }

    async fn consume(&self, kind: TokenKind, fingerprint: &str) -> Result<bool, CredentialError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|(k, record)| {
            *k == kind && record.fingerprint == fingerprint && is_active(record)
        }) {
            Some((_, record)) => {
                record.consumed_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn consume_by_id(&self, kind: TokenKind, id: Uuid) -> Result<bool, CredentialError> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|(k, record)| *k == kind && record.id == id && is_active(record))
        {
            Some((_, record)) => {
                record.consumed_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Email sender that records every message instead of delivering it.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Pull the raw reset token out of the last delivered reset link.
    pub fn last_reset_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let body = &sent.last()?.body;
        let (_, token) = body.split_once("?token=")?;
        Some(token.trim().to_string())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailDeliveryError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Full lifecycle engine over in-memory adapters.
pub struct TestHarness {
    pub service: CredentialService<
        InMemoryCredentialRepository,
        InMemoryTokenRepository,
        RecordingEmailSender,
    >,
    pub codec: TokenCodec,
    pub tokens: Arc<InMemoryTokenRepository>,
    pub emails: Arc<RecordingEmailSender>,
}

impl TestHarness {
    pub fn new() -> Self {
        let credentials = Arc::new(InMemoryCredentialRepository::default());
        let tokens = Arc::new(InMemoryTokenRepository::default());
        let emails = Arc::new(RecordingEmailSender::default());
        let codec = TokenCodec::new(
            ACCESS_SECRET,
            REFRESH_SECRET,
            Duration::minutes(15),
            Duration::days(7),
        );

        let service = CredentialService::new(
            Arc::clone(&credentials),
            Arc::clone(&tokens),
            Arc::clone(&emails),
            codec.clone(),
            Duration::minutes(30),
            "http://localhost:5173",
        );

        Self {
            service,
            codec,
            tokens,
            emails,
        }
    }
}
