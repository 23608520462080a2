use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::credential::errors::CredentialError;
use crate::domain::credential::models::TokenKind;
use crate::domain::credential::models::TokenRecord;
use crate::domain::credential::models::UserId;
use crate::domain::credential::ports::TokenRepository;

/// Postgres store for single-use token records.
///
/// Refresh and reset records share the `token_records` table, separated by
/// the `kind` column. Consumption is a conditional update so the database
/// itself arbitrates concurrent attempts on the same row.
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Uuid,
    fingerprint: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<TokenRow> for TokenRecord {
    fn from(row: TokenRow) -> Self {
        TokenRecord {
            id: row.id,
            user_id: UserId(row.user_id),
            fingerprint: row.fingerprint,
            expires_at: row.expires_at,
            consumed_at: row.consumed_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn create(
        &self,
        kind: TokenKind,
        record: TokenRecord,
    ) -> Result<TokenRecord, CredentialError> {
        sqlx::query(
            r#"
            INSERT INTO token_records (id, user_id, kind, fingerprint, expires_at, consumed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id.0)
        .bind(kind.as_str())
        .bind(&record.fingerprint)
        .bind(record.expires_at)
        .bind(record.consumed_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        Ok(record)
    }

    async fn find_active(
        &self,
        kind: TokenKind,
        fingerprint: &str,
    ) -> Result<Option<TokenRecord>, CredentialError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, user_id, fingerprint, expires_at, consumed_at, created_at
            FROM token_records
            WHERE kind = $1 AND fingerprint = $2
              AND consumed_at IS NULL
              AND expires_at > now()
            "#,
        )
        .bind(kind.as_str())
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        Ok(row.map(TokenRecord::from))
    }

    async fn consume(&self, kind: TokenKind, fingerprint: &str) -> Result<bool, CredentialError> {
        // The IS NULL guard makes this a compare-and-set: of two racing
        // consumers, only one update reports an affected row.
        let result = sqlx::query(
            r#"
            UPDATE token_records
            SET consumed_at = now()
            WHERE kind = $1 AND fingerprint = $2
              AND consumed_at IS NULL
              AND expires_at > now()
            "#,
        )
        .bind(kind.as_str())
        .bind(fingerprint)
        .execute(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_by_id(&self, kind: TokenKind, id: Uuid) -> Result<bool, CredentialError> {
        let result = sqlx::query(
            r#"
            UPDATE token_records
            SET consumed_at = now()
            WHERE kind = $1 AND id = $2
              AND consumed_at IS NULL
              AND expires_at > now()
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
