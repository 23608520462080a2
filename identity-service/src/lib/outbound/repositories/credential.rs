use std::str::FromStr;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::credential::models::Credential;
use crate::domain::credential::models::EmailAddress;
use crate::domain::credential::models::Role;
use crate::domain::credential::models::UserId;
use crate::domain::credential::ports::CredentialRepository;
use crate::credential::errors::CredentialError;

pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = CredentialError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(Credential {
            id: UserId(row.id),
            email: EmailAddress::new(&row.email)?,
            password_hash: row.password_hash,
            role: Role::from_str(&row.role)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn create(&self, credential: Credential) -> Result<Credential, CredentialError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(credential.id.0)
        .bind(credential.email.as_str())
        .bind(&credential.password_hash)
        .bind(credential.role.as_str())
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
                    return CredentialError::EmailAlreadyUsed;
                }
            }
            CredentialError::DatabaseError(e.to_string())
        })?;

        Ok(credential)
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Credential>, CredentialError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        row.map(Credential::try_from).transpose()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, CredentialError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        row.map(Credential::try_from).transpose()
    }

    async fn update_password_hash(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<(), CredentialError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn update_role(&self, id: &UserId, role: Role) -> Result<(), CredentialError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Credential>, CredentialError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password_hash, role, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Credential::try_from).collect()
    }

    async fn count(&self) -> Result<i64, CredentialError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CredentialError::DatabaseError(e.to_string()))
    }
}
