//! 사용자 자격증명 Repository (Postgres).
//!
//! `users` 테이블에 대한 [`CredentialStore`] 구현입니다.
//! 모든 쓰기는 단일 SQL 문으로 수행되어 저장소 수준에서 원자적입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_core::{
    normalize_email, CredentialStore, NewUser, StoreError, UserId, UserRecord, UserUpdate,
};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    id, email, password_hash, display_name, roles, permission_overrides,
    is_active, is_verified, team_id, last_login_at, created_at, updated_at
"#;

/// DB 사용자 row.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    #[sqlx(default)]
    display_name: Option<String>,
    roles: Vec<String>,
    permission_overrides: Vec<String>,
    is_active: bool,
    is_verified: bool,
    #[sqlx(default)]
    team_id: Option<Uuid>,
    #[sqlx(default)]
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            roles: row.roles,
            permission_overrides: row.permission_overrides,
            is_active: row.is_active,
            is_verified: row.is_verified,
            team_id: row.team_id,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// sqlx 에러를 저장소 에러로 변환.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }

    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(e.to_string())
        }
        other => {
            warn!(error = %other, "Credential store query failed");
            StoreError::Unavailable(other.to_string())
        }
    }
}

/// Postgres 자격증명 저장소.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, roles, permission_overrides,
                               is_active, is_verified, team_id)
            VALUES ($1, $2, $3, $4, $5, '{{}}', true, false, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(normalize_email(&user.email))
            .bind(&user.password_hash)
            .bind(&user.display_name)
            .bind(&user.roles)
            .bind(user.team_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, StoreError> {
        // None 필드는 COALESCE로 기존 값 유지
        let sql = format!(
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                roles = COALESCE($3, roles),
                permission_overrides = COALESCE($4, permission_overrides),
                is_active = COALESCE($5, is_active),
                is_verified = COALESCE($6, is_verified),
                last_login_at = COALESCE($7, last_login_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.as_uuid())
            .bind(update.password_hash)
            .bind(update.roles)
            .bind(update.permission_overrides)
            .bind(update.is_active)
            .bind(update.is_verified)
            .bind(update.last_login_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(UserRecord::from).ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[test]
    fn test_pool_errors_are_transient() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
    }

    #[test]
    fn test_column_errors_are_corrupt() {
        let err = map_sqlx_error(sqlx::Error::ColumnNotFound("roles".to_string()));
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
