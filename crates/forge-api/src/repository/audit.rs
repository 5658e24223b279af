//! 감사 로그 Repository (Postgres).

use async_trait::async_trait;
use forge_core::{AuditError, AuditEvent, AuditSink};
use sqlx::error::ErrorKind;
use sqlx::PgPool;

/// 제약 조건 위반은 재시도해도 실패하므로 `Rejected`로 구분.
fn map_audit_error(e: sqlx::Error) -> AuditError {
    match e.as_database_error() {
        Some(db_err)
            if matches!(
                db_err.kind(),
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation
            ) =>
        {
            AuditError::Rejected(db_err.message().to_string())
        }
        _ => AuditError::Unavailable(e.to_string()),
    }
}

/// `auth_audit_log` 테이블에 이벤트를 저장하는 싱크.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO auth_audit_log (occurred_at, principal_id, action, resource, verdict, reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.timestamp)
        .bind(event.principal_id.map(|id| id.as_uuid()))
        .bind(&event.action)
        .bind(&event.resource)
        .bind(event.verdict.as_str())
        .bind(&event.reason)
        .execute(&self.pool)
        .await
        .map_err(map_audit_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_are_unavailable() {
        assert!(matches!(
            map_audit_error(sqlx::Error::PoolTimedOut),
            AuditError::Unavailable(_)
        ));
    }
}
