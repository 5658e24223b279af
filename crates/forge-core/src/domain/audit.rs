//! 감사(audit) 이벤트.
//!
//! 로그인/로그아웃/권한 검사 결과를 추적하기 위한 구조화된 이벤트와
//! 이벤트를 받아 저장하는 싱크 인터페이스입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UserId;

/// 감사 이벤트 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditVerdict {
    /// 인가 허용
    Allow,
    /// 인가 거부
    Deny,
    /// 인증 작업 성공 (로그인, 로그아웃 등)
    Success,
    /// 인증 작업 실패
    Failure,
}

impl AuditVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl std::fmt::Display for AuditVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 감사 이벤트.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    /// 주체 ID (로그인 실패처럼 주체를 특정할 수 없으면 None)
    pub principal_id: Option<UserId>,
    /// 작업 이름 (예: "login", "edit_story")
    pub action: String,
    /// 대상 리소스 (예: "story:<uuid>")
    pub resource: Option<String>,
    pub verdict: AuditVerdict,
    /// 거부/실패 사유
    pub reason: Option<String>,
}

impl AuditEvent {
    /// 현재 시각으로 새 이벤트 생성.
    pub fn new(
        principal_id: Option<UserId>,
        action: impl Into<String>,
        verdict: AuditVerdict,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            principal_id,
            action: action.into(),
            resource: None,
            verdict,
            reason: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// 감사 싱크 에러.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("감사 싱크 사용 불가: {0}")]
    Unavailable(String),

    #[error("감사 이벤트 거부됨: {0}")]
    Rejected(String),
}

/// 감사 이벤트 싱크.
///
/// 호출 측은 싱크 실패를 기록만 하고 전파하지 않습니다.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_builder() {
        let user = UserId::new();
        let event = AuditEvent::new(Some(user), "edit_story", AuditVerdict::Deny)
            .with_resource("story:1")
            .with_reason("out_of_scope");

        assert_eq!(event.principal_id, Some(user));
        assert_eq!(event.action, "edit_story");
        assert_eq!(event.resource.as_deref(), Some("story:1"));
        assert_eq!(event.reason.as_deref(), Some("out_of_scope"));
    }

    #[test]
    fn test_audit_verdict_serialization() {
        let json = serde_json::to_string(&AuditVerdict::Allow).unwrap();
        assert_eq!(json, "\"allow\"");
    }
}
