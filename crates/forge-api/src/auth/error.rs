//! 인증/인가 에러 분류.
//!
//! 코어에서 발생하는 모든 실패는 이 분류로 변환되며,
//! 각 분류는 고정된 HTTP 상태와 에러 코드로 매핑됩니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use forge_core::StoreError;
use thiserror::Error;
use tracing::{debug, error};

use super::TokenError;
use crate::error::ApiErrorResponse;

/// 인증/인가 에러.
#[derive(Debug, Error)]
pub enum AuthError {
    /// 이메일이 없거나 비밀번호가 틀림 (구분하지 않음)
    #[error("이메일 또는 비밀번호가 올바르지 않습니다")]
    InvalidCredentials,

    #[error("이미 등록된 이메일입니다")]
    DuplicateEmail,

    #[error("비밀번호 정책 위반: {0}")]
    WeakPassword(String),

    #[error("인증 토큰이 필요합니다")]
    MissingToken,

    /// 형식 오류, 만료, 위조, 폐기를 구분하지 않음
    #[error("유효하지 않은 토큰")]
    InvalidToken,

    #[error("비활성화된 계정입니다")]
    UserInactive,

    #[error("이메일 인증이 필요합니다")]
    UserUnverified,

    /// 동작과 리소스는 감사 기록용이며 응답 본문에는 포함되지 않음
    #[error("권한 거부: {action} on {resource}")]
    PermissionDenied { action: String, resource: String },

    #[error("사용자를 찾을 수 없습니다")]
    UserNotFound,

    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    #[error("저장소 오류: {0}")]
    Store(StoreError),

    #[error("내부 오류: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP 상태 코드.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::WeakPassword(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::UserInactive
            | AuthError::UserUnverified
            | AuthError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Store(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 외부에 노출되는 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::WeakPassword(_) => "WEAK_PASSWORD",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::UserInactive => "USER_INACTIVE",
            AuthError::UserUnverified => "USER_UNVERIFIED",
            AuthError::PermissionDenied { .. } => "PERMISSION_DENIED",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InvalidInput(_) => "INVALID_INPUT",
            AuthError::Store(e) if e.is_transient() => "STORE_UNAVAILABLE",
            AuthError::Store(_) => "STORE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 응답 본문에 쓰는 메시지.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::PermissionDenied { .. } => "권한이 부족합니다".to_string(),
            AuthError::Store(e) if e.is_transient() => {
                "일시적으로 요청을 처리할 수 없습니다".to_string()
            }
            AuthError::Store(_) | AuthError::Internal(_) => {
                "요청 처리 중 오류가 발생했습니다".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::NotFound => AuthError::UserNotFound,
            other => AuthError::Store(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Encoding(e) => AuthError::Internal(format!("토큰 발급 실패: {}", e)),
            TokenError::InvalidTtl => AuthError::Internal(TokenError::InvalidTtl.to_string()),
            other => {
                debug!(reason = %other, "Token rejected");
                AuthError::InvalidToken
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Auth request failed");
        }

        let body = ApiErrorResponse::new(self.code(), self.public_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::DuplicateEmail.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::WeakPassword("short".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UserInactive.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::Store(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AuthError::Store(StoreError::Corrupt("bad".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_conversion() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateEmail),
            AuthError::DuplicateEmail
        ));
        assert!(matches!(
            AuthError::from(StoreError::NotFound),
            AuthError::UserNotFound
        ));
        assert!(matches!(
            AuthError::from(StoreError::Unavailable("x".into())),
            AuthError::Store(_)
        ));
    }

    #[test]
    fn test_token_errors_collapse_to_invalid_token() {
        for e in [
            TokenError::Expired,
            TokenError::Malformed,
            TokenError::BadSignature,
            TokenError::Revoked,
        ] {
            assert!(matches!(AuthError::from(e), AuthError::InvalidToken));
        }
        assert!(matches!(
            AuthError::from(TokenError::InvalidTtl),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn test_permission_denied_message_hides_target() {
        let err = AuthError::PermissionDenied {
            action: "delete_project".to_string(),
            resource: "project:42".to_string(),
        };
        let message = err.public_message();
        assert!(!message.contains("delete_project"));
        assert!(!message.contains("project:42"));
        // 내부 로그용 Display에는 포함
        assert!(err.to_string().contains("delete_project"));
    }

    #[test]
    fn test_internal_message_hides_details() {
        let err = AuthError::Store(StoreError::Unavailable("password=hunter2".into()));
        assert!(!err.public_message().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = AuthError::PermissionDenied {
            action: "edit_story".to_string(),
            resource: "story:1".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("PERMISSION_DENIED"));
        assert!(!body.contains("edit_story"));
        assert!(!body.contains("story:1"));
    }
}
