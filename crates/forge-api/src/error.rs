//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.
//! 인증 코어의 에러는 `AuthError`의 `IntoResponse` 구현을 통해 이 형식으로 변환됩니다.

use axum::http::{Method, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// 통합 API 에러 응답.
///
/// 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.
///
/// # 예시
///
/// ```json
/// {
///   "code": "INVALID_CREDENTIALS",
///   "message": "이메일 또는 비밀번호가 올바르지 않습니다",
///   "details": null,
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_TOKEN", "PERMISSION_DENIED", "INVALID_INPUT")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// HTTP 메서드 (GET, POST 등)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// 요청 경로
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    ///
    /// # Arguments
    ///
    /// * `code` - 에러 코드
    /// * `message` - 에러 메시지
    ///
    /// # Example
    ///
    /// ```
    /// use forge_api::error::ApiErrorResponse;
    ///
    /// let error = ApiErrorResponse::new("USER_NOT_FOUND", "사용자를 찾을 수 없습니다");
    /// ```
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
            method: None,
            path: None,
        }
    }

    /// 타임스탬프 없는 간단한 에러.
    ///
    /// # Arguments
    ///
    /// * `code` - 에러 코드
    /// * `message` - 에러 메시지
    pub fn simple(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: None,
            method: None,
            path: None,
        }
    }

    /// 요청 정보(메서드, 경로)를 추가합니다.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP 메서드 (GET, POST 등)
    /// * `uri` - 요청 URI
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::http::{Method, Uri};
    /// use forge_api::error::ApiErrorResponse;
    ///
    /// let error = ApiErrorResponse::new("MISSING_TOKEN", "인증 토큰이 필요합니다")
    ///     .with_request_info(&Method::GET, &"/api/v1/auth/me".parse::<Uri>().unwrap());
    /// ```
    #[must_use]
    pub fn with_request_info(mut self, method: &Method, uri: &Uri) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(uri.path().to_string());
        self
    }

    /// 에러 코드 반환.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// 에러 메시지 반환.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}
