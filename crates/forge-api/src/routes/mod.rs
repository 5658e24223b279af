//! API 라우트.
//!
//! 인증 경계의 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/metrics` - Prometheus 메트릭
//! - `/api/v1/auth` - 가입, 로그인, 토큰 갱신, 비밀번호 관리 (Rate limit 적용)
//! - `/api/v1/users` - 계정 관리 (관리자)
//! - `/api/v1/authz` - 권한 확인

pub mod auth;
pub mod authz;
pub mod health;
pub mod users;

pub use auth::{
    auth_router, AuthResponse, ChangePasswordRequest, LoginRequest, LogoutRequest,
    MessageResponse, PasswordResetConfirmRequest, PasswordResetRequest, RefreshRequest,
    RegisterRequest, UserResponse, VerifyEmailRequest,
};
pub use authz::{authz_router, AuthzCheckRequest, AuthzCheckResponse};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use users::{
    users_router, AssignRolesRequest, SetPermissionsRequest, VerificationTokenResponse,
};

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

use crate::auth::AuthError;
use crate::error::ApiErrorResponse;
use crate::middleware::{metrics_layer, rate_limit_middleware};
use crate::openapi::swagger_ui_router;
use crate::state::AppState;

/// API 라우터 생성.
///
/// 인증 라우터에는 상태에 Rate Limiter가 설정된 경우에만 Rate limit이 적용됩니다.
pub fn create_api_router(state: &AppState) -> Router<Arc<AppState>> {
    let auth = match state.rate_limiter.clone() {
        Some(limiter) => auth_router().layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        )),
        None => auth_router(),
    };

    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/auth", auth)
        .nest("/api/v1/users", users_router())
        .nest("/api/v1/authz", authz_router())
}

/// 전체 라우터 생성 (API + 메트릭 + Swagger UI).
pub fn create_router(state: Arc<AppState>) -> Router {
    create_api_router(&state)
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(
            ApiErrorResponse::simple("NOT_FOUND", "경로를 찾을 수 없습니다")
                .with_request_info(&method, &uri),
        ),
    )
}

/// 요청 본문 검증.
///
/// 필드별 메시지를 `; `로 연결해 `InvalidInput`으로 반환합니다.
pub(crate) fn validate_request<T: Validate>(request: &T) -> Result<(), AuthError> {
    request.validate().map_err(|errors| {
        let mut messages = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
                })
            })
            .collect::<Vec<_>>();
        messages.sort();
        AuthError::InvalidInput(messages.join("; "))
    })
}
