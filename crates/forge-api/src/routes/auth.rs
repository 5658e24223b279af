//! 인증 endpoint.
//!
//! 가입, 로그인, 토큰 갱신, 로그아웃, 비밀번호 변경/재설정, 이메일 인증을 제공합니다.
//! 요청 본문은 코어에 전달되기 전에 `validator`로 검증됩니다.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use forge_core::auth_span;
use tracing::{info, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::validate_request;
use crate::auth::{
    AuthError, AuthSession, AuthUser, BearerToken, Permission, Principal, Registration, Role,
    TokenPair,
};
use crate::error::ApiErrorResponse;
use crate::state::AppState;

// ==================== 요청 타입 ====================

/// 가입 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: String,
    #[validate(length(min = 1, max = 256, message = "비밀번호는 1-256자여야 합니다"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "표시 이름은 100자 이하여야 합니다"))]
    pub display_name: Option<String>,
    #[serde(default)]
    pub team_id: Option<Uuid>,
}

/// 로그인 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 320, message = "이메일을 입력하세요"))]
    pub email: String,
    #[validate(length(min = 1, max = 256, message = "비밀번호를 입력하세요"))]
    pub password: String,
}

/// 토큰 갱신 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token이 필요합니다"))]
    pub refresh_token: String,
}

/// 로그아웃 요청 (본문 생략 가능).
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// 비밀번호 변경 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 256, message = "현재 비밀번호를 입력하세요"))]
    pub current_password: String,
    #[validate(length(min = 1, max = 256, message = "새 비밀번호는 1-256자여야 합니다"))]
    pub new_password: String,
}

/// 비밀번호 재설정 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: String,
}

/// 비밀번호 재설정 확정 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1, message = "token이 필요합니다"))]
    pub token: String,
    #[validate(length(min = 1, max = 256, message = "새 비밀번호는 1-256자여야 합니다"))]
    pub new_password: String,
}

/// 이메일 인증 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "token이 필요합니다"))]
    pub token: String,
}

// ==================== 응답 타입 ====================

/// 사용자 정보 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
    /// 유효 권한 (역할 + 직접 부여)
    pub permissions: Vec<Permission>,
    pub team_id: Option<Uuid>,
    pub is_verified: bool,
}

impl From<&Principal> for UserResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.user_id.as_uuid(),
            email: principal.email.clone(),
            roles: principal.roles.iter().copied().collect(),
            permissions: principal.permissions.iter().copied().collect(),
            team_id: principal.team_id,
            is_verified: principal.is_verified,
        }
    }
}

/// 가입/로그인 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: UserResponse::from(&session.principal),
            tokens: session.tokens,
        }
    }
}

/// 단순 메시지 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

// ==================== 핸들러 ====================

/// 가입.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "가입 성공", body = AuthResponse),
        (status = 400, description = "입력값 오류", body = ApiErrorResponse),
        (status = 409, description = "이미 등록된 이메일", body = ApiErrorResponse),
        (status = 422, description = "비밀번호 정책 위반", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_request(&request)?;

    let mut registration = Registration::new(request.email, request.password);
    if let Some(name) = request.display_name {
        registration = registration.with_display_name(name);
    }
    if let Some(team_id) = request.team_id {
        registration = registration.with_team(team_id);
    }

    let session = state
        .auth
        .register(registration)
        .instrument(auth_span!("auth.register"))
        .await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::from(session))))
}

/// 로그인.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = AuthResponse),
        (status = 401, description = "이메일 또는 비밀번호 오류", body = ApiErrorResponse),
        (status = 403, description = "비활성/미인증 계정", body = ApiErrorResponse),
        (status = 429, description = "요청 과다", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    validate_request(&request)?;
    let session = state
        .auth
        .login(&request.email, &request.password)
        .instrument(auth_span!("auth.login"))
        .await?;
    Ok(Json(session.into()))
}

/// Access Token 갱신 (Refresh Token 회전).
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "갱신 성공", body = TokenPair),
        (status = 401, description = "유효하지 않은 토큰", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    validate_request(&request)?;
    let tokens = state
        .auth
        .refresh(&request.refresh_token)
        .instrument(auth_span!("auth.refresh"))
        .await?;
    Ok(Json(tokens))
}

/// 로그아웃. 본문에 refresh_token을 포함하면 함께 폐기합니다.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body(content = LogoutRequest, description = "선택"),
    responses(
        (status = 204, description = "로그아웃 완료"),
        (status = 401, description = "유효하지 않은 토큰", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(access_token): BearerToken,
    body: Bytes,
) -> Result<StatusCode, AuthError> {
    let request: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AuthError::InvalidInput(format!("요청 본문 파싱 실패: {}", e)))?
    };

    state
        .auth
        .logout(&access_token, request.refresh_token.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 현재 사용자 조회.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "현재 사용자", body = UserResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "비활성 계정", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(AuthUser(principal): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&principal))
}

/// 비밀번호 변경.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "변경 완료"),
        (status = 401, description = "현재 비밀번호 불일치", body = ApiErrorResponse),
        (status = 422, description = "비밀번호 정책 위반", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AuthError> {
    validate_request(&request)?;
    let user_id = principal.user_id;
    state
        .auth
        .change_password(&principal, &request.current_password, &request.new_password)
        .instrument(auth_span!("auth.change_password", user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 비밀번호 재설정 토큰 요청.
///
/// 계정 존재 여부를 드러내지 않도록 항상 202를 반환합니다.
/// 토큰 전달(이메일 발송)은 외부 협력자의 책임입니다.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "요청 접수", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_request(&request)?;

    if state
        .auth
        .request_password_reset(&request.email)
        .await?
        .is_some()
    {
        info!("Password reset token issued");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "등록된 계정이면 재설정 안내가 발송됩니다".to_string(),
        }),
    ))
}

/// 비밀번호 재설정 확정.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset/confirm",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 204, description = "재설정 완료"),
        (status = 401, description = "유효하지 않은 토큰", body = ApiErrorResponse),
        (status = 422, description = "비밀번호 정책 위반", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<StatusCode, AuthError> {
    validate_request(&request)?;
    state
        .auth
        .reset_password(&request.token, &request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 이메일 인증.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "인증 완료", body = UserResponse),
        (status = 401, description = "유효하지 않은 토큰", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    validate_request(&request)?;
    let principal = state.auth.verify_email(&request.token).await?;
    Ok(Json(UserResponse::from(&principal)))
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", post(change_password))
        .route("/password-reset/request", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
        .route("/verify-email", post(verify_email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            email: "a@x.com".to_string(),
            password: "pw123456".to_string(),
            display_name: None,
            team_id: None,
        };
        assert!(validate_request(&ok).is_ok());

        let bad = RegisterRequest {
            email: "not-an-email".to_string(),
            ..ok
        };
        match validate_request(&bad) {
            Err(AuthError::InvalidInput(message)) => {
                assert!(message.contains("이메일 형식"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_login_request_rejects_empty_fields() {
        let request = LoginRequest {
            email: String::new(),
            password: String::new(),
        };
        match validate_request(&request) {
            Err(AuthError::InvalidInput(message)) => {
                assert!(message.contains("이메일을 입력하세요"));
                assert!(message.contains("비밀번호를 입력하세요"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_logout_request_defaults() {
        let request: LogoutRequest = serde_json::from_str("{}").unwrap();
        assert!(request.refresh_token.is_none());
    }
}
