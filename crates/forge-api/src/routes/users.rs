//! 사용자 계정 관리 endpoint.
//!
//! 계정 활성화 상태 변경은 `manage_users` 권한으로, 역할/직접 권한 변경은
//! 관리자 역할로 제한됩니다.

use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use forge_core::{ResourceType, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{validate_request, UserResponse};
use crate::auth::{require_permission, AdminAuth, AuthError, AuthUser, Permission, Role, TokenType};
use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// 역할 할당 요청 (기존 역할 대체).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRolesRequest {
    #[validate(length(min = 1, message = "최소 하나의 역할이 필요합니다"))]
    pub roles: Vec<Role>,
}

/// 직접 권한 설정 요청 (기존 값 대체, 빈 목록은 전체 해제).
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPermissionsRequest {
    pub permissions: Vec<Permission>,
}

/// 이메일 인증 토큰 발급 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerificationTokenResponse {
    pub token: String,
    /// 유효 기간 (초)
    pub expires_in: i64,
}

/// 계정 비활성화.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/deactivate",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "비활성화됨", body = UserResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AuthError> {
    require_permission(&state, &principal, Permission::ManageUsers, ResourceType::User, Some(id))
        .await?;
    state.auth.require_outranks(&principal, UserId(id)).await?;
    let updated = state.auth.deactivate(UserId(id)).await?;
    Ok(Json(UserResponse::from(&updated)))
}

/// 계정 재활성화.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/reactivate",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "재활성화됨", body = UserResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn reactivate_user(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AuthError> {
    require_permission(&state, &principal, Permission::ManageUsers, ResourceType::User, Some(id))
        .await?;
    state.auth.require_outranks(&principal, UserId(id)).await?;
    let updated = state.auth.reactivate(UserId(id)).await?;
    Ok(Json(UserResponse::from(&updated)))
}

/// 역할 할당.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/roles",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "할당됨", body = UserResponse),
        (status = 400, description = "입력값 오류", body = ApiErrorResponse),
        (status = 403, description = "관리자 전용", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn assign_roles(
    State(state): State<Arc<AppState>>,
    AdminAuth(_admin): AdminAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRolesRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    validate_request(&request)?;
    let updated = state.auth.assign_roles(UserId(id), &request.roles).await?;
    Ok(Json(UserResponse::from(&updated)))
}

/// 직접 부여 권한 설정.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/permissions",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    request_body = SetPermissionsRequest,
    responses(
        (status = 200, description = "설정됨", body = UserResponse),
        (status = 403, description = "관리자 전용", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn set_permissions(
    State(state): State<Arc<AppState>>,
    AdminAuth(_admin): AdminAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<SetPermissionsRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let updated = state
        .auth
        .set_permission_overrides(UserId(id), &request.permissions)
        .await?;
    Ok(Json(UserResponse::from(&updated)))
}

/// 이메일 인증 토큰 발급.
///
/// 토큰 전달은 호출자(메일 발송 등)의 책임입니다.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/verification-token",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "발급됨", body = VerificationTokenResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn issue_verification_token(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<VerificationTokenResponse>, AuthError> {
    require_permission(&state, &principal, Permission::ManageUsers, ResourceType::User, Some(id))
        .await?;
    state.auth.require_outranks(&principal, UserId(id)).await?;
    let token = state.auth.issue_verification_token(UserId(id)).await?;
    let expires_in = state
        .auth
        .tokens()
        .ttl_for(TokenType::EmailVerification)
        .num_seconds();
    Ok(Json(VerificationTokenResponse { token, expires_in }))
}

/// 사용자 관리 라우터 생성.
pub fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}/deactivate", post(deactivate_user))
        .route("/{id}/reactivate", post(reactivate_user))
        .route("/{id}/roles", put(assign_roles))
        .route("/{id}/permissions", put(set_permissions))
        .route("/{id}/verification-token", post(issue_verification_token))
}
