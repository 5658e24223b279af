//! Axum용 인증 추출기 및 라우트 가드.
//!
//! Authorization 헤더의 Bearer 토큰을 인증 서비스로 검증하고
//! 현재 사용자 레코드로 해석된 주체를 핸들러에 전달합니다.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use forge_core::ResourceType;
use uuid::Uuid;

use super::{AuthError, Permission, Principal, Role};
use crate::state::AppState;

/// 인증 추출기.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn protected_handler(AuthUser(principal): AuthUser) -> impl IntoResponse {
///     format!("Authenticated user: {}", principal.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

/// 원본 Bearer 토큰 추출기 (로그아웃 등 토큰 자체가 필요한 경우).
#[derive(Clone)]
pub struct BearerToken(pub String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Authorization 헤더에서 Bearer 토큰 추출.
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AuthError::InvalidToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

impl FromRequestParts<Arc<AppState>> for BearerToken {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        bearer_token(parts).map(|t| BearerToken(t.to_string()))
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let principal = state.auth.current_user(token).await?;
        Ok(AuthUser(principal))
    }
}

/// Admin 역할을 요구하는 추출기.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub Principal);

impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        require_role(Role::Admin, &principal)?;
        Ok(AdminAuth(principal))
    }
}

/// 특정 역할을 요구.
pub fn require_role(required: Role, principal: &Principal) -> Result<(), AuthError> {
    if principal.has_role(required) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied {
            action: format!("role:{}", required),
            resource: "-".to_string(),
        })
    }
}

/// 권한 가드. 인가 엔진의 결정을 따르며 거부 시 403을 반환합니다.
///
/// ```rust,ignore
/// async fn deactivate(State(state): State<Arc<AppState>>, AuthUser(p): AuthUser, Path(id): Path<Uuid>) -> Result<..., AuthError> {
///     require_permission(&state, &p, Permission::ManageUsers, ResourceType::User, Some(id)).await?;
///     ...
/// }
/// ```
pub async fn require_permission(
    state: &AppState,
    principal: &Principal,
    permission: Permission,
    resource_type: ResourceType,
    resource_id: Option<Uuid>,
) -> Result<(), AuthError> {
    state
        .authorizer
        .require(principal, permission, resource_type, resource_id)
        .await
}
