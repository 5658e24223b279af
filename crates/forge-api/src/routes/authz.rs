//! 권한 확인 endpoint.
//!
//! 클라이언트가 UI 요소 표시 여부 등을 판단할 때 현재 사용자의
//! 권한을 미리 확인합니다. 결정은 감사 로그에 기록됩니다.

use axum::{extract::State, routing::post, Json, Router};
use forge_core::ResourceType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthError, AuthUser, Permission};
use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// 권한 확인 요청.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthzCheckRequest {
    pub permission: Permission,
    pub resource_type: ResourceType,
    /// 없으면 타입 수준 검사
    #[serde(default)]
    pub resource_id: Option<Uuid>,
}

/// 권한 확인 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthzCheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// 현재 사용자의 권한 확인.
#[utoipa::path(
    post,
    path = "/api/v1/authz/check",
    request_body = AuthzCheckRequest,
    responses(
        (status = 200, description = "결정 결과", body = AuthzCheckResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "authz"
)]
pub async fn check_permission(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Json(request): Json<AuthzCheckRequest>,
) -> Result<Json<AuthzCheckResponse>, AuthError> {
    let decision = state
        .authorizer
        .authorize(
            &principal,
            request.permission,
            request.resource_type,
            request.resource_id,
        )
        .await;

    Ok(Json(AuthzCheckResponse {
        allowed: decision.is_allowed(),
        reason: decision.deny_reason().map(|r| r.as_str().to_string()),
    }))
}

/// 권한 확인 라우터 생성.
pub fn authz_router() -> Router<Arc<AppState>> {
    Router::new().route("/check", post(check_permission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Registration;
    use crate::repository::InMemoryResourceFacts;
    use crate::state::create_test_state_with_facts;
    use axum::{body::Body, http::Request, http::StatusCode};
    use forge_core::{ResourceFacts, UserId};
    use tower::ServiceExt;

    async fn check(
        state: Arc<AppState>,
        token: &str,
        body: serde_json::Value,
    ) -> AuthzCheckResponse {
        let app = authz_router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/check")
                    .header("authorization", format!("Bearer {}", token))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_check_reports_scope_decision() {
        let facts = Arc::new(InMemoryResourceFacts::new());
        let state = Arc::new(create_test_state_with_facts(facts.clone()));

        let session = state
            .auth
            .register(Registration::new("dev@x.com", "pw123456"))
            .await
            .unwrap();
        let token = session.tokens.access_token.clone();

        let own_task = Uuid::new_v4();
        facts
            .insert(
                ResourceType::Task,
                own_task,
                ResourceFacts {
                    owner_id: Some(session.principal.user_id),
                    ..Default::default()
                },
            )
            .await;
        let other_task = Uuid::new_v4();
        facts
            .insert(
                ResourceType::Task,
                other_task,
                ResourceFacts {
                    owner_id: Some(UserId::new()),
                    ..Default::default()
                },
            )
            .await;

        let own = check(
            state.clone(),
            &token,
            serde_json::json!({
                "permission": "edit_task",
                "resource_type": "task",
                "resource_id": own_task,
            }),
        )
        .await;
        assert!(own.allowed);
        assert!(own.reason.is_none());

        let other = check(
            state,
            &token,
            serde_json::json!({
                "permission": "edit_task",
                "resource_type": "task",
                "resource_id": other_task,
            }),
        )
        .await;
        assert!(!other.allowed);
        assert_eq!(other.reason.as_deref(), Some("out_of_scope"));
    }

    #[tokio::test]
    async fn test_check_missing_permission() {
        let state = Arc::new(create_test_state_with_facts(Arc::new(
            InMemoryResourceFacts::new(),
        )));
        let session = state
            .auth
            .register(Registration::new("dev2@x.com", "pw123456"))
            .await
            .unwrap();

        let result = check(
            state,
            &session.tokens.access_token,
            serde_json::json!({
                "permission": "view_audit_log",
                "resource_type": "audit_log",
            }),
        )
        .await;
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("missing_permission"));
    }
}
