//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use forge_core::ResourceType;

use crate::auth::{Permission, Role, TokenPair};
use crate::error::ApiErrorResponse;
use crate::routes::{
    // Auth 모듈
    AuthResponse,
    ChangePasswordRequest,
    LoginRequest,
    LogoutRequest,
    MessageResponse,
    PasswordResetConfirmRequest,
    PasswordResetRequest,
    RefreshRequest,
    RegisterRequest,
    UserResponse,
    VerifyEmailRequest,
    // Users 모듈
    AssignRolesRequest,
    SetPermissionsRequest,
    VerificationTokenResponse,
    // Authz 모듈
    AuthzCheckRequest,
    AuthzCheckResponse,
    // Health 모듈
    ComponentHealth,
    ComponentStatus,
    HealthResponse,
};

/// Bearer 토큰 보안 스키마 등록.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// ==================== OpenAPI 문서 정의 ====================

/// AgileForge 인증 API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AgileForge Auth API",
        version = "0.1.0",
        description = r#"
# AgileForge 인증/인가 REST API

프로젝트 관리 플랫폼의 계정, 토큰, 역할 기반 접근 제어를 제공합니다.

## 주요 기능

- **인증**: 가입, 로그인, 토큰 갱신(회전), 로그아웃
- **비밀번호**: 변경, 재설정 토큰 발급 및 확정
- **계정 관리**: 비활성화, 역할 할당, 직접 권한 부여, 이메일 인증
- **인가**: 리소스 인스턴스 수준 권한 확인

## 인증

대부분의 엔드포인트는 JWT Bearer 토큰 인증이 필요합니다.
`Authorization: Bearer <token>` 헤더를 포함하세요.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "로컬 개발 서버"),
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 가입, 로그인, 토큰, 비밀번호"),
        (name = "users", description = "계정 관리 - 활성화, 역할, 권한"),
        (name = "authz", description = "인가 - 권한 확인")
    ),
    // ==================== 스키마 등록 ====================
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,
            Role,
            Permission,
            ResourceType,
            TokenPair,

            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Auth =====
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            LogoutRequest,
            ChangePasswordRequest,
            PasswordResetRequest,
            PasswordResetConfirmRequest,
            VerifyEmailRequest,
            UserResponse,
            AuthResponse,
            MessageResponse,

            // ===== Users =====
            AssignRolesRequest,
            SetPermissionsRequest,
            VerificationTokenResponse,

            // ===== Authz =====
            AuthzCheckRequest,
            AuthzCheckResponse,
        )
    ),
    // ==================== 경로 등록 ====================
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::me,
        crate::routes::auth::change_password,
        crate::routes::auth::request_password_reset,
        crate::routes::auth::confirm_password_reset,
        crate::routes::auth::verify_email,

        // ===== Users =====
        crate::routes::users::deactivate_user,
        crate::routes::users::reactivate_user,
        crate::routes::users::assign_roles,
        crate::routes::users::set_permissions,
        crate::routes::users::issue_verification_token,

        // ===== Authz =====
        crate::routes::authz::check_permission,
    )
)]
pub struct ApiDoc;

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// 다음 경로에 문서 UI를 마운트합니다:
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

// ==================== 테스트 ====================
