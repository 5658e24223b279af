//! AgileForge 인증/인가 코어와 HTTP 인증 경계.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Argon2 비밀번호 해싱과 JWT 토큰 발급/검증
//! - 역할 레지스트리와 리소스 인스턴스 수준 인가 엔진
//! - 가입, 로그인, 토큰 갱신, 계정 관리 서비스
//! - Axum 기반 REST API와 인증 추출기
//! - 헬스 체크, Prometheus 메트릭, Rate limiting
//!
//! # 모듈 구성
//!
//! - [`auth`]: 인증 서비스, 토큰, 역할 레지스트리, 인가 엔진
//! - [`repository`]: 자격증명/리소스 정보/감사 저장소 어댑터
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{
    AuthError, AuthService, Authorizer, Permission, Principal, Role, RoleRegistry, TokenManager,
    TokenPair,
};
pub use error::ApiErrorResponse;
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::{create_api_router, create_router};
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
