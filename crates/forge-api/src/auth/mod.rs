//! 인증 및 권한 부여.
//!
//! JWT 기반 인증과 역할 기반 접근 제어(RBAC)를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`Role`], [`Permission`], [`ScopeKind`]: 닫힌 역할/권한/스코프 집합
//! - [`RoleRegistry`]: 역할 → 권한/스코프 매핑
//! - [`Principal`]: 사용자 레코드에서 해석된 인증 주체
//! - [`PasswordHasher`]: Argon2id 비밀번호 해싱
//! - [`TokenManager`]: 토큰 발급/검증/폐기/회전
//! - [`Authorizer`]: 리소스 인스턴스 수준 인가 결정
//! - [`AuthService`]: 가입/로그인/로그아웃 등 인증 흐름
//! - [`AuthUser`], [`AdminAuth`]: Axum 추출기
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(AuthUser(principal): AuthUser) -> impl IntoResponse {
//!     format!("Hello, {}!", principal.email)
//! }
//! ```

mod audit;
mod error;
mod middleware;
mod password;
mod policy;
mod principal;
mod registry;
mod revocation;
mod roles;
mod service;
mod tokens;

pub use audit::{AuditRecorder, MemoryAuditSink, TracingAuditSink, DEFAULT_AUDIT_CAPACITY};
pub use error::AuthError;
pub use middleware::{require_permission, require_role, AdminAuth, AuthUser, BearerToken};
pub use password::{PasswordError, PasswordHasher, PasswordPolicy};
pub use policy::{scope_permits, Authorizer, Decision, DenyReason};
pub use principal::Principal;
pub use registry::{RegistryError, RoleDefinition, RoleRegistry, ScopeRule};
pub use revocation::{InMemoryRevocationList, RevocationList};
pub use roles::{Permission, Role, ScopeKind};
pub use service::{AuthService, AuthSession, Registration};
pub use tokens::{Claims, TokenError, TokenManager, TokenPair, TokenType};
