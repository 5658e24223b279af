//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 모든 API 핸들러에서 공유되는 상태를 관리합니다.
//! Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다.

use std::sync::Arc;
use std::time::Duration;

use forge_core::{AppConfig, AuditSink, CredentialStore, ForgeError, ResourceFactsProvider};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::{
    AuditRecorder, AuthService, Authorizer, InMemoryRevocationList, PasswordHasher,
    PasswordPolicy, RoleRegistry, TokenManager, TracingAuditSink, DEFAULT_AUDIT_CAPACITY,
};
use crate::middleware::{RateLimitConfig, RateLimiter};
use crate::repository::{
    InMemoryCredentialStore, InMemoryResourceFacts, PgAuditSink, PgCredentialStore,
    PgResourceFacts,
};

/// 만료된 폐기 목록 항목 정리 주기.
const REVOCATION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// 상태와 함께 시작되는 백그라운드 태스크.
#[derive(Debug)]
pub struct BackgroundTasks {
    audit_drain: JoinHandle<()>,
    revocation_purge: JoinHandle<()>,
}

impl BackgroundTasks {
    /// 폐기 목록 정리를 멈추고 남은 감사 이벤트가 싱크에 기록될 때까지 대기.
    ///
    /// 감사 채널은 모든 AppState 복제본이 drop되어야 닫히므로
    /// 서버가 완전히 멈춘 뒤 호출해야 합니다. 제한 시간 안에 끝나면 `true`.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.revocation_purge.abort();
        match tokio::time::timeout(timeout, self.audit_drain).await {
            Ok(_) => true,
            Err(_) => {
                warn!("Audit drain timed out, pending events may be lost");
                false
            }
        }
    }
}

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 인증 서비스 - 가입, 로그인, 토큰 검증
    pub auth: Arc<AuthService>,

    /// 인가 엔진 - 리소스 인스턴스 수준 권한 결정
    pub authorizer: Authorizer,

    /// 데이터베이스 연결 풀 (없으면 메모리 저장소로 동작)
    pub db_pool: Option<PgPool>,

    /// Prometheus 메트릭 핸들
    pub metrics: Option<PrometheusHandle>,

    /// 인증 엔드포인트 Rate Limiter (비활성화 시 None)
    pub rate_limiter: Option<RateLimiter>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 조립된 서비스로 AppState 생성.
    pub fn new(auth: Arc<AuthService>, authorizer: Authorizer) -> Self {
        Self {
            auth,
            authorizer,
            db_pool: None,
            metrics: None,
            rate_limiter: None,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 설정에서 전체 서비스 그래프를 조립합니다.
    ///
    /// `pool`이 있으면 Postgres 어댑터를, 없으면 메모리 어댑터를 사용합니다.
    /// 감사 기록과 폐기 목록 정리 태스크가 함께 시작되므로 tokio 런타임 안에서
    /// 호출해야 합니다.
    pub fn from_config(
        config: &AppConfig,
        pool: Option<PgPool>,
    ) -> Result<(Self, BackgroundTasks), ForgeError> {
        config.auth.validate()?;

        let registry = Arc::new(
            RoleRegistry::from_config(&config.auth)
                .map_err(|e| ForgeError::Config(e.to_string()))?,
        );
        let hasher = PasswordHasher::from_config(&config.auth)
            .map_err(|e| ForgeError::Config(e.to_string()))?;
        let revocations = Arc::new(InMemoryRevocationList::new());
        let tokens = Arc::new(TokenManager::from_config(&config.auth, revocations.clone()));

        let (store, facts, sink): (
            Arc<dyn CredentialStore>,
            Arc<dyn ResourceFactsProvider>,
            Arc<dyn AuditSink>,
        ) = match &pool {
            Some(pool) => (
                Arc::new(PgCredentialStore::new(pool.clone())),
                Arc::new(PgResourceFacts::new(pool.clone())),
                Arc::new(PgAuditSink::new(pool.clone())),
            ),
            None => {
                info!("DATABASE_URL not set, using in-memory stores");
                (
                    Arc::new(InMemoryCredentialStore::new()),
                    Arc::new(InMemoryResourceFacts::new()),
                    Arc::new(TracingAuditSink),
                )
            }
        };

        // 수신 태스크는 모든 송신자가 drop되면 종료
        let (audit, audit_drain) = AuditRecorder::spawn(sink, DEFAULT_AUDIT_CAPACITY);
        let revocation_purge = revocations.spawn_purge(REVOCATION_PURGE_INTERVAL);

        let auth = AuthService::new(store, hasher, tokens, registry.clone(), audit.clone())
            .with_policy(PasswordPolicy::new(config.auth.min_password_length))
            .with_verified_login(config.auth.require_verified_login);
        let authorizer = Authorizer::new(registry, facts, audit);

        let mut state = Self::new(Arc::new(auth), authorizer);
        state.db_pool = pool;
        if config.rate_limit.enabled {
            state.rate_limiter = Some(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));
        }
        Ok((
            state,
            BackgroundTasks {
                audit_drain,
                revocation_purge,
            },
        ))
    }

    /// Prometheus 핸들 설정.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Rate Limiter 설정.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// 데이터베이스 연결 여부.
    pub fn has_db(&self) -> bool {
        self.db_pool.is_some()
    }

    /// 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        if let Some(pool) = &self.db_pool {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }
}

/// 테스트용 서명 키.
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

/// 테스트용 AppState 생성 (메모리 저장소, 저비용 해시 파라미터, Rate limit 없음).
///
/// tokio 런타임 안에서 호출해야 합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    create_test_state_with_facts(Arc::new(InMemoryResourceFacts::new()))
}

/// 리소스 정보 제공자를 지정한 테스트용 AppState.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state_with_facts(facts: Arc<InMemoryResourceFacts>) -> AppState {
    let config = forge_core::AuthConfig::with_secret(TEST_JWT_SECRET);
    let registry = Arc::new(RoleRegistry::builtin());
    let hasher =
        PasswordHasher::with_params(1024, 1, 1).expect("Failed to create PasswordHasher for test");
    let tokens = Arc::new(TokenManager::from_config(
        &config,
        Arc::new(InMemoryRevocationList::new()),
    ));
    let (audit, _) = AuditRecorder::spawn(Arc::new(TracingAuditSink), DEFAULT_AUDIT_CAPACITY);

    let auth = AuthService::new(
        Arc::new(InMemoryCredentialStore::new()),
        hasher,
        tokens,
        registry.clone(),
        audit.clone(),
    );
    let authorizer = Authorizer::new(registry, facts, audit);
    AppState::new(Arc::new(auth), authorizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::AuthConfig;

    fn test_config() -> AppConfig {
        AppConfig {
            auth: AuthConfig {
                hash_memory_kib: 1024,
                hash_iterations: 1,
                ..AuthConfig::with_secret(TEST_JWT_SECRET)
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_from_config_in_memory() {
        let (state, _tasks) = AppState::from_config(&test_config(), None).unwrap();
        assert!(!state.has_db());
        assert!(state.rate_limiter.is_some());
        assert!(state.uptime_secs() >= 0);
    }

    #[tokio::test]
    async fn test_from_config_rejects_unknown_default_role() {
        let mut config = test_config();
        config.auth.default_role = "owner".to_string();
        let err = AppState::from_config(&config, None).err().unwrap();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_disabled() {
        let mut config = test_config();
        config.rate_limit.enabled = false;
        let (state, _tasks) = AppState::from_config(&config, None).unwrap();
        assert!(state.rate_limiter.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_drains_audit_after_state_dropped() {
        let (state, tasks) = AppState::from_config(&test_config(), None).unwrap();
        state
            .auth
            .register(crate::auth::Registration::new("a@x.com", "pw123456"))
            .await
            .unwrap();

        drop(state);
        assert!(tasks.shutdown(Duration::from_secs(5)).await);
    }
}
