//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! TOML 파일(선택)과 `FORGE__` 접두사 환경 변수에서 로드합니다.
//!
//! ```text
//! FORGE__AUTH__JWT_SECRET=...
//! FORGE__AUTH__ACCESS_TTL_MINUTES=15
//! FORGE__SERVER__PORT=8080
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::Path;

use crate::error::ForgeError;

/// JWT 서명 키 최소 길이 (바이트).
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// 토큰 수명 상한.
pub const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_REFRESH_TTL_DAYS: i64 = 365;
pub const MAX_RESET_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_VERIFICATION_TTL_HOURS: i64 = 30 * 24;

/// 애플리케이션 설정.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 인증 설정
    pub auth: AuthConfig,
    /// 인증 엔드포인트 Rate Limit 설정
    pub rate_limit: RateLimitSettings,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 메모리 저장소로 동작)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 10,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 인증 엔드포인트 Rate Limit 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// IP당 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// 버스트 허용량
    pub burst_size: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 10,
        }
    }
}

/// 설정 파일에서 정의하는 역할.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    /// 역할 식별자 (admin, manager, developer, viewer)
    pub name: String,
    /// 우선순위 (높을수록 상위)
    pub rank: u8,
    /// 부여 권한 식별자 목록
    pub permissions: Vec<String>,
}

/// 설정 파일에서 정의하는 스코프 규칙.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeRuleConfig {
    pub role: String,
    pub permission: String,
    /// global | team | assigned
    pub scope: String,
}

/// 인증 설정.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub jwt_secret: SecretString,
    /// 토큰 발급자 (iss)
    pub issuer: String,
    /// Access Token 만료 시간 (분)
    pub access_ttl_minutes: i64,
    /// Refresh Token 만료 시간 (일)
    pub refresh_ttl_days: i64,
    /// 비밀번호 재설정 토큰 만료 시간 (분)
    pub reset_ttl_minutes: i64,
    /// 이메일 인증 토큰 만료 시간 (시간)
    pub verification_ttl_hours: i64,
    /// 가입 시 기본 역할
    pub default_role: String,
    /// 비밀번호 최소 길이
    pub min_password_length: usize,
    /// 이메일 미인증 계정의 로그인 차단 여부
    pub require_verified_login: bool,
    /// 직접 부여된 권한에 적용할 스코프
    pub override_scope: String,
    /// Argon2 메모리 비용 (KiB)
    pub hash_memory_kib: u32,
    /// Argon2 반복 횟수
    pub hash_iterations: u32,
    /// Argon2 병렬도
    pub hash_parallelism: u32,
    /// 내장 역할 정의 대체 (없으면 내장 정의 사용)
    pub roles: Option<Vec<RoleConfig>>,
    /// 내장 스코프 규칙 대체
    pub scope_rules: Option<Vec<ScopeRuleConfig>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::from(String::new()),
            issuer: "agileforge".to_string(),
            access_ttl_minutes: 30,
            refresh_ttl_days: 7,
            reset_ttl_minutes: 30,
            verification_ttl_hours: 48,
            default_role: "developer".to_string(),
            min_password_length: 8,
            require_verified_login: false,
            override_scope: "assigned".to_string(),
            hash_memory_kib: 19 * 1024,
            hash_iterations: 2,
            hash_parallelism: 1,
            roles: None,
            scope_rules: None,
        }
    }
}

impl AuthConfig {
    /// 주어진 서명 키로 기본 설정 생성.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: SecretString::from(secret.into()),
            ..Default::default()
        }
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> Result<(), ForgeError> {
        if self.jwt_secret.expose_secret().len() < MIN_JWT_SECRET_LENGTH {
            return Err(ForgeError::Config(format!(
                "auth.jwt_secret는 최소 {}바이트 이상이어야 합니다",
                MIN_JWT_SECRET_LENGTH
            )));
        }

        // (이름, 값, 상한)
        let ttls = [
            ("access_ttl_minutes", self.access_ttl_minutes, MAX_ACCESS_TTL_MINUTES),
            ("refresh_ttl_days", self.refresh_ttl_days, MAX_REFRESH_TTL_DAYS),
            ("reset_ttl_minutes", self.reset_ttl_minutes, MAX_RESET_TTL_MINUTES),
            ("verification_ttl_hours", self.verification_ttl_hours, MAX_VERIFICATION_TTL_HOURS),
        ];
        if let Some((name, _, _)) = ttls.iter().find(|(_, v, _)| *v <= 0) {
            return Err(ForgeError::Config(format!(
                "auth.{}는 0보다 커야 합니다",
                name
            )));
        }
        if let Some((name, _, max)) = ttls.iter().find(|(_, v, max)| v > max) {
            return Err(ForgeError::Config(format!(
                "auth.{}는 {} 이하여야 합니다",
                name, max
            )));
        }

        if self.default_role.trim().is_empty() {
            return Err(ForgeError::Config(
                "auth.default_role이 비어 있습니다".to_string(),
            ));
        }

        if self.hash_iterations == 0 || self.hash_parallelism == 0 {
            return Err(ForgeError::Config(
                "auth.hash_iterations와 auth.hash_parallelism은 1 이상이어야 합니다".to_string(),
            ));
        }

        if self.min_password_length == 0 {
            return Err(ForgeError::Config(
                "auth.min_password_length는 1 이상이어야 합니다".to_string(),
            ));
        }

        Ok(())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::from(raw))
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없어도 에러가 아니며, 환경 변수가 파일 값을 오버라이드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ForgeError> {
        let builder = config::Config::builder()
            // 파일에서 로드 (선택)
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("FORGE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, ForgeError> {
        Self::load("config/default.toml")
    }

    /// 전체 설정 검증.
    pub fn validate(&self) -> Result<(), ForgeError> {
        self.auth.validate()?;

        if self.rate_limit.enabled && self.rate_limit.requests_per_minute == 0 {
            return Err(ForgeError::Config(
                "rate_limit.requests_per_minute는 0보다 커야 합니다".to_string(),
            ));
        }

        Ok(())
    }

    /// 서버 바인딩 주소 문자열.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    #[test]
    fn test_default_auth_config_rejected_without_secret() {
        let config = AuthConfig::default();
        assert!(matches!(config.validate(), Err(ForgeError::Config(_))));
    }

    #[test]
    fn test_auth_config_with_secret_is_valid() {
        let config = AuthConfig::with_secret(TEST_SECRET);
        assert!(config.validate().is_ok());
        assert_eq!(config.default_role, "developer");
        assert_eq!(config.access_ttl_minutes, 30);
        assert_eq!(config.refresh_ttl_days, 7);
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let config = AuthConfig {
            refresh_ttl_days: 0,
            ..AuthConfig::with_secret(TEST_SECRET)
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_ttl_days"));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let config = AuthConfig {
            refresh_ttl_days: i64::MAX,
            ..AuthConfig::with_secret(TEST_SECRET)
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_ttl_days"));

        let config = AuthConfig {
            verification_ttl_hours: MAX_VERIFICATION_TTL_HOURS + 1,
            ..AuthConfig::with_secret(TEST_SECRET)
        };
        assert!(config.validate().is_err());

        // 상한값 자체는 허용
        let config = AuthConfig {
            access_ttl_minutes: MAX_ACCESS_TTL_MINUTES,
            refresh_ttl_days: MAX_REFRESH_TTL_DAYS,
            reset_ttl_minutes: MAX_RESET_TTL_MINUTES,
            verification_ttl_hours: MAX_VERIFICATION_TTL_HOURS,
            ..AuthConfig::with_secret(TEST_SECRET)
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config = AuthConfig::with_secret(TEST_SECRET);
        let debug = format!("{:?}", config);
        assert!(!debug.contains(TEST_SECRET));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("forge-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            format!(
                r#"
[server]
port = 8088

[auth]
jwt_secret = "{}"
access_ttl_minutes = 15
default_role = "viewer"
"#,
                TEST_SECRET
            ),
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.access_ttl_minutes, 15);
        assert_eq!(config.auth.default_role, "viewer");
        assert_eq!(config.auth.refresh_ttl_days, 7);
        assert_eq!(config.bind_address(), "127.0.0.1:8088");

        std::fs::remove_dir_all(&dir).ok();
    }
}
