//! AgileForge 공통 에러 타입.
//!
//! 이 모듈은 설정 로드, 부트스트랩 등 인증 코어 바깥에서 사용되는 에러 타입을 정의합니다.
//! 인증 도메인의 에러 분류는 `forge-api`의 `AuthError`가 담당합니다.

use thiserror::Error;

/// 공통 에러.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),
}

impl From<config::ConfigError> for ForgeError {
    fn from(err: config::ConfigError) -> Self {
        ForgeError::Config(err.to_string())
    }
}
