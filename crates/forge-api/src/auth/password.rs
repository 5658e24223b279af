//! 비밀번호 해싱 유틸리티.
//!
//! Argon2id 기반 비밀번호 해싱 및 검증, 비밀번호 정책.

use std::sync::Arc;

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use forge_core::AuthConfig;

/// 존재하지 않는 계정 로그인 시 검증에 사용하는 평문.
const DUMMY_PASSWORD: &str = "forge-dummy-password-for-timing";

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("잘못된 해싱 파라미터: {0}")]
    InvalidParams(String),
}

/// Argon2id 비밀번호 해셔.
///
/// 해시는 솔트와 파라미터가 포함된 PHC 문자열로 저장됩니다.
/// 검증은 저장된 해시의 파라미터를 사용하므로 파라미터를 바꿔도
/// 기존 해시는 그대로 검증됩니다.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_digest: Arc<str>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", self.argon2.params())
            .finish()
    }
}

impl PasswordHasher {
    /// 파라미터를 지정하여 생성.
    ///
    /// # Arguments
    ///
    /// * `memory_kib` - 메모리 비용 (KiB)
    /// * `iterations` - 반복 횟수
    /// * `parallelism` - 병렬도
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_digest = hash_with(&argon2, DUMMY_PASSWORD)?;

        Ok(Self {
            argon2,
            dummy_digest: Arc::from(dummy_digest),
        })
    }

    /// 인증 설정의 해싱 파라미터로 생성.
    pub fn from_config(config: &AuthConfig) -> Result<Self, PasswordError> {
        Self::with_params(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
        )
    }

    /// 비밀번호 해싱.
    ///
    /// 솔트는 매번 OS 난수로 생성되므로 같은 비밀번호도 해시가 다릅니다.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let hash = hasher.hash("my_secure_password")?;
    /// // "$argon2id$v=19$m=19456,t=2,p=1$..."
    /// ```
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, plaintext)
    }

    /// 비밀번호 검증.
    ///
    /// 해시 형식이 잘못된 경우를 포함해 어떤 실패도 불일치로 처리합니다.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// 고정 더미 해시에 대해 검증을 수행하고 항상 `false`를 반환.
    ///
    /// 존재하지 않는 이메일로 로그인할 때 응답 시간을 맞추는 데 사용합니다.
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.dummy_digest);
        false
    }
}

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailed)?;

    Ok(hash.to_string())
}

/// 비밀번호 강도 정책.
///
/// # 요구사항
///
/// - 최소 길이 이상 (문자 수 기준)
/// - 최소 1개의 숫자 포함
/// - 최소 1개의 문자 포함
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// 정책 검사. 실패 시 사용자에게 보여줄 사유를 반환합니다.
    pub fn check(&self, password: &str) -> Result<(), String> {
        if password.chars().count() < self.min_length {
            return Err(format!(
                "비밀번호는 최소 {}자 이상이어야 합니다",
                self.min_length
            ));
        }

        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err("비밀번호에 최소 1개의 숫자가 포함되어야 합니다".to_string());
        }

        if !password.chars().any(|c| c.is_alphabetic()) {
            return Err("비밀번호에 최소 1개의 문자가 포함되어야 합니다".to_string());
        }

        Ok(())
    }
}
