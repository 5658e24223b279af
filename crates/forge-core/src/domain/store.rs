//! 자격증명 저장소 추상화.
//!
//! 인증 코어가 사용하는 사용자 조회/저장 인터페이스입니다.
//! 실제 스키마와 쿼리는 영속성 계층(Postgres 어댑터 등)이 소유합니다.

use async_trait::async_trait;
use thiserror::Error;

use super::{NewUser, UserId, UserRecord, UserUpdate};

// =============================================================================
// 에러 타입
// =============================================================================

/// 저장소 에러.
///
/// 어댑터는 하위 드라이버 에러를 이 분류로 변환해서 반환해야 합니다.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 이메일 유일성 제약 위반
    #[error("이미 등록된 이메일")]
    DuplicateEmail,

    /// 대상 레코드 없음
    #[error("레코드를 찾을 수 없음")]
    NotFound,

    /// 저장소 연결/쿼리 실패
    #[error("저장소 사용 불가: {0}")]
    Unavailable(String),

    /// 저장된 데이터가 기대한 형식이 아님
    #[error("손상된 레코드: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// 일시적인 장애인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

// =============================================================================
// CredentialStore Trait
// =============================================================================

/// 사용자 자격증명 저장소 trait.
///
/// 모든 쓰기는 저장소 자체의 원자성(단일 UPDATE 문 등)으로 보호되어야 하며,
/// 호출 측은 프로세스 내 락을 사용하지 않습니다.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 이메일로 사용자 조회. 이메일은 정규화된 값으로 전달됩니다.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// ID로 사용자 조회.
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;

    /// 신규 사용자 저장.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateEmail`: 같은 이메일이 이미 존재
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// 사용자 필드 업데이트 후 갱신된 레코드 반환.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound`: 대상 사용자가 없음
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, StoreError>;
}
