//! 사용자 레코드.
//!
//! 자격증명 저장소가 소유하는 사용자 데이터의 표현입니다.
//! 역할과 권한 오버라이드는 저장소에서 문자열 식별자로 보관되며,
//! 레지스트리가 로드 시점에 닫힌 집합으로 해석합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 사용자 식별자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct UserId(pub Uuid);

impl UserId {
    /// 새로운 무작위 ID 생성.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 내부 UUID 반환.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// 저장된 사용자 레코드.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    /// 정규화된 이메일 (소문자, 공백 제거)
    pub email: String,
    /// PHC 형식 비밀번호 해시
    pub password_hash: String,
    pub display_name: Option<String>,
    /// 할당된 역할 식별자
    pub roles: Vec<String>,
    /// 역할과 무관하게 직접 부여된 권한 식별자
    pub permission_overrides: Vec<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub team_id: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 신규 사용자 입력.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub team_id: Option<Uuid>,
}

/// 사용자 부분 업데이트.
///
/// `None` 필드는 변경하지 않습니다. 저장소는 단일 문장으로 적용해야 합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub roles: Option<Vec<String>>,
    pub permission_overrides: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserUpdate {
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn roles(mut self, roles: Vec<String>) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn permission_overrides(mut self, permissions: Vec<String>) -> Self {
        self.permission_overrides = Some(permissions);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.is_verified = Some(verified);
        self
    }

    pub fn last_login_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_login_at = Some(at);
        self
    }

    /// 변경할 필드가 없는지 확인.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 레코드에 업데이트를 적용합니다 (메모리 저장소용).
    pub fn apply_to(self, record: &mut UserRecord) {
        if let Some(hash) = self.password_hash {
            record.password_hash = hash;
        }
        if let Some(roles) = self.roles {
            record.roles = roles;
        }
        if let Some(overrides) = self.permission_overrides {
            record.permission_overrides = overrides;
        }
        if let Some(active) = self.is_active {
            record.is_active = active;
        }
        if let Some(verified) = self.is_verified {
            record.is_verified = verified;
        }
        if let Some(at) = self.last_login_at {
            record.last_login_at = Some(at);
        }
        record.updated_at = Utc::now();
    }
}

/// 이메일 정규화 (앞뒤 공백 제거, 소문자 변환).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
