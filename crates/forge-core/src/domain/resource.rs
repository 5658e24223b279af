//! 리소스 타입 및 소유/배정 관계.
//!
//! 권한과 인가 검사의 범위가 되는 도메인 엔티티를 정의합니다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StoreError, UserId};

/// 권한 검사 대상 리소스 타입.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum ResourceType {
    Project,
    Epic,
    Story,
    Task,
    /// 사용자 계정 관리
    User,
    /// 감사 로그
    AuditLog,
}

impl ResourceType {
    /// 모든 리소스 타입.
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Project,
        ResourceType::Epic,
        ResourceType::Story,
        ResourceType::Task,
        ResourceType::User,
        ResourceType::AuditLog,
    ];

    /// 문자열로 변환.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Epic => "epic",
            Self::Story => "story",
            Self::Task => "task",
            Self::User => "user",
            Self::AuditLog => "audit_log",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 리소스 참조 (타입 + 선택적 인스턴스 ID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
}

impl ResourceRef {
    /// `resource_id`가 없으면 타입 수준 참조.
    pub fn new(resource_type: ResourceType, resource_id: Option<Uuid>) -> Self {
        Self {
            resource_type,
            resource_id,
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.resource_id {
            Some(id) => write!(f, "{}:{}", self.resource_type, id),
            None => write!(f, "{}", self.resource_type),
        }
    }
}

/// 리소스 인스턴스의 소유/배정 정보.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFacts {
    /// 생성자 또는 소유자
    pub owner_id: Option<UserId>,
    /// 배정된 사용자
    pub assignee_ids: Vec<UserId>,
    /// 리소스가 속한 팀
    pub team_id: Option<Uuid>,
}

impl ResourceFacts {
    /// 사용자가 소유자이거나 배정되었는지 확인.
    pub fn involves(&self, user: UserId) -> bool {
        self.owner_id == Some(user) || self.assignee_ids.contains(&user)
    }

    /// 리소스가 주어진 팀에 속하는지 확인.
    pub fn belongs_to_team(&self, team_id: Option<Uuid>) -> bool {
        matches!((self.team_id, team_id), (Some(a), Some(b)) if a == b)
    }
}

/// 리소스 소유/배정 정보 제공자.
///
/// 리소스를 소유한 영속성 계층이 구현합니다.
#[async_trait]
pub trait ResourceFactsProvider: Send + Sync {
    /// 리소스 인스턴스의 소유/배정 정보 조회. 리소스가 없으면 `None`.
    async fn facts(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Option<ResourceFacts>, StoreError>;
}
