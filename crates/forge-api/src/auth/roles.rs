//! 역할 기반 접근 제어 (RBAC) 식별자.
//!
//! 역할, 권한, 스코프의 닫힌 집합을 정의합니다.
//! 역할별 권한 부여는 [`RoleRegistry`](super::RoleRegistry)가 담당합니다.

use forge_core::ResourceType;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 사용자 역할.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 관리자 - 모든 권한 보유
    Admin,
    /// 매니저 - 프로젝트 전반 관리
    Manager,
    /// 개발자 - 스토리/태스크 작업
    Developer,
    /// 뷰어 - 읽기 전용
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Developer, Role::Viewer];

    /// 내장 우선순위 (높을수록 상위).
    pub fn default_rank(&self) -> u8 {
        match self {
            Role::Admin => 100,
            Role::Manager => 75,
            Role::Developer => 50,
            Role::Viewer => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Developer => "developer",
            Role::Viewer => "viewer",
        }
    }

    /// 문자열에서 역할 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "developer" => Some(Role::Developer),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 시스템 권한.
///
/// 리소스 타입에 대한 하나의 동작을 나타내며, 서로 조합되지 않습니다.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewProject,
    CreateProject,
    EditProject,
    DeleteProject,
    ViewEpic,
    CreateEpic,
    EditEpic,
    DeleteEpic,
    ViewStory,
    CreateStory,
    EditStory,
    DeleteStory,
    ViewTask,
    CreateTask,
    EditTask,
    DeleteTask,
    ViewUsers,
    ManageUsers,
    ViewAuditLog,
}

impl Permission {
    pub const ALL: [Permission; 19] = [
        Permission::ViewProject,
        Permission::CreateProject,
        Permission::EditProject,
        Permission::DeleteProject,
        Permission::ViewEpic,
        Permission::CreateEpic,
        Permission::EditEpic,
        Permission::DeleteEpic,
        Permission::ViewStory,
        Permission::CreateStory,
        Permission::EditStory,
        Permission::DeleteStory,
        Permission::ViewTask,
        Permission::CreateTask,
        Permission::EditTask,
        Permission::DeleteTask,
        Permission::ViewUsers,
        Permission::ManageUsers,
        Permission::ViewAuditLog,
    ];

    /// 권한 식별자 (예: "create_story").
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewProject => "view_project",
            Permission::CreateProject => "create_project",
            Permission::EditProject => "edit_project",
            Permission::DeleteProject => "delete_project",
            Permission::ViewEpic => "view_epic",
            Permission::CreateEpic => "create_epic",
            Permission::EditEpic => "edit_epic",
            Permission::DeleteEpic => "delete_epic",
            Permission::ViewStory => "view_story",
            Permission::CreateStory => "create_story",
            Permission::EditStory => "edit_story",
            Permission::DeleteStory => "delete_story",
            Permission::ViewTask => "view_task",
            Permission::CreateTask => "create_task",
            Permission::EditTask => "edit_task",
            Permission::DeleteTask => "delete_task",
            Permission::ViewUsers => "view_users",
            Permission::ManageUsers => "manage_users",
            Permission::ViewAuditLog => "view_audit_log",
        }
    }

    /// 식별자에서 파싱. 닫힌 집합 밖의 값은 `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// 권한이 적용되는 리소스 타입.
    pub fn resource_type(&self) -> ResourceType {
        use Permission::*;
        match self {
            ViewProject | CreateProject | EditProject | DeleteProject => ResourceType::Project,
            ViewEpic | CreateEpic | EditEpic | DeleteEpic => ResourceType::Epic,
            ViewStory | CreateStory | EditStory | DeleteStory => ResourceType::Story,
            ViewTask | CreateTask | EditTask | DeleteTask => ResourceType::Task,
            ViewUsers | ManageUsers => ResourceType::User,
            ViewAuditLog => ResourceType::AuditLog,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 권한 부여 범위.
///
/// 선언 순서가 넓이 순서입니다: `Assigned < Team < Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// 소유하거나 배정된 인스턴스만
    Assigned,
    /// 같은 팀의 인스턴스 (소유/배정 포함)
    Team,
    /// 모든 인스턴스
    Global,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Assigned => "assigned",
            ScopeKind::Team => "team",
            ScopeKind::Global => "global",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "assigned" => Some(ScopeKind::Assigned),
            "team" => Some(ScopeKind::Team),
            "global" => Some(ScopeKind::Global),
            _ => None,
        }
    }

    /// 인스턴스 수준 검사가 필요한지 여부.
    pub fn is_instance_level(&self) -> bool {
        !matches!(self, ScopeKind::Global)
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("MANAGER"), Some(Role::Manager));
        assert_eq!(Role::parse(" Developer "), Some(Role::Developer));
        assert_eq!(Role::parse("unknown"), None);
    }

    #[test]
    fn test_role_rank_order() {
        assert!(Role::Admin.default_rank() > Role::Manager.default_rank());
        assert!(Role::Manager.default_rank() > Role::Developer.default_rank());
        assert!(Role::Developer.default_rank() > Role::Viewer.default_rank());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Developer).unwrap();
        assert_eq!(json, "\"developer\"");

        let parsed: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Role::Developer);
    }

    #[test]
    fn test_permission_identifiers_are_unique_and_parse_back() {
        let mut seen = std::collections::HashSet::new();
        for permission in Permission::ALL {
            assert!(seen.insert(permission.as_str()));
            assert_eq!(Permission::parse(permission.as_str()), Some(permission));
        }
        assert_eq!(Permission::parse("launch_rocket"), None);
    }

    #[test]
    fn test_permission_serde_matches_identifier() {
        let json = serde_json::to_string(&Permission::CreateStory).unwrap();
        assert_eq!(json, "\"create_story\"");
    }

    #[test]
    fn test_permission_resource_type() {
        assert_eq!(Permission::EditStory.resource_type(), ResourceType::Story);
        assert_eq!(Permission::ManageUsers.resource_type(), ResourceType::User);
        assert_eq!(Permission::ViewAuditLog.resource_type(), ResourceType::AuditLog);

        let task_permissions = Permission::ALL
            .iter()
            .filter(|p| p.resource_type() == ResourceType::Task)
            .count();
        assert_eq!(task_permissions, 4);
    }

    #[test]
    fn test_scope_ordering() {
        assert!(ScopeKind::Assigned < ScopeKind::Team);
        assert!(ScopeKind::Team < ScopeKind::Global);
        assert!(!ScopeKind::Global.is_instance_level());
        assert!(ScopeKind::Assigned.is_instance_level());
        assert_eq!(ScopeKind::parse("TEAM"), Some(ScopeKind::Team));
    }
}
