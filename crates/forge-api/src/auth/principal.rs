//! 인증된 주체.

use std::collections::BTreeSet;

use forge_core::{UserId, UserRecord};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::{Permission, Role, RoleRegistry};

/// 인증된 사용자와 그 역할/권한.
///
/// 사용자 레코드와 레지스트리로부터 매 요청마다 해석됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub roles: BTreeSet<Role>,
    /// 역할과 무관하게 직접 부여된 권한
    pub overrides: BTreeSet<Permission>,
    /// 유효 권한 (역할 권한 ∪ 직접 부여)
    pub permissions: BTreeSet<Permission>,
    pub team_id: Option<Uuid>,
    pub is_verified: bool,
}

impl Principal {
    /// 사용자 레코드에서 주체 해석.
    ///
    /// 레지스트리에 없는 역할/권한 식별자는 무시되고 경고로 기록됩니다.
    pub fn resolve(record: &UserRecord, registry: &RoleRegistry) -> Self {
        let roles: BTreeSet<Role> = record
            .roles
            .iter()
            .filter_map(|name| {
                let role = Role::parse(name);
                if role.is_none() {
                    warn!(user_id = %record.id, role = %name, "Ignoring unknown role on user record");
                }
                role
            })
            .collect();

        let overrides: BTreeSet<Permission> = record
            .permission_overrides
            .iter()
            .filter_map(|name| {
                let permission = Permission::parse(name);
                if permission.is_none() {
                    warn!(user_id = %record.id, permission = %name, "Ignoring unknown permission override");
                }
                permission
            })
            .collect();

        let mut permissions = registry.permissions_for(&roles);
        permissions.extend(overrides.iter().copied());

        Self {
            user_id: record.id,
            email: record.email.clone(),
            roles,
            overrides,
            permissions,
            team_id: record.team_id,
            is_verified: record.is_verified,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// 역할 식별자 목록 (토큰 스냅샷, 응답용).
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(roles: &[&str], overrides: &[&str]) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: UserId::new(),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$dummy".to_string(),
            display_name: None,
            roles: roles.iter().map(|s| s.to_string()).collect(),
            permission_overrides: overrides.iter().map(|s| s.to_string()).collect(),
            is_active: true,
            is_verified: false,
            team_id: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_resolve_unions_roles_and_overrides() {
        let registry = RoleRegistry::builtin();
        let principal = Principal::resolve(&record(&["viewer"], &["create_task"]), &registry);

        assert!(principal.has_role(Role::Viewer));
        assert!(principal.has_permission(Permission::ViewStory));
        assert!(principal.has_permission(Permission::CreateTask));
        assert!(!principal.has_permission(Permission::EditTask));
        assert!(!principal.is_admin());
    }

    #[test]
    fn test_resolve_never_includes_unassigned_role_permissions() {
        let registry = RoleRegistry::builtin();
        let principal = Principal::resolve(&record(&["developer"], &[]), &registry);

        assert_eq!(principal.permissions, registry.permissions_for(&[Role::Developer]));
        assert!(!principal.has_permission(Permission::ManageUsers));
    }

    #[test]
    fn test_resolve_skips_unknown_identifiers() {
        let registry = RoleRegistry::builtin();
        let principal = Principal::resolve(&record(&["wizard", "viewer"], &["fly"]), &registry);

        assert_eq!(principal.roles.len(), 1);
        assert!(principal.overrides.is_empty());
        assert_eq!(principal.role_names(), vec!["viewer".to_string()]);
    }
}
