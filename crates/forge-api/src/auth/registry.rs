//! 역할/권한 레지스트리.
//!
//! 역할별 권한 부여와 (역할 × 권한 × 스코프) 규칙 테이블을 보관합니다.
//! 시작 시 한 번 생성된 뒤 변경되지 않으며, `Arc`로 공유되어
//! 동기화 없이 동시에 읽힙니다.

use std::collections::{BTreeSet, HashMap};

use forge_core::{AuthConfig, RoleConfig, ScopeRuleConfig};
use thiserror::Error;

use super::{Permission, Principal, Role, ScopeKind};

/// 레지스트리 구성 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("알 수 없는 역할: {0}")]
    UnknownRole(String),

    #[error("알 수 없는 권한: {0}")]
    UnknownPermission(String),

    #[error("알 수 없는 스코프: {0}")]
    UnknownScope(String),

    #[error("중복 정의된 역할: {0}")]
    DuplicateRole(Role),

    #[error("역할 {role}에 부여되지 않은 권한 {permission}에 대한 스코프 규칙")]
    UngrantedScopeRule { role: Role, permission: Permission },

    #[error("정의되지 않은 기본 역할: {0}")]
    UndefinedDefaultRole(Role),
}

/// 역할 정의.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub role: Role,
    /// 우선순위 (높을수록 상위)
    pub rank: u8,
    pub permissions: BTreeSet<Permission>,
}

impl RoleDefinition {
    pub fn new(role: Role, rank: u8, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            role,
            rank,
            permissions: permissions.into_iter().collect(),
        }
    }
}

/// 스코프 규칙 한 행. 규칙이 없는 (역할, 권한) 쌍은 전역입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeRule {
    pub role: Role,
    pub permission: Permission,
    pub scope: ScopeKind,
}

impl ScopeRule {
    pub const fn new(role: Role, permission: Permission, scope: ScopeKind) -> Self {
        Self {
            role,
            permission,
            scope,
        }
    }
}

/// 불변 역할/권한 레지스트리.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    definitions: HashMap<Role, RoleDefinition>,
    scopes: HashMap<(Role, Permission), ScopeKind>,
    override_scope: ScopeKind,
    default_role: Role,
}

impl RoleRegistry {
    /// 정의와 규칙으로 레지스트리 생성.
    ///
    /// 같은 역할의 중복 정의, 부여되지 않은 권한에 대한 규칙은 거부됩니다.
    pub fn new(
        definitions: impl IntoIterator<Item = RoleDefinition>,
        rules: impl IntoIterator<Item = ScopeRule>,
        override_scope: ScopeKind,
        default_role: Role,
    ) -> Result<Self, RegistryError> {
        let mut by_role = HashMap::new();
        for definition in definitions {
            let role = definition.role;
            if by_role.insert(role, definition).is_some() {
                return Err(RegistryError::DuplicateRole(role));
            }
        }

        let mut scopes = HashMap::new();
        for rule in rules {
            let granted = by_role
                .get(&rule.role)
                .is_some_and(|d: &RoleDefinition| d.permissions.contains(&rule.permission));
            if !granted {
                return Err(RegistryError::UngrantedScopeRule {
                    role: rule.role,
                    permission: rule.permission,
                });
            }
            scopes.insert((rule.role, rule.permission), rule.scope);
        }

        if !by_role.contains_key(&default_role) {
            return Err(RegistryError::UndefinedDefaultRole(default_role));
        }

        Ok(Self {
            definitions: by_role,
            scopes,
            override_scope,
            default_role,
        })
    }

    /// 내장 역할 정의와 스코프 규칙.
    pub fn builtin() -> Self {
        let definitions = builtin_definitions();
        let rules = builtin_scope_rules();
        Self {
            definitions: definitions.into_iter().map(|d| (d.role, d)).collect(),
            scopes: rules
                .into_iter()
                .map(|r| ((r.role, r.permission), r.scope))
                .collect(),
            override_scope: ScopeKind::Assigned,
            default_role: Role::Developer,
        }
    }

    /// 인증 설정에서 생성.
    ///
    /// `roles`/`scope_rules`가 없으면 내장 정의를 사용합니다.
    /// 식별자는 모두 시작 시점에 검증됩니다.
    pub fn from_config(config: &AuthConfig) -> Result<Self, RegistryError> {
        let definitions = match &config.roles {
            Some(roles) => roles
                .iter()
                .map(parse_role_config)
                .collect::<Result<Vec<_>, _>>()?,
            None => builtin_definitions(),
        };

        let rules = match &config.scope_rules {
            Some(rules) => rules
                .iter()
                .map(parse_scope_rule)
                .collect::<Result<Vec<_>, _>>()?,
            None if config.roles.is_none() => builtin_scope_rules(),
            // 역할을 직접 정의했다면 내장 규칙은 맞지 않을 수 있으므로 전역으로 둔다
            None => Vec::new(),
        };

        let override_scope = ScopeKind::parse(&config.override_scope)
            .ok_or_else(|| RegistryError::UnknownScope(config.override_scope.clone()))?;
        let default_role = Role::parse(&config.default_role)
            .ok_or_else(|| RegistryError::UnknownRole(config.default_role.clone()))?;

        Self::new(definitions, rules, override_scope, default_role)
    }

    /// 가입 시 부여되는 기본 역할.
    pub fn default_role(&self) -> Role {
        self.default_role
    }

    /// 직접 부여된 권한에 적용되는 스코프.
    pub fn override_scope(&self) -> ScopeKind {
        self.override_scope
    }

    pub fn definition(&self, role: Role) -> Option<&RoleDefinition> {
        self.definitions.get(&role)
    }

    /// 정의된 역할 수.
    pub fn role_count(&self) -> usize {
        self.definitions.len()
    }

    /// 역할 우선순위. 정의되지 않은 역할은 0.
    pub fn rank(&self, role: Role) -> u8 {
        self.definitions.get(&role).map(|d| d.rank).unwrap_or(0)
    }

    /// 역할 집합의 최고 우선순위.
    pub fn highest_rank<'a>(&self, roles: impl IntoIterator<Item = &'a Role>) -> u8 {
        roles.into_iter().map(|r| self.rank(*r)).max().unwrap_or(0)
    }

    /// 역할 집합이 가진 권한의 합집합.
    pub fn permissions_for<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a Role>,
    ) -> BTreeSet<Permission> {
        roles
            .into_iter()
            .filter_map(|role| self.definitions.get(role))
            .flat_map(|d| d.permissions.iter().copied())
            .collect()
    }

    /// 역할 하나가 권한을 부여하는지 확인.
    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        self.definitions
            .get(&role)
            .is_some_and(|d| d.permissions.contains(&permission))
    }

    /// 역할 하나가 권한을 부여할 때의 스코프.
    pub fn role_scope(&self, role: Role, permission: Permission) -> Option<ScopeKind> {
        if !self.grants(role, permission) {
            return None;
        }
        Some(
            self.scopes
                .get(&(role, permission))
                .copied()
                .unwrap_or(ScopeKind::Global),
        )
    }

    /// 주체가 권한을 가지는지 확인 (타입 수준).
    pub fn has_permission(&self, principal: &Principal, permission: Permission) -> bool {
        self.scope_for(principal, permission).is_some()
    }

    /// 주체에게 적용되는 권한 스코프.
    ///
    /// 여러 역할이 같은 권한을 부여하면 가장 넓은 스코프가 적용됩니다.
    /// 권한이 없으면 `None`.
    pub fn scope_for(&self, principal: &Principal, permission: Permission) -> Option<ScopeKind> {
        let from_roles = principal
            .roles
            .iter()
            .filter_map(|role| self.role_scope(*role, permission))
            .max();
        let from_override = principal
            .overrides
            .contains(&permission)
            .then_some(self.override_scope);

        from_roles.max(from_override)
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn parse_role_config(config: &RoleConfig) -> Result<RoleDefinition, RegistryError> {
    let role =
        Role::parse(&config.name).ok_or_else(|| RegistryError::UnknownRole(config.name.clone()))?;
    let permissions = config
        .permissions
        .iter()
        .map(|p| Permission::parse(p).ok_or_else(|| RegistryError::UnknownPermission(p.clone())))
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(RoleDefinition {
        role,
        rank: config.rank,
        permissions,
    })
}

fn parse_scope_rule(config: &ScopeRuleConfig) -> Result<ScopeRule, RegistryError> {
    let role =
        Role::parse(&config.role).ok_or_else(|| RegistryError::UnknownRole(config.role.clone()))?;
    let permission = Permission::parse(&config.permission)
        .ok_or_else(|| RegistryError::UnknownPermission(config.permission.clone()))?;
    let scope = ScopeKind::parse(&config.scope)
        .ok_or_else(|| RegistryError::UnknownScope(config.scope.clone()))?;

    Ok(ScopeRule::new(role, permission, scope))
}

// ==================== 내장 정의 ====================

fn builtin_definitions() -> Vec<RoleDefinition> {
    use Permission::*;

    let work_items = [
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
    ];

    vec![
        RoleDefinition::new(Role::Admin, Role::Admin.default_rank(), Permission::ALL),
        RoleDefinition::new(
            Role::Manager,
            Role::Manager.default_rank(),
            work_items.into_iter().chain([ViewUsers]),
        ),
        RoleDefinition::new(
            Role::Developer,
            Role::Developer.default_rank(),
            [
                ViewProject,
                ViewEpic,
                ViewStory,
                CreateStory,
                EditStory,
                ViewTask,
                CreateTask,
                EditTask,
                ViewUsers,
            ],
        ),
        RoleDefinition::new(
            Role::Viewer,
            Role::Viewer.default_rank(),
            [ViewProject, ViewEpic, ViewStory, ViewTask],
        ),
    ]
}

fn builtin_scope_rules() -> Vec<ScopeRule> {
    use Permission::*;
    use ScopeKind::*;

    let mut rules = vec![
        ScopeRule::new(Role::Manager, EditProject, Team),
        ScopeRule::new(Role::Manager, DeleteProject, Team),
        ScopeRule::new(Role::Developer, EditStory, Assigned),
        ScopeRule::new(Role::Developer, EditTask, Assigned),
    ];
    for permission in [ViewProject, ViewEpic, ViewStory, ViewTask] {
        rules.push(ScopeRule::new(Role::Developer, permission, Team));
        rules.push(ScopeRule::new(Role::Viewer, permission, Team));
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::UserId;
    use proptest::prelude::*;

    fn principal(roles: &[Role], overrides: &[Permission]) -> Principal {
        Principal {
            user_id: UserId::new(),
            email: "p@x.com".to_string(),
            roles: roles.iter().copied().collect(),
            overrides: overrides.iter().copied().collect(),
            permissions: BTreeSet::new(),
            team_id: None,
            is_verified: true,
        }
    }

    fn developer_only_config() -> AuthConfig {
        AuthConfig {
            roles: Some(vec![RoleConfig {
                name: "developer".to_string(),
                rank: 50,
                permissions: vec!["view_project".to_string(), "create_story".to_string()],
            }]),
            ..AuthConfig::with_secret("test-secret-key-for-jwt-testing-minimum-32-chars")
        }
    }

    #[test]
    fn test_permissions_for_is_exact_union() {
        let registry = RoleRegistry::from_config(&developer_only_config()).unwrap();
        let perms = registry.permissions_for(&[Role::Developer]);

        let expected: BTreeSet<_> = [Permission::ViewProject, Permission::CreateStory].into();
        assert_eq!(perms, expected);

        // 정의되지 않은 역할은 아무것도 부여하지 않음
        assert!(registry.permissions_for(&[Role::Manager]).is_empty());
    }

    #[test]
    fn test_admin_has_every_permission_globally() {
        let registry = RoleRegistry::builtin();
        let admin = principal(&[Role::Admin], &[]);

        for permission in Permission::ALL {
            assert_eq!(registry.scope_for(&admin, permission), Some(ScopeKind::Global));
        }
    }

    #[test]
    fn test_builtin_developer_scopes() {
        let registry = RoleRegistry::builtin();
        let dev = principal(&[Role::Developer], &[]);

        assert_eq!(
            registry.scope_for(&dev, Permission::EditStory),
            Some(ScopeKind::Assigned)
        );
        assert_eq!(
            registry.scope_for(&dev, Permission::ViewProject),
            Some(ScopeKind::Team)
        );
        assert_eq!(
            registry.scope_for(&dev, Permission::CreateTask),
            Some(ScopeKind::Global)
        );
        assert_eq!(registry.scope_for(&dev, Permission::DeleteStory), None);
        assert!(!registry.has_permission(&dev, Permission::ManageUsers));
    }

    #[test]
    fn test_broadest_scope_wins() {
        let registry = RoleRegistry::builtin();
        let both = principal(&[Role::Developer, Role::Manager], &[]);

        // developer: assigned, manager: global
        assert_eq!(
            registry.scope_for(&both, Permission::EditStory),
            Some(ScopeKind::Global)
        );
    }

    #[test]
    fn test_override_uses_override_scope() {
        let registry = RoleRegistry::builtin();
        let viewer = principal(&[Role::Viewer], &[Permission::EditTask]);

        assert_eq!(
            registry.scope_for(&viewer, Permission::EditTask),
            Some(ScopeKind::Assigned)
        );
        assert_eq!(registry.scope_for(&viewer, Permission::DeleteTask), None);
    }

    #[test]
    fn test_from_config_rejects_unknown_identifiers() {
        let mut config = developer_only_config();
        if let Some(roles) = config.roles.as_mut() {
            roles[0].permissions.push("launch_rocket".to_string());
        }
        assert_eq!(
            RoleRegistry::from_config(&config).unwrap_err(),
            RegistryError::UnknownPermission("launch_rocket".to_string())
        );

        let config = AuthConfig {
            default_role: "superuser".to_string(),
            ..AuthConfig::with_secret("test-secret-key-for-jwt-testing-minimum-32-chars")
        };
        assert_eq!(
            RoleRegistry::from_config(&config).unwrap_err(),
            RegistryError::UnknownRole("superuser".to_string())
        );

        let config = AuthConfig {
            override_scope: "galaxy".to_string(),
            ..AuthConfig::with_secret("test-secret-key-for-jwt-testing-minimum-32-chars")
        };
        assert!(matches!(
            RoleRegistry::from_config(&config),
            Err(RegistryError::UnknownScope(_))
        ));
    }

    #[test]
    fn test_scope_rule_for_ungranted_permission_rejected() {
        let result = RoleRegistry::new(
            [RoleDefinition::new(Role::Viewer, 10, [Permission::ViewTask])],
            [ScopeRule::new(Role::Viewer, Permission::EditTask, ScopeKind::Team)],
            ScopeKind::Assigned,
            Role::Viewer,
        );
        assert!(matches!(
            result,
            Err(RegistryError::UngrantedScopeRule { .. })
        ));
    }

    #[test]
    fn test_default_role_must_be_defined() {
        let config = AuthConfig {
            default_role: "viewer".to_string(),
            ..developer_only_config()
        };
        assert_eq!(
            RoleRegistry::from_config(&config).unwrap_err(),
            RegistryError::UndefinedDefaultRole(Role::Viewer)
        );
    }

    #[test]
    fn test_from_default_config_matches_builtin() {
        let config = AuthConfig::with_secret("test-secret-key-for-jwt-testing-minimum-32-chars");
        let registry = RoleRegistry::from_config(&config).unwrap();
        let builtin = RoleRegistry::builtin();

        for role in Role::ALL {
            assert_eq!(registry.definition(role), builtin.definition(role));
            for permission in Permission::ALL {
                assert_eq!(
                    registry.role_scope(role, permission),
                    builtin.role_scope(role, permission)
                );
            }
        }
        assert_eq!(registry.default_role(), Role::Developer);
    }

    #[test]
    fn test_rank() {
        let registry = RoleRegistry::builtin();
        assert_eq!(registry.rank(Role::Admin), 100);
        assert_eq!(registry.highest_rank(&[Role::Viewer, Role::Manager]), 75);
        assert_eq!(registry.highest_rank(&[] as &[Role]), 0);
    }

    proptest! {
        #[test]
        fn prop_permissions_for_is_union_of_role_grants(mask in 0u8..16) {
            let registry = RoleRegistry::builtin();
            let roles: Vec<Role> = Role::ALL
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, r)| r)
                .collect();

            let union = registry.permissions_for(&roles);
            for permission in Permission::ALL {
                let granted = roles.iter().any(|r| registry.grants(*r, permission));
                prop_assert_eq!(union.contains(&permission), granted);
            }
        }
    }
}
