//! 인가 결정 엔진.
//!
//! 주체의 유효 권한과 스코프 규칙, 리소스 소유/배정 정보로
//! 허용/거부를 결정합니다. 기본값은 거부입니다.

use std::sync::Arc;

use forge_core::{AuditEvent, AuditVerdict, ResourceFacts, ResourceFactsProvider, ResourceRef, ResourceType};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AuditRecorder, AuthError, Permission, Principal, RoleRegistry, ScopeKind};
use crate::metrics;

/// 거부 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// 역할과 직접 부여 어디에도 권한이 없음
    MissingPermission,
    /// 권한은 있으나 인스턴스가 스코프 밖
    OutOfScope,
    /// 대상 인스턴스가 없음
    ResourceNotFound,
    /// 소유/배정 정보 조회 실패
    FactsUnavailable,
    /// 권한과 리소스 타입이 맞지 않음
    ResourceTypeMismatch,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingPermission => "missing_permission",
            DenyReason::OutOfScope => "out_of_scope",
            DenyReason::ResourceNotFound => "resource_not_found",
            DenyReason::FactsUnavailable => "facts_unavailable",
            DenyReason::ResourceTypeMismatch => "resource_type_mismatch",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 인가 결정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }
}

/// 스코프가 리소스 인스턴스를 포함하는지 확인.
pub fn scope_permits(scope: ScopeKind, principal: &Principal, facts: &ResourceFacts) -> bool {
    match scope {
        ScopeKind::Global => true,
        ScopeKind::Team => {
            facts.involves(principal.user_id) || facts.belongs_to_team(principal.team_id)
        }
        ScopeKind::Assigned => facts.involves(principal.user_id),
    }
}

/// 인가 결정 엔진.
///
/// 모든 결정은 감사 기록기로 전달됩니다.
#[derive(Clone)]
pub struct Authorizer {
    registry: Arc<RoleRegistry>,
    facts: Arc<dyn ResourceFactsProvider>,
    audit: AuditRecorder,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer").finish_non_exhaustive()
    }
}

impl Authorizer {
    pub fn new(
        registry: Arc<RoleRegistry>,
        facts: Arc<dyn ResourceFactsProvider>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            registry,
            facts,
            audit,
        }
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    /// 인가 결정.
    ///
    /// # Arguments
    ///
    /// * `principal` - 인증된 주체
    /// * `permission` - 필요한 권한
    /// * `resource_type` - 대상 리소스 타입
    /// * `resource_id` - 대상 인스턴스 (없으면 타입 수준 검사)
    pub async fn authorize(
        &self,
        principal: &Principal,
        permission: Permission,
        resource_type: ResourceType,
        resource_id: Option<Uuid>,
    ) -> Decision {
        let decision = self
            .decide(principal, permission, resource_type, resource_id)
            .await;

        let resource = ResourceRef::new(resource_type, resource_id);
        let mut event = AuditEvent::new(
            Some(principal.user_id),
            permission.as_str(),
            if decision.is_allowed() {
                AuditVerdict::Allow
            } else {
                AuditVerdict::Deny
            },
        )
        .with_resource(resource.to_string());
        if let Some(reason) = decision.deny_reason() {
            event = event.with_reason(reason.as_str());
        }
        self.audit.record(event);

        metrics::record_authz_decision(
            permission.as_str(),
            if decision.is_allowed() { "allow" } else { "deny" },
        );
        debug!(
            user_id = %principal.user_id,
            permission = %permission,
            resource = %resource,
            decision = ?decision,
            "Authorization decided"
        );

        decision
    }

    /// 인가 결정 후 거부를 `PermissionDenied`로 변환.
    pub async fn require(
        &self,
        principal: &Principal,
        permission: Permission,
        resource_type: ResourceType,
        resource_id: Option<Uuid>,
    ) -> Result<(), AuthError> {
        match self
            .authorize(principal, permission, resource_type, resource_id)
            .await
        {
            Decision::Allow => Ok(()),
            Decision::Deny(_) => Err(AuthError::PermissionDenied {
                action: permission.as_str().to_string(),
                resource: ResourceRef::new(resource_type, resource_id).to_string(),
            }),
        }
    }

    async fn decide(
        &self,
        principal: &Principal,
        permission: Permission,
        resource_type: ResourceType,
        resource_id: Option<Uuid>,
    ) -> Decision {
        if permission.resource_type() != resource_type {
            return Decision::Deny(DenyReason::ResourceTypeMismatch);
        }

        let Some(scope) = self.registry.scope_for(principal, permission) else {
            return Decision::Deny(DenyReason::MissingPermission);
        };

        // 타입 수준 검사이거나 전역 스코프면 인스턴스 정보가 필요 없음
        let Some(resource_id) = resource_id else {
            return Decision::Allow;
        };
        if !scope.is_instance_level() {
            return Decision::Allow;
        }

        match self.facts.facts(resource_type, resource_id).await {
            Ok(Some(facts)) => {
                if scope_permits(scope, principal, &facts) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::OutOfScope)
                }
            }
            Ok(None) => Decision::Deny(DenyReason::ResourceNotFound),
            Err(e) => {
                warn!(
                    error = %e,
                    resource_type = %resource_type,
                    resource_id = %resource_id,
                    "Resource facts lookup failed, denying"
                );
                Decision::Deny(DenyReason::FactsUnavailable)
            }
        }
    }
}
