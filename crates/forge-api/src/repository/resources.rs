//! 리소스 소유/배정 정보 Repository (Postgres).
//!
//! 리소스 타입별 테이블과 컬럼을 매핑 테이블로 정의하여
//! 새 리소스 타입이 추가되어도 조회 로직은 바뀌지 않습니다.

use std::collections::HashMap;

use async_trait::async_trait;
use forge_core::{ResourceFacts, ResourceFactsProvider, ResourceType, StoreError, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use super::users::map_sqlx_error;

/// 리소스 타입별 조회 위치.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactsSource {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub assignee_column: Option<&'static str>,
    pub team_column: Option<&'static str>,
}

impl FactsSource {
    fn query(&self) -> String {
        format!(
            "SELECT {} AS owner_id, {} AS assignee_id, {} AS team_id FROM {} WHERE id = $1",
            self.owner_column,
            self.assignee_column.unwrap_or("NULL::uuid"),
            self.team_column.unwrap_or("NULL::uuid"),
            self.table
        )
    }
}

/// 기본 매핑.
fn default_sources() -> HashMap<ResourceType, FactsSource> {
    HashMap::from([
        (
            ResourceType::Project,
            FactsSource {
                table: "projects",
                owner_column: "owner_id",
                assignee_column: None,
                team_column: Some("team_id"),
            },
        ),
        (
            ResourceType::Epic,
            FactsSource {
                table: "epics",
                owner_column: "created_by",
                assignee_column: None,
                team_column: Some("team_id"),
            },
        ),
        (
            ResourceType::Story,
            FactsSource {
                table: "stories",
                owner_column: "created_by",
                assignee_column: Some("assignee_id"),
                team_column: Some("team_id"),
            },
        ),
        (
            ResourceType::Task,
            FactsSource {
                table: "tasks",
                owner_column: "created_by",
                assignee_column: Some("assignee_id"),
                team_column: Some("team_id"),
            },
        ),
        (
            ResourceType::User,
            FactsSource {
                table: "users",
                owner_column: "id",
                assignee_column: None,
                team_column: Some("team_id"),
            },
        ),
    ])
}

/// Postgres 리소스 정보 제공자.
#[derive(Debug, Clone)]
pub struct PgResourceFacts {
    pool: PgPool,
    sources: HashMap<ResourceType, FactsSource>,
}

impl PgResourceFacts {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            sources: default_sources(),
        }
    }

    /// 리소스 타입의 조회 위치 교체.
    pub fn with_source(mut self, resource_type: ResourceType, source: FactsSource) -> Self {
        self.sources.insert(resource_type, source);
        self
    }

    pub fn source(&self, resource_type: ResourceType) -> Option<&FactsSource> {
        self.sources.get(&resource_type)
    }
}

#[async_trait]
impl ResourceFactsProvider for PgResourceFacts {
    async fn facts(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Option<ResourceFacts>, StoreError> {
        // 매핑이 없는 타입은 인스턴스가 없는 것으로 취급
        let Some(source) = self.sources.get(&resource_type) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, (Option<Uuid>, Option<Uuid>, Option<Uuid>)>(&source.query())
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|(owner, assignee, team)| ResourceFacts {
            owner_id: owner.map(UserId),
            assignee_ids: assignee.map(UserId).into_iter().collect(),
            team_id: team,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_fills_missing_columns_with_null() {
        let sources = default_sources();
        let project = sources[&ResourceType::Project].query();
        assert_eq!(
            project,
            "SELECT owner_id AS owner_id, NULL::uuid AS assignee_id, team_id AS team_id FROM projects WHERE id = $1"
        );

        let story = sources[&ResourceType::Story].query();
        assert!(story.contains("assignee_id AS assignee_id"));
        assert!(story.contains("FROM stories"));
    }

    #[tokio::test]
    async fn test_with_source_overrides_mapping() {
        // 연결 없이 생성되는 lazy pool
        let pool = PgPool::connect_lazy("postgres://localhost/agileforge").unwrap();
        let facts = PgResourceFacts::new(pool).with_source(
            ResourceType::AuditLog,
            FactsSource {
                table: "auth_audit_log",
                owner_column: "principal_id",
                assignee_column: None,
                team_column: None,
            },
        );

        let source = facts.source(ResourceType::AuditLog).unwrap();
        assert_eq!(source.table, "auth_audit_log");
        assert!(source.query().contains("NULL::uuid AS team_id"));
        assert_eq!(facts.source(ResourceType::Task).unwrap().table, "tasks");
    }

    #[test]
    fn test_work_item_types_are_mapped() {
        let sources = default_sources();
        for rt in [
            ResourceType::Project,
            ResourceType::Epic,
            ResourceType::Story,
            ResourceType::Task,
        ] {
            assert!(sources.contains_key(&rt), "{} 매핑 누락", rt);
        }
        assert!(!sources.contains_key(&ResourceType::AuditLog));
    }
}
