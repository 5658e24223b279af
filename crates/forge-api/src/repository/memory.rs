//! 메모리 기반 저장소 어댑터.
//!
//! `DATABASE_URL` 없이 실행하는 개발 환경과 테스트에서 사용합니다.
//! 프로세스 재시작 시 모든 데이터가 사라집니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use forge_core::{
    normalize_email, CredentialStore, NewUser, ResourceFacts, ResourceFactsProvider, ResourceType,
    StoreError, UserId, UserRecord, UserUpdate,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// 메모리 자격증명 저장소.
///
/// 이메일 유일성은 대소문자 구분 없이 검사합니다.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 사용자 수.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let email = normalize_email(&user.email);

        // 검사와 삽입을 같은 쓰기 락 안에서 수행
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let record = UserRecord {
            id: UserId::new(),
            email,
            password_hash: user.password_hash,
            display_name: user.display_name,
            roles: user.roles,
            permission_overrides: Vec::new(),
            is_active: true,
            is_verified: false,
            team_id: user.team_id,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        let record = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        update.apply_to(record);
        Ok(record.clone())
    }
}

/// 메모리 리소스 소유/배정 정보 제공자.
#[derive(Debug, Default)]
pub struct InMemoryResourceFacts {
    facts: RwLock<HashMap<(ResourceType, Uuid), ResourceFacts>>,
}

impl InMemoryResourceFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// 리소스 정보 등록 (기존 값은 대체).
    pub async fn insert(&self, resource_type: ResourceType, resource_id: Uuid, facts: ResourceFacts) {
        self.facts
            .write()
            .await
            .insert((resource_type, resource_id), facts);
    }

    /// 리소스 정보 삭제.
    pub async fn remove(&self, resource_type: ResourceType, resource_id: Uuid) -> bool {
        self.facts
            .write()
            .await
            .remove(&(resource_type, resource_id))
            .is_some()
    }
}

#[async_trait]
impl ResourceFactsProvider for InMemoryResourceFacts {
    async fn facts(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Option<ResourceFacts>, StoreError> {
        Ok(self
            .facts
            .read()
            .await
            .get(&(resource_type, resource_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$v=19$stub".to_string(),
            display_name: None,
            roles: vec!["developer".to_string()],
            team_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryCredentialStore::new();
        let record = store.insert_user(new_user("A@X.com")).await.unwrap();

        assert_eq!(record.email, "a@x.com");
        assert!(record.is_active);
        assert!(!record.is_verified);

        let by_email = store.find_user_by_email(" a@x.COM ").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(record.id));

        let by_id = store.find_user_by_id(record.id).await.unwrap();
        assert_eq!(by_id.map(|u| u.email), Some("a@x.com".to_string()));

        assert!(store.find_user_by_id(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_case_insensitive() {
        let store = InMemoryCredentialStore::new();
        store.insert_user(new_user("a@x.com")).await.unwrap();

        let err = store.insert_user(new_user("A@X.COM")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_user() {
        let store = InMemoryCredentialStore::new();
        let record = store.insert_user(new_user("a@x.com")).await.unwrap();

        let updated = store
            .update_user(record.id, UserUpdate::default().active(false))
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.roles, record.roles);

        let err = store
            .update_user(UserId::new(), UserUpdate::default().verified(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let store = std::sync::Arc::new(InMemoryCredentialStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert_user(new_user("race@x.com")).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_resource_facts() {
        let provider = InMemoryResourceFacts::new();
        let id = Uuid::new_v4();
        let owner = UserId::new();

        assert!(provider.facts(ResourceType::Story, id).await.unwrap().is_none());

        provider
            .insert(
                ResourceType::Story,
                id,
                ResourceFacts {
                    owner_id: Some(owner),
                    ..Default::default()
                },
            )
            .await;

        let facts = provider.facts(ResourceType::Story, id).await.unwrap().unwrap();
        assert!(facts.involves(owner));
        // 같은 ID라도 타입이 다르면 별개
        assert!(provider.facts(ResourceType::Task, id).await.unwrap().is_none());

        assert!(provider.remove(ResourceType::Story, id).await);
        assert!(!provider.remove(ResourceType::Story, id).await);
    }
}
