//! 토큰 폐기 목록.
//!
//! 로그아웃, Refresh Token 회전, 일회용 토큰 소비, 비밀번호 변경 후
//! 세션 일괄 종료에 사용됩니다. 항목은 토큰의 원래 만료 시각까지만 유지됩니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

/// 폐기된 토큰 ID(jti) 저장소.
#[async_trait]
pub trait RevocationList: Send + Sync {
    /// 토큰을 폐기합니다. 이번 호출로 새로 폐기되었으면 `true`,
    /// 이미 폐기되었거나 이미 만료된 토큰이면 `false`.
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> bool;

    /// 토큰이 폐기되었는지 확인.
    async fn is_revoked(&self, jti: &str) -> bool;

    /// 사용자에게 발급된 세션 토큰 기록.
    async fn track(&self, subject: &str, jti: &str, expires_at: DateTime<Utc>);

    /// 사용자의 기록된 세션 토큰을 모두 폐기. 폐기된 개수를 반환합니다.
    async fn revoke_subject(&self, subject: &str) -> usize;
}

/// 프로세스 메모리 기반 폐기 목록.
///
/// 단일 프로세스 범위입니다. 여러 인스턴스로 배포할 때는
/// 공유 저장소 기반 구현이 필요합니다.
#[derive(Debug, Default)]
pub struct InMemoryRevocationList {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
    /// subject → (jti → 만료 시각)
    sessions: RwLock<HashMap<String, HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 만료된 항목 제거. 제거된 폐기 항목 개수를 반환합니다.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        {
            let mut sessions = self.sessions.write().await;
            for tokens in sessions.values_mut() {
                tokens.retain(|_, expires_at| *expires_at > now);
            }
            sessions.retain(|_, tokens| !tokens.is_empty());
        }

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    /// 주기적 정리 태스크 시작.
    pub fn spawn_purge(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired(Utc::now()).await;
                if removed > 0 {
                    debug!(removed, "Purged expired revocation entries");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// 기록된 세션 토큰 수.
    pub async fn tracked_sessions(&self) -> usize {
        self.sessions.read().await.values().map(HashMap::len).sum()
    }
}

#[async_trait]
impl RevocationList for InMemoryRevocationList {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> bool {
        // 이미 만료된 토큰은 검증 단계에서 거부되므로 보관하지 않음
        if expires_at <= Utc::now() {
            return false;
        }

        self.entries
            .write()
            .await
            .insert(jti.to_string(), expires_at)
            .is_none()
    }

    async fn is_revoked(&self, jti: &str) -> bool {
        self.entries.read().await.contains_key(jti)
    }

    async fn track(&self, subject: &str, jti: &str, expires_at: DateTime<Utc>) {
        self.sessions
            .write()
            .await
            .entry(subject.to_string())
            .or_default()
            .insert(jti.to_string(), expires_at);
    }

    async fn revoke_subject(&self, subject: &str) -> usize {
        let Some(tokens) = self.sessions.write().await.remove(subject) else {
            return 0;
        };

        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let mut revoked = 0;
        for (jti, expires_at) in tokens {
            if expires_at > now && entries.insert(jti, expires_at).is_none() {
                revoked += 1;
            }
        }
        revoked
    }
}
