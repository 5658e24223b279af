//! 세션/감사 기록기.
//!
//! 로그인, 로그아웃, 권한 검사 이벤트를 비동기로 싱크에 전달합니다.
//! 기록은 호출자를 기다리게 하지 않으며, 실패는 경고 로그로만 남습니다.

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{AuditError, AuditEvent, AuditSink};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;

/// 기본 채널 용량.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1024;

/// 감사 이벤트 기록기.
///
/// 제한된 채널로 이벤트를 넘기고 백그라운드 태스크가 싱크에 씁니다.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    sender: mpsc::Sender<AuditEvent>,
}

impl AuditRecorder {
    /// 기록기와 드레인 태스크 생성.
    ///
    /// 모든 기록기 복제본이 drop되면 태스크는 남은 이벤트를 처리한 뒤 종료합니다.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<AuditEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match sink.record(&event).await {
                    Ok(()) => metrics::record_audit_event("recorded"),
                    Err(e) => {
                        metrics::record_audit_event("failed");
                        warn!(
                            error = %e,
                            action = %event.action,
                            verdict = %event.verdict,
                            "Audit sink rejected event"
                        );
                    }
                }
            }
            debug!("Audit recorder drained");
        });

        (Self { sender }, handle)
    }

    /// 이벤트 기록. 절대 대기하거나 실패를 전파하지 않습니다.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.sender.try_send(event) {
            metrics::record_audit_event("dropped");
            match e {
                mpsc::error::TrySendError::Full(event) => warn!(
                    action = %event.action,
                    "Audit channel full, event dropped"
                ),
                mpsc::error::TrySendError::Closed(event) => warn!(
                    action = %event.action,
                    "Audit recorder closed, event dropped"
                ),
            }
        }
    }
}

/// `audit` target으로 구조화 로그를 남기는 싱크.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let principal = event
            .principal_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        info!(
            target: "audit",
            timestamp = %event.timestamp,
            principal_id = %principal,
            action = %event.action,
            resource = event.resource.as_deref().unwrap_or("-"),
            verdict = %event.verdict,
            reason = event.reason.as_deref().unwrap_or("-"),
        );
        Ok(())
    }
}

/// 메모리에 이벤트를 보관하는 싱크 (테스트/개발용).
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록된 이벤트 복사본.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{AuditVerdict, UserId};
    use std::time::Duration;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("sink down".to_string()))
        }
    }

    /// 채널이 비워질 때까지 대기
    async fn drain(recorder: AuditRecorder, handle: JoinHandle<()>) {
        drop(recorder);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_events_reach_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let (recorder, handle) = AuditRecorder::spawn(sink.clone(), 16);
        let user = UserId::new();

        recorder.record(AuditEvent::new(Some(user), "login", AuditVerdict::Success));
        recorder.record(
            AuditEvent::new(Some(user), "edit_story", AuditVerdict::Deny)
                .with_resource("story")
                .with_reason("missing_permission"),
        );
        drain(recorder, handle).await;

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "login");
        assert_eq!(events[1].verdict, AuditVerdict::Deny);
        assert_eq!(events[1].reason.as_deref(), Some("missing_permission"));
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let (recorder, handle) = AuditRecorder::spawn(Arc::new(FailingSink), 4);

        recorder.record(AuditEvent::new(None, "login", AuditVerdict::Failure));
        drain(recorder, handle).await;
    }

    #[tokio::test]
    async fn test_record_after_close_does_not_panic() {
        let sink = Arc::new(MemoryAuditSink::new());
        let (recorder, handle) = AuditRecorder::spawn(sink.clone(), 4);
        handle.abort();
        let _ = handle.await;

        recorder.record(AuditEvent::new(None, "logout", AuditVerdict::Success));
        assert!(sink.is_empty().await);
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        struct SlowSink;

        #[async_trait]
        impl AuditSink for SlowSink {
            async fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            }
        }

        let (recorder, _handle) = AuditRecorder::spawn(Arc::new(SlowSink), 1);
        for _ in 0..100 {
            recorder.record(AuditEvent::new(None, "view_task", AuditVerdict::Allow));
        }
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingAuditSink;
        let event = AuditEvent::new(Some(UserId::new()), "logout", AuditVerdict::Success);
        assert!(sink.record(&event).await.is_ok());
    }
}
