//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭, 인증/인가 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # 반환값
///
/// `/metrics` 엔드포인트에서 메트릭을 렌더링하기 위한 `PrometheusHandle`.
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        // HTTP 요청 지속 시간 히스토그램 버킷 설정
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        // 비밀번호 해싱은 의도적으로 느림
        .set_buckets_for_metric(
            Matcher::Full("auth_password_hash_seconds".to_string()),
            &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 인증/인가 메트릭 헬퍼 함수
// ============================================================================

/// 인증 작업 결과 카운터 증가 (register, login, refresh, logout ...).
pub fn record_auth_operation(operation: &'static str, outcome: &'static str) {
    counter!(
        "auth_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// 인가 결정 카운터 증가.
pub fn record_authz_decision(permission: &'static str, verdict: &'static str) {
    counter!(
        "authz_decisions_total",
        "permission" => permission,
        "verdict" => verdict
    )
    .increment(1);
}

/// 비밀번호 해싱/검증 소요 시간 기록.
pub fn record_password_hash_duration(duration_secs: f64) {
    histogram!("auth_password_hash_seconds").record(duration_secs);
}

/// 감사 이벤트 처리 결과 카운터 증가 (recorded, dropped, failed).
pub fn record_audit_event(outcome: &'static str) {
    counter!("audit_events_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 예: `/users/123e4567-e89b-12d3-a456-426614174000` → `/users/:id`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            // UUID 패턴 또는 숫자만 있는 경우 :id로 대체
            let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());

            if is_uuid || is_numeric {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
