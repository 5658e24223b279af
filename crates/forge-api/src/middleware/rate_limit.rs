//! 인증 엔드포인트용 Rate limiting 미들웨어.
//!
//! 클라이언트 IP별 Token Bucket으로 로그인/가입 등에 대한
//! 무차별 대입(brute-force) 시도를 제한합니다.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use forge_core::RateLimitSettings;
use metrics::counter;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ApiErrorResponse;

/// Rate Limiter 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// 버스트 허용량 (순간적으로 허용되는 추가 요청)
    pub burst_size: u32,
    /// 유휴 버킷 정리 기준
    pub idle_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_size: 10,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    /// 버스트 없는 설정.
    pub fn strict(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_size: 0,
            ..Default::default()
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            requests_per_minute: settings.requests_per_minute,
            burst_size: settings.burst_size,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    /// 초당 리필 토큰 수
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        let refill_rate = config.requests_per_minute as f64 / 60.0;
        let max_tokens = refill_rate + config.burst_size as f64;

        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// 다음 토큰까지 대기 시간 (초).
    fn retry_after_secs(&self) -> u64 {
        if self.tokens >= 1.0 || self.refill_rate <= 0.0 {
            return 1;
        }
        ((1.0 - self.tokens) / self.refill_rate).ceil().max(1.0) as u64
    }
}

/// Rate Limit 확인 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited {
        /// 재시도까지 대기 시간 (초)
        retry_after: u64,
    },
}

/// IP별 Rate Limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 요청 허용 여부 확인.
    pub async fn check(&self, ip: IpAddr) -> RateLimitResult {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(&self.config));

        if bucket.try_acquire() {
            RateLimitResult::Allowed
        } else {
            RateLimitResult::Limited {
                retry_after: bucket.retry_after_secs(),
            }
        }
    }

    /// 유휴 버킷 정리. 정리된 수를 반환.
    pub async fn cleanup(&self) -> usize {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        let idle = self.config.idle_timeout;
        buckets.retain(|_, bucket| bucket.last_refill.elapsed() < idle);
        before - buckets.len()
    }

    /// 현재 추적 중인 IP 수.
    pub async fn tracked_ips(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// 주기적으로 유휴 버킷을 정리하는 백그라운드 태스크 시작.
    pub fn spawn_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup().await;
                if removed > 0 {
                    debug!(removed, "Rate limit buckets cleaned up");
                }
            }
        })
    }
}

/// Rate Limiting 미들웨어.
///
/// ```rust,ignore
/// let limiter = RateLimiter::new(RateLimitConfig::from(&config.rate_limit));
/// let auth_routes = auth_router()
///     .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
/// ```
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request);

    match limiter.check(ip).await {
        RateLimitResult::Allowed => {
            counter!("rate_limit_requests_total", "status" => "allowed").increment(1);
            next.run(request).await
        }
        RateLimitResult::Limited { retry_after } => {
            counter!("rate_limit_requests_total", "status" => "limited").increment(1);
            warn!(
                client_ip = %ip,
                path = %request.uri().path(),
                retry_after,
                "Rate limit exceeded"
            );

            let body = ApiErrorResponse::new(
                "RATE_LIMITED",
                "요청이 너무 많습니다. 잠시 후 다시 시도하세요",
            );
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

/// 요청에서 클라이언트 IP 추출.
///
/// X-Forwarded-For, X-Real-IP 헤더를 우선 확인하고 없으면 연결 정보를 사용합니다.
fn extract_client_ip(request: &Request) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
