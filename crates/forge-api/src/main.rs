//! AgileForge 인증 API 서버.
//!
//! 설정을 로드하고 인증 코어를 조립한 뒤 Axum 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use forge_api::metrics::setup_metrics_recorder;
use forge_api::routes::create_router;
use forge_api::state::AppState;
use forge_core::{init_logging, AppConfig, DatabaseConfig, ForgeError, LogConfig};

/// 유휴 Rate limit 버킷 정리 주기.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// CORS 레이어 생성.
///
/// # 환경변수
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
///   예: `https://app.agileforge.dev,https://admin.agileforge.dev`
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 종료합니다.
fn handle_export_openapi() -> anyhow::Result<()> {
    use forge_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
        println!("{}", json);
        std::process::exit(0);
    }

    Ok(())
}

/// 데이터베이스 연결. URL이 없으면 None (메모리 저장소 사용).
async fn connect_database(config: &DatabaseConfig) -> Result<Option<PgPool>, ForgeError> {
    let Some(url) = config.url.as_deref() else {
        warn!("database.url not set, accounts will not survive restarts");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(url)
        .await
        .map_err(|e| ForgeError::Database(e.to_string()))?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|e| ForgeError::Database(e.to_string()))?;
    info!(max_connections = config.max_connections, "Connected to PostgreSQL");
    Ok(Some(pool))
}

/// 전체 라우터에 공통 레이어 적용.
fn with_service_layers(app: Router) -> Router {
    app.layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    handle_export_openapi()?;

    let config = AppConfig::load_default().context("Failed to load configuration")?;
    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting AgileForge auth server...");

    let metrics_handle =
        setup_metrics_recorder().context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = config.bind_address().parse().with_context(|| {
        format!(
            "소켓 주소 설정이 유효하지 않습니다: {} (FORGE__SERVER__HOST, FORGE__SERVER__PORT 확인)",
            config.bind_address()
        )
    })?;

    let pool = connect_database(&config.database).await?;

    let (state, background) = AppState::from_config(&config, pool)?;
    let state = state.with_metrics(metrics_handle);
    info!(
        version = %state.version,
        has_db = state.has_db(),
        rate_limited = state.rate_limiter.is_some(),
        require_verified_login = config.auth.require_verified_login,
        "Application state initialized"
    );

    let shutdown_token = CancellationToken::new();

    let cleanup_task = state.rate_limiter.as_ref().map(|limiter| {
        let handle = limiter.spawn_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);
        let token = shutdown_token.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            handle.abort();
        })
    });

    let app = with_service_layers(create_router(Arc::new(state)));

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();
    if let Some(task) = cleanup_task {
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            warn!("Cleanup timeout, forcing shutdown");
        }
    }

    // 라우터와 상태가 모두 drop된 뒤 남은 감사 이벤트 기록
    if background.shutdown(Duration::from_secs(5)).await {
        info!("Audit events flushed");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
