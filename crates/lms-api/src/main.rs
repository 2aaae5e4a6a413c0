//! SimpleLMS API 서버.
//!
//! 설정을 읽고 인증/요청 제한 코어를 구성한 뒤 Axum 서버를 시작합니다.
//!
//! ```text
//! lms-api                       # 서버 실행
//! lms-api --hash-password PW    # [[users]] 항목용 Argon2id 해시 출력
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use lms_core::{init_logging, AppConfig, LogConfig, ServerConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use lms_api::auth::hash_password;
use lms_api::metrics::setup_metrics_recorder;
use lms_api::middleware::metrics_layer;
use lms_api::routes::create_api_router;
use lms_api::state::AppState;

/// 설정 파일 경로 환경 변수.
const CONFIG_PATH_ENV: &str = "LMS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// CORS 레이어 생성.
///
/// `server.cors_origins`가 비어 있으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = server
        .cors_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        warn!("No valid CORS origins configured, allowing any origin (development mode)");
        AllowOrigin::any()
    } else {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    server: &ServerConfig,
) -> Router {
    // 메트릭 라우터 (별도 상태, Rate Limit 제외)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router(state))
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout_secs),
        ))
        .layer(cors_layer(server))
}

/// `--hash-password <password>` 처리.
///
/// 해시를 출력했으면 `true`.
fn handle_hash_password() -> Result<bool, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let Some(pos) = args.iter().position(|a| a == "--hash-password") else {
        return Ok(false);
    };

    let password = args
        .get(pos + 1)
        .ok_or("--hash-password requires a password argument")?;
    println!("{}", hash_password(password)?);
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    if handle_hash_password()? {
        return Ok(());
    }

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)?;

    init_logging(LogConfig::from(&config.logging))?;
    info!(config = %config_path, "Starting SimpleLMS API server...");

    config.validate()?;

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    // 사용 가능한 키가 전혀 없으면 여기서 종료
    let state = Arc::new(AppState::from_config(&config)?);
    info!(version = %state.version, "Application state initialized");

    // 전역 종료 토큰 (graceful shutdown용, 백그라운드 태스크에서 사용)
    let shutdown_token = CancellationToken::new();
    let cleanup_handle = state.limiter.spawn_cleanup_task(shutdown_token.clone());

    let app = create_router(state, metrics_handle, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "API server listening");
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

    if tokio::time::timeout(Duration::from_secs(10), cleanup_handle)
        .await
        .is_err()
    {
        warn!("Cleanup timeout, forcing shutdown");
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
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
    info!("Shutdown signal propagated to background tasks");
}
