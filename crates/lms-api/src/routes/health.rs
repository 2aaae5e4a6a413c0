//! 헬스 체크 endpoint.
//!
//! 요청 제한 대상이 아니므로 로드밸런서가 자유롭게 호출할 수 있습니다.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy"
    pub status: String,
    /// API 버전
    pub version: String,
    /// 서버 업타임(초)
    pub uptime_secs: i64,
    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
    /// 토큰 서명 알고리즘 ("RS256" | "HS256")
    pub signing_algorithm: String,
    /// 요청 제한 윈도우를 보유한 클라이언트 수
    pub tracked_clients: usize,
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 상세 헬스 체크.
///
/// GET /health/ready
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        signing_algorithm: state.tokens.algorithm().to_string(),
        tracked_clients: state.limiter.tracked_clients().await,
    };

    Json(response)
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
