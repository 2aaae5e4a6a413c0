//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크
//! - `/api/v2/auth/mobile/sign-in` - 로그인
//! - `/api/v2/auth/mobile/token-refresh` - Access 토큰 재발급
//! - `/api/v2/me` - 현재 사용자
//!
//! `/api/v2` 아래의 모든 요청은 클라이언트별 요청 제한을 거칩니다.

pub mod auth;
pub mod health;
pub mod users;

pub use auth::{
    auth_router, sign_in, token_refresh, SignInRequest, TokenRefreshRequest, TokenRefreshResponse,
};
pub use health::{health_check, health_ready, health_router, HealthResponse};
pub use users::{me, users_router};

use axum::{middleware, Router};
use std::sync::Arc;

use crate::middleware::rate_limit_middleware;
use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router(state: Arc<AppState>) -> Router {
    let api_v2 = Router::new()
        .nest("/auth", auth_router())
        .merge(users_router())
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .nest("/health", health_router())
        .nest("/api/v2", api_v2)
        .with_state(state)
}
