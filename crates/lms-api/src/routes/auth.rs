//! 모바일 인증 endpoint.
//!
//! - `POST /auth/mobile/sign-in` - 아이디/비밀번호로 토큰 쌍 발급
//! - `POST /auth/mobile/token-refresh` - Refresh 토큰으로 Access 토큰 재발급

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::{JwtError, TokenPair};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 로그인 요청.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// 토큰 재발급 요청.
#[derive(Debug, Deserialize)]
pub struct TokenRefreshRequest {
    pub refresh: String,
}

/// 토큰 재발급 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenRefreshResponse {
    pub access: String,
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// 로그인.
///
/// POST /api/v2/auth/mobile/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<TokenPair>> {
    let request = parse_body(payload)?;

    let user_id = state
        .users
        .verify_credentials(&request.username, &request.password)
        .await
        .map_err(|e| {
            error!(error = %e, "User store unavailable during sign-in");
            ApiError::Internal
        })?
        .ok_or(ApiError::InvalidCredentials)?;

    let pair = state.tokens.issue_pair(user_id).map_err(|e| {
        error!(user_id = %user_id, error = %e, "Failed to issue token pair");
        ApiError::Internal
    })?;

    info!(user_id = %user_id, "User signed in");
    Ok(Json(pair))
}

/// Access 토큰 재발급.
///
/// POST /api/v2/auth/mobile/token-refresh
pub async fn token_refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenRefreshRequest>, JsonRejection>,
) -> ApiResult<Json<TokenRefreshResponse>> {
    let request = parse_body(payload)?;

    match state.tokens.refresh_access(&request.refresh).await {
        Ok(access) => Ok(Json(TokenRefreshResponse { access })),
        Err(JwtError::Rejected(_)) => Err(ApiError::Unauthenticated),
        Err(e) => {
            error!(error = %e, "Failed to refresh access token");
            Err(ApiError::Internal)
        }
    }
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/mobile/sign-in", post(sign_in))
        .route("/mobile/token-refresh", post(token_refresh))
}
