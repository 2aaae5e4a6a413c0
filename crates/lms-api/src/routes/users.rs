//! 사용자 endpoint.

use axum::{routing::get, Json, Router};
use lms_core::Principal;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::state::AppState;

/// 현재 인증된 사용자.
///
/// GET /api/v2/me
pub async fn me(AuthUser(principal): AuthUser) -> Json<Principal> {
    Json(principal)
}

/// 사용자 라우터 생성.
pub fn users_router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(me))
}
