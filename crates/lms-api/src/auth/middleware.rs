//! Axum용 Bearer 토큰 인증.
//!
//! `Authorization` 헤더에서 토큰을 추출해 Access 토큰으로 검증하고 주체를 해석합니다.
//! 실패 원인은 로그에만 남기며 클라이언트에는 항상 동일한 401 응답을 반환합니다.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use lms_core::Principal;
use std::sync::Arc;
use tracing::debug;

use super::jwt::{TokenService, TokenType};
use crate::error::ApiError;

/// 인증 실패.
///
/// 원인을 구분하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("인증이 필요합니다")]
pub struct Unauthenticated;

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        ApiError::Unauthenticated.into_response()
    }
}

/// 대소문자 구분 없이 `Bearer ` 접두사를 제거합니다.
///
/// 접두사가 없으면 헤더 값 전체를 토큰으로 취급합니다.
pub fn strip_bearer(header_value: &str) -> &str {
    let value = header_value.trim();
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim_start(),
        _ => value,
    }
}

/// 요청 단위 인증 게이트.
#[derive(Debug, Clone)]
pub struct AuthGate {
    tokens: Arc<TokenService>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// `Authorization` 헤더 값을 검증해 주체를 반환합니다.
    pub async fn authenticate(&self, header_value: &str) -> Result<Principal, Unauthenticated> {
        let token = strip_bearer(header_value);
        if token.is_empty() {
            debug!("Empty bearer token");
            return Err(Unauthenticated);
        }

        self.tokens
            .verify(token, TokenType::Access)
            .await
            .map_err(|reason| {
                debug!(?reason, "Bearer authentication failed");
                Unauthenticated
            })
    }
}

/// 인증된 사용자 추출기.
///
/// ```rust,ignore
/// async fn me(AuthUser(principal): AuthUser) -> Json<Principal> {
///     Json(principal)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    AuthGate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Unauthenticated;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                debug!("Missing or non-ASCII Authorization header");
                Unauthenticated
            })?;

        let gate = AuthGate::from_ref(state);
        gate.authenticate(header_value).await.map(AuthUser)
    }
}
