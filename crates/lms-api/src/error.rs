//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트는 동일한 형식으로 에러를 반환합니다:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "RATE_LIMITED",
//!     "message": "요청이 너무 많습니다",
//!     "retry_after": 42
//!   }
//! }
//! ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// 에러 응답 본문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "UNAUTHENTICATED", "RATE_LIMITED")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 재시도까지 대기 시간 (초, 요청 제한 시에만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retry_after: None,
        }
    }
}

/// `{"error": {...}}` 래퍼.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiErrorResponse,
}

/// 핸들러 에러.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("아이디 또는 비밀번호가 올바르지 않습니다")]
    InvalidCredentials,
    #[error("인증이 필요합니다")]
    Unauthenticated,
    #[error("요청이 너무 많습니다. 잠시 후 다시 시도하세요")]
    RateLimited { retry_after: u64 },
    #[error("잘못된 요청: {0}")]
    BadRequest(String),
    #[error("내부 서버 오류")]
    Internal,
}

impl ApiError {
    /// HTTP 상태 코드와 에러 코드.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let mut body = ApiErrorResponse::new(code, self.to_string());

        if let ApiError::RateLimited { retry_after } = self {
            body.retry_after = Some(retry_after);
        }
        let retry_after = body.retry_after;

        let mut response = (status, Json(ErrorEnvelope { error: body })).into_response();

        match (status, retry_after) {
            (StatusCode::TOO_MANY_REQUESTS, Some(secs)) => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
            (StatusCode::UNAUTHORIZED, _) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }

        response
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;
