//! SimpleLMS API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - JWT 인증 (RS256 우선, HS256 대체, 다중 후보 검증)
//! - 클라이언트별 슬라이딩 윈도우 요청 제한
//! - 모바일 로그인/토큰 재발급 엔드포인트
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 키 로딩, 토큰 발급/검증, 인증 게이트
//! - [`repository`]: 사용자 저장소
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어 (요청 제한, 메트릭)

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{
    hash_password, verify_password, AuthGate, AuthUser, KeyMaterial, KeyMaterialProvider,
    Rejected, TokenPair, TokenService, TokenType, Unauthenticated,
};
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::{metrics_layer, RateLimitConfig, RateLimiter};
pub use repository::{InMemoryUserStore, UserStore};
pub use routes::create_api_router;
pub use state::AppState;
