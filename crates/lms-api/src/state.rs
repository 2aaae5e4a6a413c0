//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! `Arc<AppState>`로 라우터에 주입됩니다.

use axum::extract::FromRef;
use lms_core::AppConfig;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthGate, KeyError, KeyMaterialProvider, TokenService};
use crate::middleware::{RateLimitConfig, RateLimiter};
use crate::repository::{InMemoryUserStore, UserStore};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 토큰 발급/검증
    pub tokens: Arc<TokenService>,

    /// 사용자 저장소 - 로그인 자격증명 확인
    pub users: Arc<dyn UserStore>,

    /// Bearer 토큰 인증 게이트
    pub gate: AuthGate,

    /// 클라이언트별 요청 제한
    pub limiter: RateLimiter,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    pub fn new(tokens: Arc<TokenService>, users: Arc<dyn UserStore>, limiter: RateLimiter) -> Self {
        Self {
            gate: AuthGate::new(tokens.clone()),
            tokens,
            users,
            limiter,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 설정으로부터 상태를 구성합니다.
    ///
    /// 키 자료를 해석하고 설정의 사용자 목록으로 인메모리 저장소를 초기화합니다.
    /// 사용할 수 있는 키가 전혀 없으면 에러.
    pub fn from_config(config: &AppConfig) -> Result<Self, KeyError> {
        let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::from_seed(&config.users));
        info!(count = config.users.len(), "User store seeded");

        let material = KeyMaterialProvider::from_config(&config.auth).resolve();
        let tokens = TokenService::new(&material, users.clone())?.with_ttl(
            config.auth.access_token_ttl_secs,
            config.auth.refresh_token_ttl_secs,
        );
        info!(algorithm = %tokens.algorithm(), "Token service initialized");

        let limiter = RateLimiter::new(RateLimitConfig::from(&config.throttle));
        info!(
            rate = config.throttle.rate,
            duration_secs = config.throttle.duration_secs,
            "Rate limiting configured"
        );

        Ok(Self::new(Arc::new(tokens), users, limiter))
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

impl FromRef<Arc<AppState>> for AuthGate {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.gate.clone()
    }
}
