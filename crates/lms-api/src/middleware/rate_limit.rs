//! Rate limiting middleware.
//!
//! 클라이언트별 슬라이딩 윈도우 카운터. 최근 `duration` 동안의 요청 시각을 모두
//! 보관하고, 매 요청마다 윈도우 밖의 항목을 제거한 뒤 개수를 다시 셉니다.
//!
//! 윈도우 맵 전체를 하나의 `Mutex`로 보호하므로 같은 클라이언트의 동시 요청이
//! 마지막 남은 한 자리를 동시에 차지할 수 없습니다.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lms_core::ThrottleConfig;
use metrics::counter;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ApiError;

/// 식별할 수 없는 클라이언트의 키.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate Limiter 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 윈도우당 최대 요청 수
    pub rate: usize,
    /// 윈도우 길이
    pub duration: Duration,
    /// 오래된 윈도우 정리 간격
    pub cleanup_interval: Duration,
    /// `X-Forwarded-For` / `X-Real-IP` 헤더 신뢰 여부
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: 10,
            duration: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(300),
            trust_forwarded_headers: false,
        }
    }
}

impl RateLimitConfig {
    pub fn new(rate: usize, duration: Duration) -> Self {
        Self {
            rate,
            duration,
            ..Default::default()
        }
    }
}

impl From<&ThrottleConfig> for RateLimitConfig {
    fn from(config: &ThrottleConfig) -> Self {
        Self {
            rate: config.rate,
            duration: Duration::from_secs(config.duration_secs),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }
}

/// 클라이언트 하나의 요청 시각 목록 (오래된 순).
#[derive(Debug, Default)]
struct ThrottleWindow {
    hits: VecDeque<Instant>,
}

impl ThrottleWindow {
    /// `now - duration` 이전 항목 제거.
    fn prune(&mut self, now: Instant, duration: Duration) {
        while let Some(&oldest) = self.hits.front() {
            if now.duration_since(oldest) >= duration {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// 가장 오래된 요청이 윈도우를 벗어날 때까지 남은 시간.
    fn time_until_slot(&self, now: Instant, duration: Duration) -> Duration {
        self.hits
            .front()
            .map(|&oldest| duration.saturating_sub(now.duration_since(oldest)))
            .unwrap_or_default()
    }
}

/// Rate Limit 확인 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// 요청 허용됨
    Allowed,
    /// Rate limit 초과
    Limited {
        /// 재시도까지 대기 시간 (초)
        retry_after: u64,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }
}

/// Rate Limiter.
///
/// 클라이언트 식별자(기본적으로 원격 주소)별로 요청 수를 제한합니다.
/// 같은 주소 뒤의 여러 사용자는 하나의 한도를 공유합니다.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<String, ThrottleWindow>>>,
}

impl RateLimiter {
    /// 새 Rate Limiter 생성.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 요청 허용 여부 확인.
    ///
    /// 거부된 요청은 윈도우에 기록되지 않습니다.
    pub async fn check(&self, client_id: &str) -> RateLimitResult {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let window = windows.entry(client_id.to_string()).or_default();
        window.prune(now, self.config.duration);

        if window.hits.len() >= self.config.rate {
            let wait = window.time_until_slot(now, self.config.duration);
            let retry_after = wait.as_secs_f64().ceil().max(1.0) as u64;
            return RateLimitResult::Limited { retry_after };
        }

        window.hits.push_back(now);
        RateLimitResult::Allowed
    }

    /// [`check`](Self::check)의 bool 버전.
    pub async fn allow(&self, client_id: &str) -> bool {
        self.check(client_id).await.is_allowed()
    }

    /// 모든 항목이 윈도우를 벗어난 클라이언트를 제거합니다.
    ///
    /// 제거된 클라이언트 수를 반환합니다.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();

        windows.retain(|_, window| {
            window.prune(now, self.config.duration);
            !window.hits.is_empty()
        });

        before - windows.len()
    }

    /// 현재 추적 중인 클라이언트 수 반환.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// `cleanup_interval`마다 [`cleanup`](Self::cleanup)을 실행하는 백그라운드 태스크.
    pub fn spawn_cleanup_task(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        let period = limiter.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // 첫 tick은 즉시 완료
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Rate limiter cleanup task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = limiter.cleanup().await;
                        if removed > 0 {
                            debug!(removed, "Evicted idle rate limit windows");
                        }
                    }
                }
            }
        })
    }
}

/// Rate Limiting 미들웨어 함수.
///
/// 클라이언트별로 요청 수를 제한하고, 초과 시 `Retry-After` 헤더와 함께 429를 반환합니다.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client_id = extract_client_id(&request, limiter.config.trust_forwarded_headers);

    match limiter.check(&client_id).await {
        RateLimitResult::Allowed => {
            counter!("rate_limit_requests_total", "status" => "allowed").increment(1);
            next.run(request).await
        }
        RateLimitResult::Limited { retry_after } => {
            counter!("rate_limit_requests_total", "status" => "limited").increment(1);

            warn!(
                client_ip = %client_id,
                retry_after = retry_after,
                "Rate limit exceeded"
            );

            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

/// 요청에서 클라이언트 식별자 추출.
///
/// 1. `trust_forwarded`이면 `X-Forwarded-For`의 첫 주소, 그다음 `X-Real-IP`
/// 2. 연결 정보(`ConnectInfo<SocketAddr>`)의 원격 IP
/// 3. 모두 없으면 `"unknown"`
pub fn extract_client_id(request: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(request) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

fn forwarded_ip(request: &Request) -> Option<String> {
    let headers = request.headers();

    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded_for.or_else(real_ip).map(str::to_string)
}
