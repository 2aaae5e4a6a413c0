//! SimpleLMS 핵심 도메인 타입.
//!
//! 인증/요청 제한 코어와 외부 협력자(사용자 저장소, HTTP 핸들러)가
//! 공유하는 타입과 설정, 로깅 초기화를 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`types`]: 사용자 식별자 및 인증 주체(Principal)
//! - [`config`]: 파일/환경 변수 기반 애플리케이션 설정
//! - [`logging`]: tracing 구독자 초기화

pub mod config;
pub mod logging;
pub mod types;

pub use config::{
    AppConfig, AuthConfig, ConfigValidationError, LoggingConfig, SeedUser, ServerConfig,
    ThrottleConfig,
};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use types::{Principal, UserId};
