//! tracing 기반 로깅 초기화.
//!
//! 개발용 `pretty`, 운영/로그 수집용 `json`, 간결한 `compact` 형식을 지원합니다.
//! `RUST_LOG` 환경 변수가 있으면 설정된 레벨보다 우선합니다.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 사람이 읽기 쉬운 형식 (개발용)
    #[default]
    Pretty,
    /// JSON 형식 (운영용)
    Json,
    /// 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터
    pub level: String,
    /// 출력 형식
    pub format: LogFormat,
    /// 파일명/줄 번호 포함 여부
    pub with_file: bool,
    /// 대상(모듈 경로) 포함 여부
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 로그 형식을 설정합니다.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

impl From<&LoggingConfig> for LogConfig {
    /// 알 수 없는 형식 문자열은 `Pretty`로 처리합니다.
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// 주어진 설정으로 전역 tracing 구독자를 설치합니다.
///
/// 이미 설치되어 있으면 에러를 반환합니다.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_target(config.with_target)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_target(config.with_target)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_target(config.with_target)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        "Logging initialized"
    );

    Ok(())
}
