//! 설정 관리.
//!
//! 기본값 → TOML 파일(선택) → `LMS__` 접두사 환경 변수 순으로 설정을 계층화합니다.
//!
//! ```text
//! LMS__AUTH__SHARED_SECRET=...      # HS256 공유 비밀키
//! LMS__AUTH__BASE_DIR=/etc/lms      # RSA 키 파일 디렉터리
//! LMS__THROTTLE__RATE=10            # 윈도우당 최대 요청 수
//! LMS__THROTTLE__DURATION_SECS=60   # 윈도우 길이 (초)
//! ```

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 인증(JWT) 설정
    #[serde(default)]
    pub auth: AuthConfig,
    /// 요청 제한 설정
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 인메모리 사용자 저장소 초기 데이터
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 허용할 CORS origin 목록 (비어 있으면 모든 origin 허용)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: default_request_timeout_secs(),
            cors_origins: Vec::new(),
        }
    }
}

/// JWT 키 및 토큰 수명 설정.
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// 키 파일 기준 디렉터리
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// RSA 서명(개인) 키 파일 이름
    #[serde(default = "default_private_key_file")]
    pub private_key_file: String,
    /// RSA 검증(공개) 키 파일 이름
    #[serde(default = "default_public_key_file")]
    pub public_key_file: String,
    /// HS256 공유 비밀키 (키 파일이 없을 때의 대체 수단)
    #[serde(default, skip_serializing)]
    pub shared_secret: Option<String>,
    /// Access Token 수명 (초, 기본값: 1일)
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
    /// Refresh Token 수명 (초, 기본값: 7일)
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            private_key_file: default_private_key_file(),
            public_key_file: default_public_key_file(),
            shared_secret: None,
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("base_dir", &self.base_dir)
            .field("private_key_file", &self.private_key_file)
            .field("public_key_file", &self.public_key_file)
            .field(
                "shared_secret",
                &self.shared_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .finish()
    }
}

impl AuthConfig {
    /// 개인 키 파일 전체 경로.
    pub fn private_key_path(&self) -> PathBuf {
        self.base_dir.join(&self.private_key_file)
    }

    /// 공개 키 파일 전체 경로.
    pub fn public_key_path(&self) -> PathBuf {
        self.base_dir.join(&self.public_key_file)
    }

    /// 공유 비밀키를 `SecretString`으로 반환합니다.
    ///
    /// 비어 있거나 공백뿐인 값은 미설정으로 취급합니다.
    pub fn shared_secret(&self) -> Option<SecretString> {
        self.shared_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::new(s.into()))
    }
}

/// 슬라이딩 윈도우 요청 제한 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleConfig {
    /// 윈도우당 최대 요청 수 (기본값: 10)
    #[serde(default = "default_rate")]
    pub rate: usize,
    /// 윈도우 길이 (초, 기본값: 60)
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// 만료된 윈도우 정리 주기 (초, 기본값: 300)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// X-Forwarded-For / X-Real-IP 헤더 신뢰 여부 (기본값: false)
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            duration_secs: default_duration_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            trust_forwarded_headers: false,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨 필터 (예: "info", "lms_api=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 출력 형식 ("pretty" | "json" | "compact")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// 인메모리 사용자 저장소에 미리 등록할 사용자.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedUser {
    /// 사용자 ID
    pub id: i64,
    /// 사용자 이름
    pub username: String,
    /// 이메일
    #[serde(default)]
    pub email: String,
    /// Argon2 PHC 형식 비밀번호 해시
    pub password_hash: String,
}

// 기본값 함수들
fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_private_key_file() -> String {
    "jwt-signing.pem".to_string()
}

fn default_public_key_file() -> String {
    "jwt-signing.pub".to_string()
}

/// 토큰 유효 기간 상한 (10년).
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

fn default_access_token_ttl_secs() -> i64 {
    24 * 60 * 60
}

fn default_refresh_token_ttl_secs() -> i64 {
    7 * 24 * 60 * 60
}

fn default_rate() -> usize {
    10
}

fn default_duration_secs() -> u64 {
    60
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없어도 에러가 아닙니다. 환경 변수가 파일 값을 덮어씁니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("LMS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 설정 값을 검증합니다.
    ///
    /// 키 파일도 공유 비밀키도 없는 경우는 키 로딩 단계에서 판단하므로
    /// 여기서는 검사하지 않습니다.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.throttle.rate == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "throttle.rate must be greater than 0".into(),
            ));
        }

        if self.throttle.duration_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "throttle.duration_secs must be greater than 0".into(),
            ));
        }

        if self.throttle.cleanup_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "throttle.cleanup_interval_secs must be greater than 0".into(),
            ));
        }

        for (name, ttl) in [
            ("auth.access_token_ttl_secs", self.auth.access_token_ttl_secs),
            ("auth.refresh_token_ttl_secs", self.auth.refresh_token_ttl_secs),
        ] {
            if ttl <= 0 || ttl > MAX_TOKEN_TTL_SECS {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "{name} must be between 1 and {MAX_TOKEN_TTL_SECS}"
                )));
            }
        }

        if let Some(user) = self.users.iter().find(|u| u.username.trim().is_empty()) {
            return Err(ConfigValidationError::MissingField(format!(
                "users[id={}].username",
                user.id
            )));
        }

        Ok(())
    }
}

/// 설정 검증 에러.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.throttle.rate, 10);
        assert_eq!(config.throttle.duration_secs, 60);
        assert_eq!(config.auth.private_key_file, "jwt-signing.pem");
        assert_eq!(config.auth.public_key_file, "jwt-signing.pub");
        assert_eq!(config.auth.access_token_ttl_secs, 86_400);
        assert_eq!(config.auth.refresh_token_ttl_secs, 604_800);
        assert!(config.auth.shared_secret().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lms.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[auth]
base_dir = "/etc/lms/keys"
shared_secret = "file-secret"

[throttle]
rate = 3
duration_secs = 5

[[users]]
id = 42
username = "dosen_api"
email = "dosen@example.com"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.throttle.rate, 3);
        assert_eq!(config.throttle.duration_secs, 5);
        assert_eq!(config.throttle.cleanup_interval_secs, 300);
        assert_eq!(
            config.auth.private_key_path(),
            PathBuf::from("/etc/lms/keys/jwt-signing.pem")
        );
        assert_eq!(
            config.auth.shared_secret().unwrap().expose_secret(),
            "file-secret"
        );
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].username, "dosen_api");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.throttle.rate, 10);
    }

    #[test]
    fn test_blank_shared_secret_is_unset() {
        let auth = AuthConfig {
            shared_secret: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(auth.shared_secret().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let auth = AuthConfig {
            shared_secret: Some("super-secret".to_string()),
            ..Default::default()
        };
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut config = AppConfig::default();
        config.throttle.rate = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidValue(_))
        ));

        let mut config = AppConfig::default();
        config.throttle.duration_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.throttle.cleanup_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_ttl() {
        let mut config = AppConfig::default();
        config.auth.access_token_ttl_secs = i64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidValue(_))
        ));

        let mut config = AppConfig::default();
        config.auth.refresh_token_ttl_secs = MAX_TOKEN_TTL_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.access_token_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.refresh_token_ttl_secs = MAX_TOKEN_TTL_SECS;
        assert!(config.validate().is_ok());
    }
}
