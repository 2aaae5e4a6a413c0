//! JWT 서명/검증 키 로딩.
//!
//! 기준 디렉터리의 RSA 키 쌍(`jwt-signing.pem`, `jwt-signing.pub`)을 우선 사용하고,
//! 둘 중 하나라도 없거나 읽을 수 없으면 공유 비밀키(HS256)로 대체합니다.
//! 키 파일이 없는 것은 정상적인 설정 상태이므로 에러가 아닙니다.
//!
//! 키는 시작 시 한 번만 읽습니다. 교체하려면 프로세스를 재시작해야 합니다.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use lms_core::AuthConfig;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// 서명 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// RSA 키 쌍 (RS256)
    Asymmetric,
    /// 공유 비밀키 (HS256)
    Symmetric,
}

impl SigningAlgorithm {
    /// 대응하는 JWT 알고리즘.
    pub fn jwt_algorithm(self) -> Algorithm {
        match self {
            SigningAlgorithm::Asymmetric => Algorithm::RS256,
            SigningAlgorithm::Symmetric => Algorithm::HS256,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.jwt_algorithm())
    }
}

/// 키 구성 에러.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("사용 가능한 키가 없습니다: RSA 키 파일과 공유 비밀키가 모두 설정되지 않았습니다")]
    NoKeyMaterial,
    #[error("잘못된 키 형식: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

/// 검증 후보 (키 + 알고리즘).
#[derive(Clone)]
pub struct VerificationCandidate {
    pub key: DecodingKey,
    pub algorithm: Algorithm,
}

impl fmt::Debug for VerificationCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationCandidate")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// 해석된 키 자료.
///
/// `Asymmetric`이면 두 PEM이 모두 채워져 있습니다. 공유 비밀키는 방식과 무관하게
/// 설정되어 있으면 보관되며, 검증 시 두 번째 후보로 사용됩니다.
#[derive(Clone)]
pub struct KeyMaterial {
    algorithm: SigningAlgorithm,
    private_key: Option<Vec<u8>>,
    public_key: Option<Vec<u8>>,
    shared_secret: Option<Arc<SecretString>>,
}

impl KeyMaterial {
    /// 공유 비밀키만 사용하는 키 자료.
    pub fn symmetric(shared_secret: Option<SecretString>) -> Self {
        Self {
            algorithm: SigningAlgorithm::Symmetric,
            private_key: None,
            public_key: None,
            shared_secret: shared_secret.map(Arc::new),
        }
    }

    /// RSA PEM 키 쌍으로 키 자료를 만듭니다. PEM을 파싱할 수 없으면 에러.
    pub fn asymmetric(
        private_pem: Vec<u8>,
        public_pem: Vec<u8>,
        shared_secret: Option<SecretString>,
    ) -> Result<Self, KeyError> {
        EncodingKey::from_rsa_pem(&private_pem)?;
        DecodingKey::from_rsa_pem(&public_pem)?;

        Ok(Self {
            algorithm: SigningAlgorithm::Asymmetric,
            private_key: Some(private_pem),
            public_key: Some(public_pem),
            shared_secret: shared_secret.map(Arc::new),
        })
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn has_shared_secret(&self) -> bool {
        self.shared_secret.is_some()
    }

    /// 서명 키와 알고리즘.
    ///
    /// 비대칭 모드에서는 개인 키, 대칭 모드에서는 공유 비밀키를 사용합니다.
    pub fn signing_key(&self) -> Result<(EncodingKey, Algorithm), KeyError> {
        match (&self.algorithm, &self.private_key, &self.shared_secret) {
            (SigningAlgorithm::Asymmetric, Some(pem), _) => {
                Ok((EncodingKey::from_rsa_pem(pem)?, Algorithm::RS256))
            }
            (SigningAlgorithm::Symmetric, _, Some(secret)) => Ok((
                EncodingKey::from_secret(secret.expose_secret().as_bytes()),
                Algorithm::HS256,
            )),
            _ => Err(KeyError::NoKeyMaterial),
        }
    }

    /// 우선순위 순서의 검증 후보 목록.
    ///
    /// 1. RSA 공개 키 + RS256 (있는 경우)
    /// 2. 공유 비밀키 + HS256 (설정된 경우)
    pub fn candidates(&self) -> Result<Vec<VerificationCandidate>, KeyError> {
        let mut candidates = Vec::with_capacity(2);

        if let Some(pem) = &self.public_key {
            candidates.push(VerificationCandidate {
                key: DecodingKey::from_rsa_pem(pem)?,
                algorithm: Algorithm::RS256,
            });
        }

        if let Some(secret) = &self.shared_secret {
            candidates.push(VerificationCandidate {
                key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                algorithm: Algorithm::HS256,
            });
        }

        if candidates.is_empty() {
            return Err(KeyError::NoKeyMaterial);
        }

        Ok(candidates)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("has_private_key", &self.private_key.is_some())
            .field("has_public_key", &self.public_key.is_some())
            .field("has_shared_secret", &self.shared_secret.is_some())
            .finish()
    }
}

/// 키 자료 제공자.
#[derive(Clone)]
pub struct KeyMaterialProvider {
    private_key_path: PathBuf,
    public_key_path: PathBuf,
    shared_secret: Option<Arc<SecretString>>,
}

impl KeyMaterialProvider {
    pub fn new(
        base_dir: impl AsRef<Path>,
        private_key_file: &str,
        public_key_file: &str,
        shared_secret: Option<SecretString>,
    ) -> Self {
        let base_dir = base_dir.as_ref();
        Self {
            private_key_path: base_dir.join(private_key_file),
            public_key_path: base_dir.join(public_key_file),
            shared_secret: shared_secret.map(Arc::new),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            private_key_path: config.private_key_path(),
            public_key_path: config.public_key_path(),
            shared_secret: config.shared_secret().map(Arc::new),
        }
    }

    /// 키 자료를 해석합니다. 실패하지 않습니다.
    ///
    /// 두 키 파일이 모두 읽히고 RSA PEM으로 파싱되면 `Asymmetric`,
    /// 그 외에는 공유 비밀키 기반 `Symmetric`을 반환합니다.
    pub fn resolve(&self) -> KeyMaterial {
        let private_pem = read_key_file(&self.private_key_path);
        let public_pem = read_key_file(&self.public_key_path);

        let (Some(private_pem), Some(public_pem)) = (private_pem, public_pem) else {
            info!(
                private_key = %self.private_key_path.display(),
                public_key = %self.public_key_path.display(),
                "RSA key pair not available, using shared secret (HS256)"
            );
            return self.symmetric();
        };

        match KeyMaterial::asymmetric(private_pem, public_pem, None) {
            Ok(mut material) => {
                material.shared_secret = self.shared_secret.clone();
                info!(
                    private_key = %self.private_key_path.display(),
                    hs256_fallback = material.has_shared_secret(),
                    "Loaded RSA key pair (RS256)"
                );
                material
            }
            Err(e) => {
                warn!(
                    error = %e,
                    private_key = %self.private_key_path.display(),
                    "RSA key files are not valid PEM, using shared secret (HS256)"
                );
                self.symmetric()
            }
        }
    }

    fn symmetric(&self) -> KeyMaterial {
        KeyMaterial {
            algorithm: SigningAlgorithm::Symmetric,
            private_key: None,
            public_key: None,
            shared_secret: self.shared_secret.clone(),
        }
    }
}

fn read_key_file(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Key file unreadable");
            None
        }
    }
}
