//! 인증 모듈.
//!
//! - [`keys`]: RSA 키 쌍 / 공유 비밀키 로딩
//! - [`jwt`]: 토큰 발급 및 다중 후보 검증
//! - [`middleware`]: Bearer 토큰 인증 게이트와 Axum 추출기
//! - [`password`]: Argon2id 비밀번호 해싱

pub mod jwt;
pub mod keys;
pub mod middleware;
pub mod password;

pub use jwt::{
    CandidateOutcome, JwtError, Rejected, TokenClaims, TokenPair, TokenService, TokenType,
    ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS,
};
pub use keys::{KeyError, KeyMaterial, KeyMaterialProvider, SigningAlgorithm, VerificationCandidate};
pub use middleware::{strip_bearer, AuthGate, AuthUser, Unauthenticated};
pub use password::{hash_password, verify_password, PasswordError};
