//! 비밀번호 해싱 유틸리티.
//!
//! Argon2id 기반 비밀번호 해싱 및 검증. 로그인 시 사용자 저장소가 사용합니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("비밀번호 검증 실패")]
    VerificationFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
}

/// 비밀번호를 해싱하여 PHC 형식 문자열로 반환합니다.
///
/// ```rust,ignore
/// let hash = hash_password("rizal_2004").unwrap();
/// // "$argon2id$v=19$m=19456,t=2,p=1$..."
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::HashingFailed)
}

/// 저장된 해시와 평문 비밀번호를 비교합니다.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}
