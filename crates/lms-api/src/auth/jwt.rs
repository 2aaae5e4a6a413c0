//! JWT 토큰 발급 및 검증.
//!
//! Access/Refresh 토큰 쌍을 발급하고, 우선순위가 정해진 검증 후보
//! (RS256 공개 키 → HS256 공유 비밀키)로 토큰을 검증합니다.
//!
//! 검증 실패 원인(만료, 서명 불일치, 타입 불일치)은 내부 로그에만 남기고
//! 호출자에게는 [`Rejected`] 하나로 전달합니다.

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, EncodingKey, Header, Validation};
use lms_core::{Principal, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::keys::{KeyError, KeyMaterial, SigningAlgorithm, VerificationCandidate};
use crate::metrics::{record_auth_attempt, record_token_issued};
use crate::repository::UserStore;

/// Access 토큰 유효 기간 (1일).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Refresh 토큰 유효 기간 (7일).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// 토큰 종류 (`type` 클레임).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT 페이로드.
///
/// ```json
/// {"user_id": 42, "exp": 1735689600, "iat": 1735603200, "type": "access"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// 사용자 ID
    pub user_id: UserId,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Issued At (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// 토큰 종류
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl TokenClaims {
    /// 현재 시각 기준으로 `ttl_secs` 뒤에 만료되는 클레임을 생성합니다.
    ///
    /// `ttl_secs`가 0 이하이거나 만료 시각이 `i64` 범위를 넘으면 에러.
    pub fn new(user_id: UserId, token_type: TokenType, ttl_secs: i64) -> Result<Self, JwtError> {
        if ttl_secs <= 0 {
            return Err(JwtError::InvalidTtl(ttl_secs));
        }
        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(ttl_secs)
            .ok_or(JwtError::InvalidTtl(ttl_secs))?;

        Ok(Self {
            user_id,
            exp,
            iat: Some(now),
            token_type,
        })
    }
}

/// Access Token + Refresh Token 쌍.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// 후보 하나에 대한 검증 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Valid(TokenClaims),
    /// 서명은 유효하지만 `type` 클레임이 다름
    WrongType(TokenType),
    Expired,
    InvalidSignature,
    Malformed,
}

impl CandidateOutcome {
    /// 여러 후보 실패 중 로그에 남길 가장 구체적인 원인을 고르기 위한 순위.
    fn specificity(&self) -> u8 {
        match self {
            CandidateOutcome::Valid(_) => 4,
            CandidateOutcome::WrongType(_) => 3,
            CandidateOutcome::Expired => 2,
            CandidateOutcome::InvalidSignature => 1,
            CandidateOutcome::Malformed => 0,
        }
    }
}

/// 토큰 거부 사유.
///
/// HTTP 경계에서는 모두 401 하나로 합쳐집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("유효하지 않거나 만료된 토큰")]
    InvalidOrExpired,
    #[error("토큰의 사용자를 찾을 수 없습니다")]
    PrincipalNotFound,
    #[error("사용자 저장소를 사용할 수 없습니다")]
    StoreUnavailable,
}

impl Rejected {
    fn as_label(self) -> &'static str {
        match self {
            Rejected::InvalidOrExpired => "invalid_or_expired",
            Rejected::PrincipalNotFound => "principal_not_found",
            Rejected::StoreUnavailable => "store_unavailable",
        }
    }
}

/// JWT 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Rejected(#[from] Rejected),
    #[error("잘못된 토큰 유효 기간: {0}초")]
    InvalidTtl(i64),
}

/// 토큰 발급/검증 서비스.
///
/// 키 자료는 생성 시 한 번 해석되며 이후 변경되지 않습니다. 주체(Principal)는
/// 캐시하지 않고 검증할 때마다 사용자 저장소에서 다시 조회합니다.
pub struct TokenService {
    signing_key: EncodingKey,
    signing_algorithm: Algorithm,
    algorithm: SigningAlgorithm,
    candidates: Vec<VerificationCandidate>,
    users: Arc<dyn UserStore>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    /// 키 자료로 서비스를 생성합니다.
    ///
    /// 서명 키나 검증 후보를 만들 수 없으면 에러. 시작 시 치명적 설정 오류로 취급합니다.
    pub fn new(material: &KeyMaterial, users: Arc<dyn UserStore>) -> Result<Self, KeyError> {
        let (signing_key, signing_algorithm) = material.signing_key()?;
        let candidates = material.candidates()?;

        Ok(Self {
            signing_key,
            signing_algorithm,
            algorithm: material.algorithm(),
            candidates,
            users,
            access_ttl_secs: ACCESS_TOKEN_TTL_SECS,
            refresh_ttl_secs: REFRESH_TOKEN_TTL_SECS,
        })
    }

    /// 토큰 유효 기간을 변경합니다 (초).
    pub fn with_ttl(mut self, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        self.access_ttl_secs = access_ttl_secs;
        self.refresh_ttl_secs = refresh_ttl_secs;
        self
    }

    /// 서명 방식.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// 지정한 종류의 토큰 하나를 발급합니다.
    pub fn issue(&self, user_id: UserId, token_type: TokenType) -> Result<String, JwtError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        let claims = TokenClaims::new(user_id, token_type, ttl)?;
        let token = self.encode_claims(&claims)?;
        record_token_issued(token_type.as_str());
        Ok(token)
    }

    /// Access/Refresh 토큰 쌍을 발급합니다.
    pub fn issue_pair(&self, user_id: UserId) -> Result<TokenPair, JwtError> {
        let pair = TokenPair {
            access: self.issue(user_id, TokenType::Access)?,
            refresh: self.issue(user_id, TokenType::Refresh)?,
        };
        debug!(user_id = %user_id, algorithm = %self.algorithm, "Issued token pair");
        Ok(pair)
    }

    /// 임의의 클레임을 현재 서명 키로 인코딩합니다.
    pub fn encode_claims(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        encode(
            &Header::new(self.signing_algorithm),
            claims,
            &self.signing_key,
        )
        .map_err(JwtError::from)
    }

    /// 서명/만료/타입만 검증하고 클레임을 반환합니다. 사용자 조회는 하지 않습니다.
    ///
    /// 후보를 순서대로 시도하며, 서명과 만료가 유효하더라도 `type`이 다르면
    /// 다음 후보로 넘어갑니다.
    pub fn verify_claims(&self, token: &str, expected: TokenType) -> Result<TokenClaims, Rejected> {
        let mut most_specific = CandidateOutcome::Malformed;

        for candidate in &self.candidates {
            match check_candidate(token, candidate, expected) {
                CandidateOutcome::Valid(claims) => return Ok(claims),
                outcome => {
                    debug!(algorithm = ?candidate.algorithm, ?outcome, "Verification candidate rejected token");
                    if outcome.specificity() > most_specific.specificity() {
                        most_specific = outcome;
                    }
                }
            }
        }

        debug!(reason = ?most_specific, expected = %expected, "Token rejected by all candidates");
        Err(Rejected::InvalidOrExpired)
    }

    /// 토큰을 검증하고 주체를 다시 조회합니다.
    pub async fn verify(&self, token: &str, expected: TokenType) -> Result<Principal, Rejected> {
        let result = self.resolve_principal(token, expected).await;
        match &result {
            Ok(_) => record_auth_attempt("success"),
            Err(reason) => record_auth_attempt(reason.as_label()),
        }
        result
    }

    async fn resolve_principal(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<Principal, Rejected> {
        let claims = self.verify_claims(token, expected)?;

        match self.users.find_by_id(claims.user_id).await {
            Ok(Some(principal)) => Ok(principal),
            Ok(None) => {
                debug!(user_id = %claims.user_id, "Token subject no longer exists");
                Err(Rejected::PrincipalNotFound)
            }
            Err(e) => {
                warn!(user_id = %claims.user_id, error = %e, "User lookup failed during verification");
                Err(Rejected::StoreUnavailable)
            }
        }
    }

    /// Refresh 토큰으로 새 Access 토큰을 발급합니다.
    pub async fn refresh_access(&self, refresh_token: &str) -> Result<String, JwtError> {
        let principal = self.verify(refresh_token, TokenType::Refresh).await?;
        self.issue(principal.id, TokenType::Access)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("candidates", &self.candidates)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

fn check_candidate(
    token: &str,
    candidate: &VerificationCandidate,
    expected: TokenType,
) -> CandidateOutcome {
    let mut validation = Validation::new(candidate.algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;

    match decode::<TokenClaims>(token, &candidate.key, &validation) {
        Ok(data) if data.claims.token_type == expected => CandidateOutcome::Valid(data.claims),
        Ok(data) => CandidateOutcome::WrongType(data.claims.token_type),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => CandidateOutcome::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                CandidateOutcome::InvalidSignature
            }
            _ => CandidateOutcome::Malformed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryUserStore;
    use proptest::prelude::*;
    use secrecy::SecretString;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";
    const PRIVATE_PEM: &[u8] = include_bytes!("../../tests/fixtures/jwt-signing.pem");
    const PUBLIC_PEM: &[u8] = include_bytes!("../../tests/fixtures/jwt-signing.pub");

    fn secret(value: &str) -> Option<SecretString> {
        Some(SecretString::new(value.into()))
    }

    async fn store_with(ids: &[i64]) -> Arc<InMemoryUserStore> {
        let store = Arc::new(InMemoryUserStore::new());
        for id in ids {
            store
                .insert(
                    Principal::new(*id, format!("user{id}"), format!("user{id}@example.com")),
                    "unused",
                )
                .await;
        }
        store
    }

    fn hs256_service(users: Arc<InMemoryUserStore>, value: &str) -> TokenService {
        TokenService::new(&KeyMaterial::symmetric(secret(value)), users).unwrap()
    }

    fn rs256_service(users: Arc<InMemoryUserStore>, shared: Option<SecretString>) -> TokenService {
        let material =
            KeyMaterial::asymmetric(PRIVATE_PEM.to_vec(), PUBLIC_PEM.to_vec(), shared).unwrap();
        TokenService::new(&material, users).unwrap()
    }

    fn claims_with_exp(user_id: i64, token_type: TokenType, exp: i64) -> TokenClaims {
        TokenClaims {
            user_id: UserId(user_id),
            exp,
            iat: None,
            token_type,
        }
    }

    #[tokio::test]
    async fn test_round_trip_hs256() {
        let service = hs256_service(store_with(&[7]).await, TEST_SECRET);
        assert_eq!(service.algorithm(), SigningAlgorithm::Symmetric);

        let pair = service.issue_pair(UserId(7)).unwrap();
        assert_eq!(pair.access.split('.').count(), 3);

        let principal = service.verify(&pair.access, TokenType::Access).await.unwrap();
        assert_eq!(principal.id, UserId(7));
        assert_eq!(principal.username, "user7");
    }

    #[tokio::test]
    async fn test_round_trip_rs256() {
        let service = rs256_service(store_with(&[3]).await, None);
        assert_eq!(service.algorithm(), SigningAlgorithm::Asymmetric);

        let pair = service.issue_pair(UserId(3)).unwrap();
        let principal = service.verify(&pair.access, TokenType::Access).await.unwrap();
        assert_eq!(principal.id, UserId(3));

        let header = jsonwebtoken::decode_header(&pair.access).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[tokio::test]
    async fn test_type_isolation() {
        let service = hs256_service(store_with(&[1]).await, TEST_SECRET);
        let pair = service.issue_pair(UserId(1)).unwrap();

        assert_eq!(
            service.verify(&pair.refresh, TokenType::Access).await,
            Err(Rejected::InvalidOrExpired)
        );
        assert_eq!(
            service.verify(&pair.access, TokenType::Refresh).await,
            Err(Rejected::InvalidOrExpired)
        );
        assert!(service.verify(&pair.refresh, TokenType::Refresh).await.is_ok());
    }

    #[test]
    fn test_expiry_boundary() {
        let users = Arc::new(InMemoryUserStore::new());
        let service = hs256_service(users, TEST_SECRET);
        let now = Utc::now().timestamp();

        let past = service
            .encode_claims(&claims_with_exp(1, TokenType::Access, now - 1))
            .unwrap();
        assert_eq!(
            service.verify_claims(&past, TokenType::Access),
            Err(Rejected::InvalidOrExpired)
        );

        let future = service
            .encode_claims(&claims_with_exp(1, TokenType::Access, now + 1))
            .unwrap();
        assert!(service.verify_claims(&future, TokenType::Access).is_ok());
    }

    #[test]
    fn test_candidate_outcomes() {
        let users = Arc::new(InMemoryUserStore::new());
        let service = hs256_service(users, TEST_SECRET);
        let candidate = &service.candidates[0];
        let now = Utc::now().timestamp();

        let expired = service
            .encode_claims(&claims_with_exp(1, TokenType::Access, now - 10))
            .unwrap();
        assert_eq!(
            check_candidate(&expired, candidate, TokenType::Access),
            CandidateOutcome::Expired
        );

        let refresh = service.issue(UserId(1), TokenType::Refresh).unwrap();
        assert_eq!(
            check_candidate(&refresh, candidate, TokenType::Access),
            CandidateOutcome::WrongType(TokenType::Refresh)
        );

        assert_eq!(
            check_candidate("abc.def.ghi", candidate, TokenType::Access),
            CandidateOutcome::Malformed
        );
    }

    #[test]
    fn test_wrong_secret() {
        let users = Arc::new(InMemoryUserStore::new());
        let issuer = hs256_service(users.clone(), TEST_SECRET);
        let verifier = hs256_service(users, "wrong-secret-key-for-testing-minimum-32-chars");

        let token = issuer.issue(UserId(1), TokenType::Access).unwrap();
        assert_eq!(
            check_candidate(&token, &verifier.candidates[0], TokenType::Access),
            CandidateOutcome::InvalidSignature
        );
        assert_eq!(
            verifier.verify_claims(&token, TokenType::Access),
            Err(Rejected::InvalidOrExpired)
        );
    }

    #[tokio::test]
    async fn test_hs256_token_accepted_after_switch_to_rs256() {
        let users = store_with(&[11]).await;
        let legacy = hs256_service(users.clone(), TEST_SECRET);
        let current = rs256_service(users, secret(TEST_SECRET));

        let token = legacy.issue(UserId(11), TokenType::Access).unwrap();
        let principal = current.verify(&token, TokenType::Access).await.unwrap();
        assert_eq!(principal.id, UserId(11));
    }

    #[tokio::test]
    async fn test_hs256_token_rejected_without_shared_secret() {
        let users = store_with(&[11]).await;
        let legacy = hs256_service(users.clone(), TEST_SECRET);
        let current = rs256_service(users, None);

        let token = legacy.issue(UserId(11), TokenType::Access).unwrap();
        assert_eq!(
            current.verify(&token, TokenType::Access).await,
            Err(Rejected::InvalidOrExpired)
        );
    }

    #[tokio::test]
    async fn test_principal_not_found() {
        let users = store_with(&[5]).await;
        let service = hs256_service(users.clone(), TEST_SECRET);
        let token = service.issue(UserId(5), TokenType::Access).unwrap();

        assert!(users.remove(UserId(5)).await);
        assert_eq!(
            service.verify(&token, TokenType::Access).await,
            Err(Rejected::PrincipalNotFound)
        );
    }

    #[tokio::test]
    async fn test_refresh_access() {
        let service = hs256_service(store_with(&[8]).await, TEST_SECRET);
        let pair = service.issue_pair(UserId(8)).unwrap();

        let access = service.refresh_access(&pair.refresh).await.unwrap();
        let principal = service.verify(&access, TokenType::Access).await.unwrap();
        assert_eq!(principal.id, UserId(8));

        assert!(matches!(
            service.refresh_access(&pair.access).await,
            Err(JwtError::Rejected(Rejected::InvalidOrExpired))
        ));
    }

    #[test]
    fn test_claims_json_shape() {
        let claims = TokenClaims {
            user_id: UserId(42),
            exp: 1_700_000_000,
            iat: Some(1_699_913_600),
            token_type: TokenType::Refresh,
        };
        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(value["user_id"], 42);
        assert_eq!(value["exp"], 1_700_000_000);
        assert_eq!(value["type"], "refresh");

        // iat 없는 토큰도 허용
        let parsed: TokenClaims =
            serde_json::from_str(r#"{"user_id":1,"exp":10,"type":"access"}"#).unwrap();
        assert_eq!(parsed.iat, None);
        assert_eq!(parsed.token_type, TokenType::Access);
    }

    #[test]
    fn test_issued_lifetimes() {
        let users = Arc::new(InMemoryUserStore::new());
        let service = hs256_service(users, TEST_SECRET);
        let pair = service.issue_pair(UserId(2)).unwrap();

        let access = service.verify_claims(&pair.access, TokenType::Access).unwrap();
        let refresh = service.verify_claims(&pair.refresh, TokenType::Refresh).unwrap();

        assert_eq!(access.exp - access.iat.unwrap(), ACCESS_TOKEN_TTL_SECS);
        assert_eq!(refresh.exp - refresh.iat.unwrap(), REFRESH_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_out_of_range_ttl_rejected() {
        let users = Arc::new(InMemoryUserStore::new());

        let service = hs256_service(users.clone(), TEST_SECRET).with_ttl(i64::MAX, 10);
        assert!(matches!(
            service.issue_pair(UserId(1)),
            Err(JwtError::InvalidTtl(i64::MAX))
        ));

        let service = hs256_service(users.clone(), TEST_SECRET).with_ttl(0, 10);
        assert!(matches!(
            service.issue(UserId(1), TokenType::Access),
            Err(JwtError::InvalidTtl(0))
        ));

        let service = hs256_service(users, TEST_SECRET).with_ttl(60, -1);
        assert!(service.issue(UserId(1), TokenType::Access).is_ok());
        assert!(matches!(
            service.issue(UserId(1), TokenType::Refresh),
            Err(JwtError::InvalidTtl(-1))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_access_round_trip(user_id in 1i64..i64::MAX) {
            let users = Arc::new(InMemoryUserStore::new());
            let service = hs256_service(users, TEST_SECRET);

            let pair = service.issue_pair(UserId(user_id)).unwrap();
            let claims = service.verify_claims(&pair.access, TokenType::Access).unwrap();

            prop_assert_eq!(claims.user_id, UserId(user_id));
            prop_assert!(service.verify_claims(&pair.refresh, TokenType::Access).is_err());
        }
    }
}
