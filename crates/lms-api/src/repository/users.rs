//! 사용자 저장소.

use async_trait::async_trait;
use lms_core::{Principal, SeedUser, UserId};
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::{hash_password, verify_password};

/// 존재하지 않는 아이디에 대해서도 같은 비용의 검증을 수행하기 위한 해시.
fn dummy_password_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| hash_password("lms-dummy-password").ok())
        .as_deref()
}

/// 사용자 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("사용자 저장소 접근 실패: {0}")]
    Backend(String),
}

/// 사용자 조회 인터페이스.
///
/// 토큰 검증 시 주체 재조회와 로그인 시 자격증명 확인에 사용됩니다.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// ID로 사용자를 조회합니다. 없으면 `Ok(None)`.
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError>;

    /// 아이디/비밀번호를 확인하고 일치하면 사용자 ID를 반환합니다.
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserId>, StoreError>;
}

#[derive(Debug, Clone)]
struct UserRecord {
    principal: Principal,
    password_hash: String,
}

/// 인메모리 사용자 저장소.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정의 `[[users]]` 항목으로 초기화합니다.
    pub fn from_seed(seed: &[SeedUser]) -> Self {
        let users = seed
            .iter()
            .map(|user| {
                let id = UserId(user.id);
                let record = UserRecord {
                    principal: Principal::new(id, user.username.clone(), user.email.clone()),
                    password_hash: user.password_hash.clone(),
                };
                (id, record)
            })
            .collect();

        Self {
            users: RwLock::new(users),
        }
    }

    /// 사용자를 추가하거나 교체합니다.
    pub async fn insert(&self, principal: Principal, password_hash: impl Into<String>) {
        let record = UserRecord {
            principal,
            password_hash: password_hash.into(),
        };
        self.users.write().await.insert(record.principal.id, record);
    }

    /// 사용자를 삭제합니다. 삭제되었으면 `true`.
    pub async fn remove(&self, id: UserId) -> bool {
        self.users.write().await.remove(&id).is_some()
    }

    /// 등록된 사용자 수.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .get(&id)
            .map(|record| record.principal.clone()))
    }

    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserId>, StoreError> {
        let record = {
            let users = self.users.read().await;
            users
                .values()
                .find(|record| record.principal.username == username)
                .cloned()
        };

        let Some(record) = record else {
            // 아이디 존재 여부가 응답 시간으로 드러나지 않도록 해시 검증을 수행
            if let Some(hash) = dummy_password_hash() {
                let _ = verify_password(password, hash);
            }
            debug!(username, "Sign-in for unknown username");
            return Ok(None);
        };

        match verify_password(password, &record.password_hash) {
            Ok(()) => Ok(Some(record.principal.id)),
            Err(e) => {
                debug!(user_id = %record.principal.id, error = %e, "Credential check failed");
                Ok(None)
            }
        }
    }
}
