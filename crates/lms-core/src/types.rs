//! 사용자 식별 타입.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 사용자 ID.
///
/// 토큰의 `user_id` 클레임에 정수로 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 인증된 주체.
///
/// 유효한 토큰에서 해석된 사용자 정보입니다. 사용자 저장소가 소유하며
/// 토큰 검증 시마다 새로 조회됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// 사용자 ID
    pub id: UserId,
    /// 사용자 이름
    pub username: String,
    /// 이메일
    pub email: String,
}

impl Principal {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: email.into(),
        }
    }
}
