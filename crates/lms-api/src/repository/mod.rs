//! 외부 데이터 저장소 접근.
//!
//! 인증 코어는 사용자 데이터를 직접 소유하지 않고 [`UserStore`] 트레이트를 통해
//! 조회합니다. 기본 구현은 설정 파일로 초기화되는 인메모리 저장소입니다.

pub mod users;

pub use users::{InMemoryUserStore, StoreError, UserStore};
