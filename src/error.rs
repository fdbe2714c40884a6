//! 에러 타입 정의

use thiserror::Error;

/// 시뮬레이터 에러 타입
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("큐 가득 참")]
    QueueFull,

    #[error("큐 연결 끊김")]
    QueueDisconnected,

    #[error("큐 대기 타임아웃")]
    QueueTimeout,

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("초기화 실패: {0}")]
    Init(String),

    #[error("태스크 패닉: {0}")]
    TaskPanicked(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
