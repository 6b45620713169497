//! 실행기 에러 타입
//!
//! [`ExecutorError`]는 인시던트 소비 경로와 설정 검증에서 발생하는 에러를 표현합니다.
//! 개별 명령의 실패는 에러가 아니라 [`CommandResult`](crate::runner::CommandResult)로
//! 분류되어 스테이지 판정에 쓰입니다.

use remedy_core::error::{CodecError, ConfigError, QueueError, RemedyError};

/// 실행기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 큐 전송 에러
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// 인시던트 디코딩 에러
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExecutorError> for RemedyError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Config { field, reason } => {
                RemedyError::Config(ConfigError::InvalidValue { field, reason })
            }
            ExecutorError::Queue(e) => RemedyError::Queue(e),
            ExecutorError::Codec(e) => RemedyError::Codec(e),
            ExecutorError::Io(e) => RemedyError::Io(e),
        }
    }
}
