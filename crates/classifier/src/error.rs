//! 분류기 에러 타입
//!
//! [`ClassifierError`]는 룰 로딩, 테일러, 인테이크/발행 경로에서 발생하는 에러를 표현합니다.
//! `From<ClassifierError> for RemedyError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use remedy_core::error::{CodecError, ConfigError, PipelineError, QueueError, RemedyError};

/// 분류기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// 룰 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 룰 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 룰 정규식 컴파일 실패
    #[error("invalid regex in rule '{rule}': {reason}")]
    InvalidRegex {
        /// 룰 이름
        rule: String,
        /// 컴파일 에러
        reason: String,
    },

    /// 테일러 에러 (파일 I/O, 소켓 바인드 등)
    #[error("tailer error: {source_type}: {reason}")]
    Tailer {
        /// 소스 유형 (file, syslog_udp, syslog_tcp)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 내부 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 큐 전송 에러
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// 인시던트 인코딩 에러
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClassifierError> for RemedyError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::Queue(e) => RemedyError::Queue(e),
            ClassifierError::Codec(e) => RemedyError::Codec(e),
            ClassifierError::Io(e) => RemedyError::Io(e),
            ClassifierError::RuleLoad { path, reason } => {
                RemedyError::Config(ConfigError::ParseFailed {
                    reason: format!("{path}: {reason}"),
                })
            }
            ClassifierError::Config { field, reason } => {
                RemedyError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => RemedyError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_load_error_display() {
        let err = ClassifierError::RuleLoad {
            path: "/etc/remedy/rules.yaml".to_owned(),
            reason: "invalid YAML".to_owned(),
        };
        assert!(err.to_string().contains("rules.yaml"));
    }

    #[test]
    fn rule_load_converts_to_config_error() {
        let err = ClassifierError::RuleLoad {
            path: "rules.yaml".to_owned(),
            reason: "missing field `Regex`".to_owned(),
        };
        let top: RemedyError = err.into();
        assert!(matches!(top, RemedyError::Config(_)));
    }

    #[test]
    fn queue_error_keeps_its_kind() {
        let top: RemedyError = ClassifierError::Queue(QueueError::NotConnected).into();
        assert!(matches!(top, RemedyError::Queue(QueueError::NotConnected)));
    }

    #[test]
    fn tailer_error_converts_to_pipeline_error() {
        let err = ClassifierError::Tailer {
            source_type: "syslog_udp".to_owned(),
            reason: "address in use".to_owned(),
        };
        let top: RemedyError = err.into();
        assert!(matches!(top, RemedyError::Pipeline(_)));
    }
}
