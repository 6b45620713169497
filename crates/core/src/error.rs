//! 에러 타입 -- 도메인별 에러 정의

/// Remedy 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RemedyError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 큐 전송 에러
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// 인시던트 직렬화/역직렬화 에러
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 큐 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// 브로커 접속 파라미터가 유효하지 않음
    #[error("invalid broker parameters: {0}")]
    Config(#[from] ConfigError),

    /// 브로커 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// connect 전에 채널을 사용함
    #[error("channel is not connected")]
    NotConnected,

    /// 이미 닫힌 채널
    #[error("channel is closed")]
    ChannelClosed,

    /// 선언되지 않은 큐
    #[error("queue not declared: {0}")]
    QueueNotFound(String),

    /// 알 수 없는 delivery tag (이미 정산되었거나 다른 채널 소속)
    #[error("unknown delivery tag: {0}")]
    UnknownDeliveryTag(u64),

    /// 이미 ack/nack 된 delivery
    #[error("delivery {0} already settled")]
    AlreadySettled(u64),

    /// 발행 실패
    #[error("publish to '{queue}' failed: {reason}")]
    Publish { queue: String, reason: String },
}

/// 인시던트 코덱 에러
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// 인코딩 실패
    #[error("failed to serialize incident: {0}")]
    Serialization(String),

    /// 필수 필드 누락, 타입 불일치 등 잘못된 wire 형식
    #[error("malformed incident: {0}")]
    MalformedIncident(String),
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,
}
