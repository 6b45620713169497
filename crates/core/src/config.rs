//! 설정 관리 -- remedy.toml 파싱 및 런타임 설정
//!
//! [`RemedyConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`REMEDY_BROKER_HOST=mq.internal` 형식)
//! 3. 설정 파일 (`remedy.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), remedy_core::error::RemedyError> {
//! use remedy_core::config::RemedyConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RemedyConfig::load("remedy.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RemedyConfig::parse("[executor]\nstage_timeout_secs = 30")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RemedyError};

/// 분류기 워커 수 상한
pub const MAX_WORKER_COUNT: usize = 1024;

/// 스테이지 타임아웃 상한 (초)
pub const MAX_STAGE_TIMEOUT_SECS: u64 = 3600;

/// Remedy 통합 설정
///
/// `remedy.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemedyConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메시지 브로커 설정
    #[serde(default)]
    pub broker: BrokerConfig,
    /// 원시 로그 소스 설정
    #[serde(default)]
    pub sources: SourcesConfig,
    /// 분류기 설정
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// 실행기 설정
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl RemedyConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RemedyError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RemedyError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RemedyError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RemedyError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RemedyError> {
        toml::from_str(toml_str).map_err(|e| {
            RemedyError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `REMEDY_{SECTION}_{FIELD}`
    /// 예: `REMEDY_EXECUTOR_STAGE_TIMEOUT_SECS=30`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "REMEDY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "REMEDY_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "REMEDY_GENERAL_PID_FILE");

        // Broker
        override_string(&mut self.broker.host, "REMEDY_BROKER_HOST");
        override_u16(&mut self.broker.port, "REMEDY_BROKER_PORT");
        override_string(&mut self.broker.user, "REMEDY_BROKER_USER");
        override_string(&mut self.broker.password, "REMEDY_BROKER_PASSWORD");
        override_string(&mut self.broker.log_queue, "REMEDY_BROKER_LOG_QUEUE");
        override_string(&mut self.broker.incident_queue, "REMEDY_BROKER_INCIDENT_QUEUE");
        override_string(
            &mut self.broker.dead_letter_queue,
            "REMEDY_BROKER_DEAD_LETTER_QUEUE",
        );

        // Sources
        override_bool(&mut self.sources.file_enabled, "REMEDY_SOURCES_FILE_ENABLED");
        override_string(&mut self.sources.syslog_file, "REMEDY_SOURCES_SYSLOG_FILE");
        override_bool(
            &mut self.sources.read_from_start,
            "REMEDY_SOURCES_READ_FROM_START",
        );
        override_u64(
            &mut self.sources.poll_interval_ms,
            "REMEDY_SOURCES_POLL_INTERVAL_MS",
        );
        override_bool(&mut self.sources.udp_enabled, "REMEDY_SOURCES_UDP_ENABLED");
        override_bool(&mut self.sources.tcp_enabled, "REMEDY_SOURCES_TCP_ENABLED");
        override_string(&mut self.sources.listen_ip, "REMEDY_SOURCES_LISTEN_IP");
        override_u16(&mut self.sources.listen_port, "REMEDY_SOURCES_LISTEN_PORT");

        // Classifier
        override_bool(&mut self.classifier.enabled, "REMEDY_CLASSIFIER_ENABLED");
        override_string(&mut self.classifier.rules_file, "REMEDY_CLASSIFIER_RULES_FILE");
        override_usize(
            &mut self.classifier.worker_count,
            "REMEDY_CLASSIFIER_WORKER_COUNT",
        );
        override_usize(
            &mut self.classifier.intake_capacity,
            "REMEDY_CLASSIFIER_INTAKE_CAPACITY",
        );
        override_string(&mut self.classifier.engine, "REMEDY_CLASSIFIER_ENGINE");

        // Executor
        override_bool(&mut self.executor.enabled, "REMEDY_EXECUTOR_ENABLED");
        override_string(
            &mut self.executor.remediations_dir,
            "REMEDY_EXECUTOR_REMEDIATIONS_DIR",
        );
        override_u64(
            &mut self.executor.stage_timeout_secs,
            "REMEDY_EXECUTOR_STAGE_TIMEOUT_SECS",
        );
        override_u16(&mut self.executor.prefetch, "REMEDY_EXECUTOR_PREFETCH");
        override_u32(
            &mut self.executor.max_delivery_attempts,
            "REMEDY_EXECUTOR_MAX_DELIVERY_ATTEMPTS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "REMEDY_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "REMEDY_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "REMEDY_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RemedyError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.broker.validate()?;

        if self.sources.file_enabled && self.sources.syslog_file.is_empty() {
            return Err(invalid(
                "sources.syslog_file",
                "must not be empty when the file source is enabled",
            ));
        }
        if (self.sources.udp_enabled || self.sources.tcp_enabled) && self.sources.listen_port == 0
        {
            return Err(invalid(
                "sources.listen_port",
                "must not be 0 when a syslog listener is enabled",
            ));
        }
        if self.sources.poll_interval_ms == 0 {
            return Err(invalid("sources.poll_interval_ms", "must be greater than 0"));
        }

        if self.classifier.enabled {
            if self.classifier.rules_file.is_empty() {
                return Err(invalid(
                    "classifier.rules_file",
                    "must not be empty when the classifier is enabled",
                ));
            }
            if self.classifier.worker_count == 0 || self.classifier.worker_count > MAX_WORKER_COUNT
            {
                return Err(invalid(
                    "classifier.worker_count",
                    format!("must be between 1 and {MAX_WORKER_COUNT}"),
                ));
            }
            if self.classifier.intake_capacity == 0 {
                return Err(invalid(
                    "classifier.intake_capacity",
                    "must be greater than 0",
                ));
            }
        }

        if self.executor.enabled {
            if self.executor.remediations_dir.is_empty() {
                return Err(invalid(
                    "executor.remediations_dir",
                    "must not be empty when the executor is enabled",
                ));
            }
            if self.executor.stage_timeout_secs == 0
                || self.executor.stage_timeout_secs > MAX_STAGE_TIMEOUT_SECS
            {
                return Err(invalid(
                    "executor.stage_timeout_secs",
                    format!("must be between 1 and {MAX_STAGE_TIMEOUT_SECS}"),
                ));
            }
            if self.executor.prefetch == 0 {
                return Err(invalid("executor.prefetch", "must be greater than 0"));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must not be 0 when metrics are enabled",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> RemedyError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 메시지 브로커 설정
///
/// 로그 큐와 인시던트 큐는 서로 다른 이름이어야 합니다.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// 브로커 호스트
    pub host: String,
    /// 브로커 포트
    pub port: u16,
    /// 사용자명
    pub user: String,
    /// 비밀번호
    pub password: String,
    /// 원시 로그 큐 이름
    pub log_queue: String,
    /// 인시던트 큐 이름
    pub incident_queue: String,
    /// 재전달 한도를 넘은 인시던트가 옮겨지는 큐
    pub dead_letter_queue: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            log_queue: "log".to_owned(),
            incident_queue: "incident".to_owned(),
            dead_letter_queue: "incident.dead".to_owned(),
        }
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("log_queue", &self.log_queue)
            .field("incident_queue", &self.incident_queue)
            .field("dead_letter_queue", &self.dead_letter_queue)
            .finish()
    }
}

impl BrokerConfig {
    /// 접속 파라미터와 큐 이름을 검증합니다.
    ///
    /// 큐 전송 구현체의 `connect`도 이 함수를 사용합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "broker.host".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "broker.port".to_owned(),
                reason: "must not be 0".to_owned(),
            });
        }
        for (field, name) in [
            ("broker.log_queue", &self.log_queue),
            ("broker.incident_queue", &self.incident_queue),
            ("broker.dead_letter_queue", &self.dead_letter_queue),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "queue name must not be empty".to_owned(),
                });
            }
        }
        if self.log_queue == self.incident_queue {
            return Err(ConfigError::InvalidValue {
                field: "broker.incident_queue".to_owned(),
                reason: "must differ from broker.log_queue".to_owned(),
            });
        }
        if self.dead_letter_queue == self.incident_queue
            || self.dead_letter_queue == self.log_queue
        {
            return Err(ConfigError::InvalidValue {
                field: "broker.dead_letter_queue".to_owned(),
                reason: "must differ from the log and incident queues".to_owned(),
            });
        }
        Ok(())
    }

    /// `host:port` 형식의 접속 주소
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 원시 로그 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// syslog 파일 테일러 활성화 여부
    pub file_enabled: bool,
    /// 감시할 syslog 파일 경로
    pub syslog_file: String,
    /// true면 파일 처음부터, false면 끝에서부터 읽음
    pub read_from_start: bool,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// UDP syslog 수신 활성화 여부
    pub udp_enabled: bool,
    /// TCP syslog 수신 활성화 여부
    pub tcp_enabled: bool,
    /// syslog 수신 IP
    pub listen_ip: String,
    /// syslog 수신 포트
    pub listen_port: u16,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            file_enabled: true,
            syslog_file: "/var/log/syslog".to_owned(),
            read_from_start: false,
            poll_interval_ms: 500,
            udp_enabled: false,
            tcp_enabled: false,
            listen_ip: "0.0.0.0".to_owned(),
            listen_port: 514,
        }
    }
}

impl SourcesConfig {
    /// `listen_ip:listen_port` 형식의 수신 주소
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen_ip, self.listen_port)
    }

    /// 파일 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 분류기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 룰 정의 YAML 파일 경로
    pub rules_file: String,
    /// 워커 풀 크기
    pub worker_count: usize,
    /// 인테이크 채널 용량
    pub intake_capacity: usize,
    /// 인시던트에 기록되는 엔진 태그
    pub engine: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules_file: "/etc/remedy/rules.yaml".to_owned(),
            worker_count: 10,
            intake_capacity: 1024,
            engine: "SYSLOGPROC".to_owned(),
        }
    }
}

/// 실행기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 감사/조치 스크립트 디렉토리
    pub remediations_dir: String,
    /// 스테이지 전체가 공유하는 타임아웃 (초)
    pub stage_timeout_secs: u64,
    /// 인시던트 큐 prefetch 수
    pub prefetch: u16,
    /// 최대 전달 횟수 (0 = 무제한)
    pub max_delivery_attempts: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remediations_dir: "/etc/remedy/remediations".to_owned(),
            stage_timeout_secs: 60,
            prefetch: 1,
            max_delivery_attempts: 10,
        }
    }
}

impl ExecutorConfig {
    /// 스테이지 타임아웃
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exporter 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// scrape 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = RemedyConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.classifier.worker_count, 10);
        assert_eq!(config.classifier.engine, "SYSLOGPROC");
        assert_eq!(config.executor.stage_timeout_secs, 60);
        assert_eq!(config.executor.prefetch, 1);
        assert_eq!(config.executor.max_delivery_attempts, 10);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        RemedyConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = RemedyConfig::parse("").unwrap();
        assert_eq!(config.broker.log_queue, "log");
        assert_eq!(config.broker.incident_queue, "incident");
        assert_eq!(config.broker.dead_letter_queue, "incident.dead");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[broker]
host = "mq.internal"

[executor]
stage_timeout_secs = 5
"#;
        let config = RemedyConfig::parse(toml).unwrap();
        assert_eq!(config.broker.host, "mq.internal");
        // port는 기본값 유지
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.executor.stage_timeout(), Duration::from_secs(5));
        assert_eq!(config.executor.prefetch, 1);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = RemedyConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            RemedyError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = RemedyConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_zero_broker_port() {
        let mut config = RemedyConfig::default();
        config.broker.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broker.port"));
    }

    #[test]
    fn validate_rejects_same_log_and_incident_queue() {
        let mut config = RemedyConfig::default();
        config.broker.incident_queue = config.broker.log_queue.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broker.incident_queue"));
    }

    #[test]
    fn validate_rejects_empty_queue_name() {
        let mut config = RemedyConfig::default();
        config.broker.log_queue = "  ".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broker.log_queue"));
    }

    #[test]
    fn validate_rejects_worker_count_out_of_range() {
        let mut config = RemedyConfig::default();
        config.classifier.worker_count = 0;
        assert!(config.validate().is_err());
        config.classifier.worker_count = MAX_WORKER_COUNT + 1;
        assert!(config.validate().is_err());
        config.classifier.worker_count = MAX_WORKER_COUNT;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_stage_timeout_out_of_range() {
        let mut config = RemedyConfig::default();
        config.executor.stage_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stage_timeout_secs"));
        config.executor.stage_timeout_secs = MAX_STAGE_TIMEOUT_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_skips_disabled_executor() {
        let mut config = RemedyConfig::default();
        config.executor.enabled = false;
        config.executor.stage_timeout_secs = 0;
        config.validate().unwrap();
    }

    #[test]
    fn broker_debug_redacts_password() {
        let mut broker = BrokerConfig::default();
        broker.password = "hunter2".to_owned();
        let printed = format!("{broker:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn env_override_applies_to_sections() {
        // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
        unsafe {
            std::env::set_var("REMEDY_BROKER_HOST", "rabbit.prod");
            std::env::set_var("REMEDY_EXECUTOR_STAGE_TIMEOUT_SECS", "15");
            std::env::set_var("REMEDY_CLASSIFIER_WORKER_COUNT", "4");
        }
        let mut config = RemedyConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("REMEDY_BROKER_HOST");
            std::env::remove_var("REMEDY_EXECUTOR_STAGE_TIMEOUT_SECS");
            std::env::remove_var("REMEDY_CLASSIFIER_WORKER_COUNT");
        }
        assert_eq!(config.broker.host, "rabbit.prod");
        assert_eq!(config.executor.stage_timeout_secs, 15);
        assert_eq!(config.classifier.worker_count, 4);
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
        unsafe { std::env::set_var("REMEDY_BROKER_PORT", "not-a-port") };
        let mut config = RemedyConfig::default();
        config.apply_env_overrides();
        unsafe { std::env::remove_var("REMEDY_BROKER_PORT") };
        assert_eq!(config.broker.port, 5672);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = RemedyConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = RemedyConfig::parse(&toml_str).unwrap();
        assert_eq!(config.broker.password, parsed.broker.password);
        assert_eq!(config.executor.remediations_dir, parsed.executor.remediations_dir);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = RemedyConfig::from_file("/nonexistent/path/remedy.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemedyError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
