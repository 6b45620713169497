//! 분류기 설정
//!
//! [`ClassifierSettings`]와 [`TailerSettings`]는 core의
//! [`RemedyConfig`]에서 파생되며, 파이프라인 내부에서 쓰는 확장 필드를 더합니다.
//!
//! # 사용 예시
//! ```ignore
//! use remedy_core::config::RemedyConfig;
//! use remedy_classifier::config::ClassifierSettings;
//!
//! let core = RemedyConfig::default();
//! let settings = ClassifierSettings::from_core(&core);
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use remedy_core::config::RemedyConfig;

use crate::error::ClassifierError;

/// 워커 수 상한
const MAX_WORKER_COUNT: usize = 1024;
/// 채널 용량 상한
const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

/// 분류기 파이프라인 설정
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    /// 활성화 여부
    pub enabled: bool,
    /// 룰 정의 YAML 파일 경로
    pub rules_file: PathBuf,
    /// 워커 풀 크기
    pub worker_count: usize,
    /// 인테이크 채널 용량
    pub intake_capacity: usize,
    /// 인시던트 엔진 태그
    pub engine: String,
    /// 원시 로그 큐 이름
    pub log_queue: String,
    /// 인시던트 큐 이름
    pub incident_queue: String,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 워커 → 발행기 채널 용량
    pub publish_capacity: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rules_file: PathBuf::from("/etc/remedy/rules.yaml"),
            worker_count: 10,
            intake_capacity: 1024,
            engine: "SYSLOGPROC".to_owned(),
            log_queue: "log".to_owned(),
            incident_queue: "incident".to_owned(),
            publish_capacity: 1024,
        }
    }
}

impl ClassifierSettings {
    /// core 설정에서 분류기 설정을 생성합니다.
    pub fn from_core(core: &RemedyConfig) -> Self {
        Self {
            enabled: core.classifier.enabled,
            rules_file: PathBuf::from(&core.classifier.rules_file),
            worker_count: core.classifier.worker_count,
            intake_capacity: core.classifier.intake_capacity,
            engine: core.classifier.engine.clone(),
            log_queue: core.broker.log_queue.clone(),
            incident_queue: core.broker.incident_queue.clone(),
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKER_COUNT {
            return Err(ClassifierError::Config {
                field: "worker_count".to_owned(),
                reason: format!("must be 1-{MAX_WORKER_COUNT}"),
            });
        }

        for (field, value) in [
            ("intake_capacity", self.intake_capacity),
            ("publish_capacity", self.publish_capacity),
        ] {
            if value == 0 || value > MAX_CHANNEL_CAPACITY {
                return Err(ClassifierError::Config {
                    field: field.to_owned(),
                    reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
                });
            }
        }

        if self.engine.trim().is_empty() {
            return Err(ClassifierError::Config {
                field: "engine".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.log_queue.is_empty() || self.incident_queue.is_empty() {
            return Err(ClassifierError::Config {
                field: "queue".to_owned(),
                reason: "queue names must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// 분류기 설정 빌더
#[derive(Default)]
pub struct ClassifierSettingsBuilder {
    settings: ClassifierSettings,
}

impl ClassifierSettingsBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 룰 파일 경로를 설정합니다.
    pub fn rules_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.rules_file = path.into();
        self
    }

    /// 워커 수를 설정합니다.
    pub fn worker_count(mut self, count: usize) -> Self {
        self.settings.worker_count = count;
        self
    }

    /// 인테이크 채널 용량을 설정합니다.
    pub fn intake_capacity(mut self, capacity: usize) -> Self {
        self.settings.intake_capacity = capacity;
        self
    }

    /// 엔진 태그를 설정합니다.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.settings.engine = engine.into();
        self
    }

    /// 입출력 큐 이름을 설정합니다.
    pub fn queues(mut self, log_queue: impl Into<String>, incident_queue: impl Into<String>) -> Self {
        self.settings.log_queue = log_queue.into();
        self.settings.incident_queue = incident_queue.into();
        self
    }

    /// 설정을 검증하고 `ClassifierSettings`를 생성합니다.
    pub fn build(self) -> Result<ClassifierSettings, ClassifierError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

/// 테일러 설정
#[derive(Debug, Clone)]
pub struct TailerSettings {
    /// 파일 테일러 활성화 여부
    pub file_enabled: bool,
    /// 감시할 파일 경로
    pub syslog_file: PathBuf,
    /// 파일 처음부터 읽을지 여부
    pub read_from_start: bool,
    /// 파일 폴링 주기
    pub poll_interval: Duration,
    /// UDP syslog 수신 활성화 여부
    pub udp_enabled: bool,
    /// TCP syslog 수신 활성화 여부
    pub tcp_enabled: bool,
    /// syslog 수신 주소
    pub listen_address: String,
    /// 원시 로그 큐 이름
    pub log_queue: String,

    // --- 확장 설정 ---
    /// 최대 라인/메시지 길이 (바이트)
    pub max_line_length: usize,
    /// TCP 최대 동시 연결 수
    pub max_connections: usize,
    /// 테일러 → 발행 태스크 채널 용량
    pub forward_capacity: usize,
}

impl Default for TailerSettings {
    fn default() -> Self {
        Self {
            file_enabled: true,
            syslog_file: PathBuf::from("/var/log/syslog"),
            read_from_start: false,
            poll_interval: Duration::from_millis(500),
            udp_enabled: false,
            tcp_enabled: false,
            listen_address: "0.0.0.0:514".to_owned(),
            log_queue: "log".to_owned(),
            max_line_length: 64 * 1024, // 64KB
            max_connections: 256,
            forward_capacity: 1024,
        }
    }
}

impl TailerSettings {
    /// core 설정에서 테일러 설정을 생성합니다.
    pub fn from_core(core: &RemedyConfig) -> Self {
        Self {
            file_enabled: core.sources.file_enabled,
            syslog_file: PathBuf::from(&core.sources.syslog_file),
            read_from_start: core.sources.read_from_start,
            poll_interval: core.sources.poll_interval(),
            udp_enabled: core.sources.udp_enabled,
            tcp_enabled: core.sources.tcp_enabled,
            listen_address: core.sources.listen_address(),
            log_queue: core.broker.log_queue.clone(),
            ..Self::default()
        }
    }

    /// 활성화된 소스가 하나라도 있는지 확인합니다.
    pub fn any_enabled(&self) -> bool {
        self.file_enabled || self.udp_enabled || self.tcp_enabled
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.file_enabled {
            validate_source_path(&self.syslog_file)?;
            if self.poll_interval.is_zero() {
                return Err(ClassifierError::Config {
                    field: "poll_interval_ms".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if (self.udp_enabled || self.tcp_enabled) && self.listen_address.is_empty() {
            return Err(ClassifierError::Config {
                field: "listen_address".to_owned(),
                reason: "must not be empty when a network source is enabled".to_owned(),
            });
        }

        if self.max_line_length == 0 || self.forward_capacity == 0 || self.max_connections == 0 {
            return Err(ClassifierError::Config {
                field: "tailer".to_owned(),
                reason: "limits must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 감시 파일 경로가 안전한지 검증합니다.
///
/// 절대 경로여야 하며 `..` 컴포넌트를 포함할 수 없습니다.
fn validate_source_path(path: &Path) -> Result<(), ClassifierError> {
    if path.as_os_str().is_empty() {
        return Err(ClassifierError::Config {
            field: "syslog_file".to_owned(),
            reason: "path must not be empty".to_owned(),
        });
    }

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ClassifierError::Config {
            field: "syslog_file".to_owned(),
            reason: format!("path '{}' contains '..'", path.display()),
        });
    }

    if !path.is_absolute() {
        return Err(ClassifierError::Config {
            field: "syslog_file".to_owned(),
            reason: format!("path '{}' must be absolute", path.display()),
        });
    }

    Ok(())
}
