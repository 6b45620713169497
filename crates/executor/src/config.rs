//! 실행기 설정
//!
//! [`ExecutorSettings`]는 core의 [`RemedyConfig`]에서 파생됩니다.

use std::path::PathBuf;
use std::time::Duration;

use remedy_core::config::RemedyConfig;

use crate::error::ExecutorError;

/// 스테이지 타임아웃 상한
const MAX_STAGE_TIMEOUT: Duration = Duration::from_secs(3600);

/// 인시던트 실행기 설정
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// 활성화 여부
    pub enabled: bool,
    /// 조치/감사 스크립트 디렉토리
    pub remediations_dir: PathBuf,
    /// 스테이지 전체가 공유하는 타임아웃
    pub stage_timeout: Duration,
    /// 인시던트 큐 prefetch
    pub prefetch: u16,
    /// 최대 전달 횟수 (0이면 무제한)
    pub max_delivery_attempts: u32,
    /// 인시던트 큐 이름
    pub incident_queue: String,
    /// dead-letter 큐 이름
    pub dead_letter_queue: String,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            remediations_dir: PathBuf::from("/etc/remedy/remediations"),
            stage_timeout: Duration::from_secs(60),
            prefetch: 1,
            max_delivery_attempts: 10,
            incident_queue: "incident".to_owned(),
            dead_letter_queue: "incident.dead".to_owned(),
        }
    }
}

impl ExecutorSettings {
    /// core 설정에서 실행기 설정을 생성합니다.
    pub fn from_core(core: &RemedyConfig) -> Self {
        Self {
            enabled: core.executor.enabled,
            remediations_dir: PathBuf::from(&core.executor.remediations_dir),
            stage_timeout: core.executor.stage_timeout(),
            prefetch: core.executor.prefetch,
            max_delivery_attempts: core.executor.max_delivery_attempts,
            incident_queue: core.broker.incident_queue.clone(),
            dead_letter_queue: core.broker.dead_letter_queue.clone(),
        }
    }

    /// 테스트 등에서 짧은 타임아웃을 쓰기 위한 헬퍼
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// 스크립트 디렉토리를 지정합니다.
    pub fn with_remediations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.remediations_dir = dir.into();
        self
    }

    /// 최대 전달 횟수를 지정합니다.
    pub fn with_max_delivery_attempts(mut self, attempts: u32) -> Self {
        self.max_delivery_attempts = attempts;
        self
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.stage_timeout.is_zero() || self.stage_timeout > MAX_STAGE_TIMEOUT {
            return Err(ExecutorError::Config {
                field: "stage_timeout".to_owned(),
                reason: format!("must be between 1ms and {}s", MAX_STAGE_TIMEOUT.as_secs()),
            });
        }

        if self.prefetch == 0 {
            return Err(ExecutorError::Config {
                field: "prefetch".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.remediations_dir.as_os_str().is_empty() {
            return Err(ExecutorError::Config {
                field: "remediations_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.incident_queue.is_empty() || self.dead_letter_queue.is_empty() {
            return Err(ExecutorError::Config {
                field: "queue".to_owned(),
                reason: "queue names must not be empty".to_owned(),
            });
        }

        if self.incident_queue == self.dead_letter_queue {
            return Err(ExecutorError::Config {
                field: "dead_letter_queue".to_owned(),
                reason: "must differ from incident_queue".to_owned(),
            });
        }

        Ok(())
    }
}
