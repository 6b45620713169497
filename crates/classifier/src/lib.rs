//! Remedy 분류기 -- 원시 로그를 룰과 대조하여 인시던트를 발행합니다.
//!
//! # 모듈 구성
//!
//! - [`rule`]: YAML 룰 로더와 정규식 컴파일러
//! - [`classifier`]: 첫 매칭 우선 분류와 고정 크기 워커 풀
//! - [`publisher`]: 인시던트 큐의 단일 writer
//! - [`pipeline`]: 인테이크/워커/발행기 오케스트레이션 (Pipeline trait 구현)
//! - [`tailer`]: 파일, syslog UDP/TCP에서 로그 큐로 원시 텍스트 발행
//! - [`config`]: 분류기/테일러 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Tailers -> (log queue) -> intake -> WorkerPool -> IncidentPublisher -> (incident queue)
//!                                        |
//!                                  CompiledRules (first match wins)
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publisher;
pub mod rule;
pub mod tailer;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{ClassifierPipeline, ClassifierPipelineBuilder};

// 설정
pub use config::{ClassifierSettings, ClassifierSettingsBuilder, TailerSettings};

// 에러
pub use error::ClassifierError;

// 분류
pub use classifier::{WorkerPool, classify};

// 룰
pub use rule::{CompiledRules, RuleLoader, RuleMatch};

// 테일러
pub use tailer::{RawLog, TailerPipeline};
