//! Remedy 실행기 -- 인시던트마다 감사/조치 스크립트를 스테이지 순서로 실행합니다.
//!
//! # 모듈 구성
//!
//! - [`runner`]: 스크립트 하나의 실행과 결과 분류
//! - [`stage`]: 스테이지 단위 동시 실행과 공유 데드라인
//! - [`executor`]: 스테이지 상태 머신과 ack/nack/dead-letter 정산
//! - [`pipeline`]: 인시던트 큐 소비 루프 (Pipeline trait 구현)
//! - [`config`]: 실행기 설정
//! - [`error`]: 도메인 에러 타입

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod runner;
pub mod stage;

pub use config::ExecutorSettings;
pub use error::ExecutorError;
pub use executor::{Disposition, ExecutionReport, ExecutorStats, IncidentExecutor, IncidentState};
pub use pipeline::{ExecutorPipeline, ExecutorPipelineBuilder};
pub use runner::{CommandResult, CommandRunner, ExitClass, RunnerError, StructuredOutput};
pub use stage::{CommandReport, StageOutcome, run_stage};
