//! Remedy 공통 크레이트
//!
//! 자동 조치 파이프라인의 모든 모듈이 공유하는 타입, 큐 전송 추상화,
//! 에러, 설정, 생명주기 trait을 제공합니다.
//!
//! ```text
//! raw text ─▶ classifier ─▶ Incident ─▶ (queue) ─▶ executor ─▶ scripts
//! ```

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{CodecError, ConfigError, PipelineError, QueueError, RemedyError};

// 설정
pub use config::RemedyConfig;

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 큐 전송
pub use endpoint::{ConsumeEndpoint, PublishEndpoint, QueueEndpoint};
pub use queue::{Delivery, DeliveryStream, MemoryBroker, MemoryChannel, QueueTransport};

// 도메인 타입
pub use types::{Command, Incident, Rule, Stage};
