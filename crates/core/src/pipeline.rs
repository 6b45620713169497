//! 파이프라인 trait -- 모듈 생명주기 정의
//!
//! 분류기, 실행기, 테일러는 모두 [`Pipeline`]을 구현하고
//! 데몬은 [`DynPipeline`]을 통해 이들을 동적으로 관리합니다.

use std::future::Future;
use std::pin::Pin;

use crate::error::RemedyError;

/// `Send` 가능한 박싱된 future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작은 하지만 일부 기능이 저하됨
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 모든 장기 실행 모듈이 구현하는 생명주기 trait
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다. 백그라운드 태스크를 spawn 하고 즉시 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), RemedyError>> + Send;

    /// 모듈을 정지합니다. 진행 중인 작업을 정리하고 태스크 종료를 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), RemedyError>> + Send;

    /// 모듈의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
///
/// `Pipeline`은 RPITIT를 사용하므로 `dyn Pipeline`이 불가합니다.
/// `DynPipeline`은 `BoxFuture`를 반환하여 `Box<dyn DynPipeline>`으로
/// 모듈을 동적 관리할 수 있게 합니다.
pub trait DynPipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), RemedyError>>;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), RemedyError>>;

    /// 모듈의 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Pipeline을 구현한 타입은 자동으로 DynPipeline도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), RemedyError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), RemedyError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct Toggle {
        running: bool,
    }

    impl Pipeline for Toggle {
        async fn start(&mut self) -> Result<(), RemedyError> {
            if self.running {
                return Err(PipelineError::AlreadyRunning.into());
            }
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), RemedyError> {
            if !self.running {
                return Err(PipelineError::NotRunning.into());
            }
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn dyn_pipeline_delegates_to_pipeline() {
        let mut module: Box<dyn DynPipeline> = Box::new(Toggle { running: false });
        assert!(module.health_check().await.is_unhealthy());

        module.start().await.unwrap();
        assert!(module.health_check().await.is_healthy());
        assert!(module.start().await.is_err());

        module.stop().await.unwrap();
        assert!(module.stop().await.is_err());
    }

    #[test]
    fn degraded_is_neither_healthy_nor_unhealthy() {
        let status = HealthStatus::Degraded("slow".to_owned());
        assert!(!status.is_healthy());
        assert!(!status.is_unhealthy());
    }
}
