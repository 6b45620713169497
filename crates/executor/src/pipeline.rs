//! 실행기 파이프라인 -- 인시던트 큐 소비 루프의 생명주기를 관리합니다.
//!
//! [`ExecutorPipeline`]은 core의 [`Pipeline`] trait을 구현합니다.
//! 인시던트는 한 번에 하나씩 순차 처리되며, 동시성은 스테이지 내부에만 존재합니다.
//!
//! ```text
//! (incident queue) -> consume loop -> IncidentExecutor -> ack / nack(requeue)
//!                                            └──▶ (dead-letter queue)
//! ```

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use remedy_core::config::BrokerConfig;
use remedy_core::endpoint::{ConsumeEndpoint, PublishEndpoint, QueueEndpoint};
use remedy_core::error::{PipelineError, RemedyError};
use remedy_core::pipeline::{HealthStatus, Pipeline};
use remedy_core::queue::QueueTransport;

use crate::config::ExecutorSettings;
use crate::error::ExecutorError;
use crate::executor::{Disposition, ExecutorStats, IncidentExecutor};
use crate::runner::CommandRunner;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    Initialized,
    Running,
    Stopped,
}

/// 실행기 파이프라인
pub struct ExecutorPipeline<T> {
    settings: ExecutorSettings,
    broker: BrokerConfig,
    /// 인시던트 큐 구독 채널
    input: Arc<T>,
    /// dead-letter 큐 발행 채널
    dead_letter: Arc<T>,
    state: PipelineState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    stats: Arc<ExecutorStats>,
}

impl<T: QueueTransport> ExecutorPipeline<T> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 실행기 카운터
    pub fn stats(&self) -> &ExecutorStats {
        &self.stats
    }
}

impl<T: QueueTransport> Pipeline for ExecutorPipeline<T> {
    async fn start(&mut self) -> Result<(), RemedyError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(
            remediations_dir = %self.settings.remediations_dir.display(),
            "starting executor"
        );
        if !self.settings.remediations_dir.is_dir() {
            warn!(
                remediations_dir = %self.settings.remediations_dir.display(),
                "remediations directory does not exist, every command will fail"
            );
        }

        let mut dead_letters = PublishEndpoint::new(
            Arc::clone(&self.dead_letter),
            self.broker.clone(),
            self.settings.dead_letter_queue.clone(),
        );
        dead_letters.connect().await?;

        let mut input = ConsumeEndpoint::new(
            Arc::clone(&self.input),
            self.broker.clone(),
            self.settings.incident_queue.clone(),
            self.settings.prefetch,
        );
        if let Err(e) = input.connect().await {
            if let Err(close_err) = dead_letters.close().await {
                debug!(error = %close_err, "dead-letter endpoint close failed");
            }
            return Err(e.into());
        }

        let executor = IncidentExecutor::new(
            Arc::new(CommandRunner::new(self.settings.remediations_dir.clone())),
            self.settings.stage_timeout,
            self.settings.max_delivery_attempts,
            Arc::clone(&self.stats),
        );

        self.cancel = CancellationToken::new();
        self.task = Some(tokio::spawn(run_loop(
            executor,
            input,
            dead_letters,
            self.cancel.clone(),
        )));

        self.state = PipelineState::Running;
        info!(
            queue = %self.settings.incident_queue,
            stage_timeout_secs = self.settings.stage_timeout.as_secs_f64(),
            max_delivery_attempts = self.settings.max_delivery_attempts,
            "executor started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RemedyError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping executor");

        // 진행 중인 스테이지도 취소되어 해당 인시던트는 재큐잉됨
        self.cancel.cancel();
        if let Some(handle) = self.task.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "executor task panicked");
        }

        self.state = PipelineState::Stopped;
        info!(
            acknowledged = self.stats.acknowledged(),
            requeued = self.stats.requeued(),
            "executor stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.task.as_ref().is_some_and(|h| h.is_finished()) {
                    HealthStatus::Unhealthy("incident queue subscription ended".to_owned())
                } else if self.stats.errors() > 0 {
                    HealthStatus::Degraded(format!("{} queue errors", self.stats.errors()))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 인시던트 큐를 순차적으로 소비합니다.
async fn run_loop<T: QueueTransport>(
    executor: IncidentExecutor,
    mut input: ConsumeEndpoint<T>,
    mut dead_letters: PublishEndpoint<T>,
    cancel: CancellationToken,
) {
    info!(queue = %input.queue(), "executor consume loop started");

    loop {
        let delivery = tokio::select! {
            _ = cancel.cancelled() => break,
            delivery = input.recv() => delivery,
        };
        let Some(delivery) = delivery else {
            warn!(queue = %input.queue(), "incident queue subscription ended");
            break;
        };

        match executor.process(delivery, &mut dead_letters, &cancel).await {
            Ok(Disposition::Acknowledged) => {}
            Ok(disposition) => debug!(?disposition, "incident settled"),
            Err(e) => {
                executor.stats().errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "failed to settle incident delivery");
            }
        }
    }

    if let Err(e) = input.close().await {
        debug!(error = %e, "incident endpoint close failed");
    }
    if let Err(e) = dead_letters.close().await {
        debug!(error = %e, "dead-letter endpoint close failed");
    }
    info!("executor consume loop stopped");
}

/// 실행기 파이프라인 빌더
pub struct ExecutorPipelineBuilder<T> {
    settings: ExecutorSettings,
    broker: BrokerConfig,
    transports: Option<(Arc<T>, Arc<T>)>,
}

impl<T: QueueTransport> ExecutorPipelineBuilder<T> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: ExecutorSettings::default(),
            broker: BrokerConfig::default(),
            transports: None,
        }
    }

    /// 실행기 설정을 지정합니다.
    pub fn settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 브로커 연결 설정을 지정합니다.
    pub fn broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = broker;
        self
    }

    /// 입력(인시던트 큐)과 dead-letter 발행 채널을 지정합니다.
    pub fn transports(mut self, input: Arc<T>, dead_letter: Arc<T>) -> Self {
        self.transports = Some((input, dead_letter));
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<ExecutorPipeline<T>, ExecutorError> {
        self.settings.validate()?;
        let (input, dead_letter) = self.transports.ok_or_else(|| ExecutorError::Config {
            field: "transports".to_owned(),
            reason: "input and dead-letter transports are required".to_owned(),
        })?;

        Ok(ExecutorPipeline {
            settings: self.settings,
            broker: self.broker,
            input,
            dead_letter,
            state: PipelineState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
            stats: Arc::new(ExecutorStats::default()),
        })
    }
}

impl<T: QueueTransport> Default for ExecutorPipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
