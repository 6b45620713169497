//! 분류기 파이프라인 -- 인테이크, 워커 풀, 발행기의 전체 흐름을 관리합니다.
//!
//! [`ClassifierPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `remedy-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! (log queue) -> intake -> mpsc<String> -> WorkerPool -> mpsc<Incident> -> IncidentPublisher -> (incident queue)
//! ```
//!
//! 인테이크는 prefetch 1로 로그 큐를 구독하며, 본문을 인테이크 채널에 넘긴 뒤 ack합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use remedy_core::config::BrokerConfig;
use remedy_core::endpoint::{ConsumeEndpoint, PublishEndpoint, QueueEndpoint};
use remedy_core::error::{PipelineError, RemedyError};
use remedy_core::metrics as m;
use remedy_core::pipeline::{HealthStatus, Pipeline};
use remedy_core::queue::QueueTransport;

use crate::classifier::{ClassifierStats, WorkerPool};
use crate::config::ClassifierSettings;
use crate::error::ClassifierError;
use crate::publisher::{IncidentPublisher, PublisherStats};
use crate::rule::{CompiledRules, RuleLoader};

/// 로그 큐 구독 prefetch
const INTAKE_PREFETCH: u16 = 1;
/// 정지 시 워커가 인테이크 채널을 비우기를 기다리는 최대 시간
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 분류기 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use remedy_classifier::ClassifierPipelineBuilder;
///
/// let mut classifier = ClassifierPipelineBuilder::new()
///     .settings(settings)
///     .broker(broker_config)
///     .transports(Arc::new(broker.channel()), Arc::new(broker.channel()))
///     .build()?;
///
/// classifier.start().await?;
/// ```
pub struct ClassifierPipeline<T> {
    settings: ClassifierSettings,
    broker: BrokerConfig,
    /// 로그 큐 구독 채널
    input: Arc<T>,
    /// 인시던트 큐 발행 채널
    output: Arc<T>,
    state: PipelineState,
    rules: Option<Arc<CompiledRules>>,
    /// 인테이크 종료 신호
    intake_cancel: CancellationToken,
    /// 워커 강제 종료 신호 (드레인 타임아웃 시)
    worker_cancel: CancellationToken,
    intake: Option<JoinHandle<()>>,
    workers: Option<WorkerPool>,
    publisher: Option<JoinHandle<()>>,
    classifier_stats: Arc<ClassifierStats>,
    publisher_stats: Arc<PublisherStats>,
}

impl<T: QueueTransport> ClassifierPipeline<T> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 평가한 라인 수
    pub fn processed_count(&self) -> u64 {
        self.classifier_stats.lines()
    }

    /// 룰에 매칭된 라인 수
    pub fn matched_count(&self) -> u64 {
        self.classifier_stats.matched()
    }

    /// 발행된 인시던트 수
    pub fn published_count(&self) -> u64 {
        self.publisher_stats.published()
    }

    /// 활성 룰 수 (시작 전이면 0)
    pub fn rule_count(&self) -> usize {
        self.rules.as_ref().map_or(0, |r| r.active_count())
    }

    /// 컴파일된 룰 (시작 전에 지정하지 않았다면 시작 후에만 존재)
    pub fn rules(&self) -> Option<&Arc<CompiledRules>> {
        self.rules.as_ref()
    }

    async fn load_rules(&mut self) -> Result<Arc<CompiledRules>, ClassifierError> {
        if let Some(rules) = &self.rules {
            return Ok(Arc::clone(rules));
        }
        let definitions = RuleLoader::load_file(&self.settings.rules_file).await?;
        let rules = Arc::new(CompiledRules::compile(definitions));
        self.rules = Some(Arc::clone(&rules));
        Ok(rules)
    }
}

impl<T: QueueTransport> Pipeline for ClassifierPipeline<T> {
    async fn start(&mut self) -> Result<(), RemedyError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting classifier");

        // 1. 룰 로드 및 컴파일
        let rules = self.load_rules().await?;
        metrics::gauge!(m::CLASSIFIER_RULES_LOADED).set(rules.active_count() as f64);
        if rules.is_empty() {
            warn!("no active rules, every line will be dropped");
        }

        // 2. 출력 → 입력 순서로 연결 (소비 시작 전에 발행 경로 확보)
        let mut output = PublishEndpoint::new(
            Arc::clone(&self.output),
            self.broker.clone(),
            self.settings.incident_queue.clone(),
        );
        output.connect().await?;

        let mut input = ConsumeEndpoint::new(
            Arc::clone(&self.input),
            self.broker.clone(),
            self.settings.log_queue.clone(),
            INTAKE_PREFETCH,
        );
        if let Err(e) = input.connect().await {
            if let Err(close_err) = output.close().await {
                debug!(error = %close_err, "incident endpoint close failed");
            }
            return Err(e.into());
        }

        // 3. 태스크 스폰
        self.intake_cancel = CancellationToken::new();
        self.worker_cancel = CancellationToken::new();

        let (incident_tx, incident_rx) = mpsc::channel(self.settings.publish_capacity);
        let publisher = IncidentPublisher::new(output, Arc::clone(&self.publisher_stats));
        self.publisher = Some(tokio::spawn(publisher.run(incident_rx)));

        let (line_tx, line_rx) = mpsc::channel(self.settings.intake_capacity);
        self.workers = Some(WorkerPool::spawn(
            self.settings.worker_count,
            rules,
            Arc::from(self.settings.engine.as_str()),
            line_rx,
            incident_tx,
            Arc::clone(&self.classifier_stats),
            self.worker_cancel.clone(),
        ));

        self.intake = Some(tokio::spawn(run_intake(
            input,
            line_tx,
            self.intake_cancel.clone(),
        )));

        self.state = PipelineState::Running;
        info!(
            workers = self.settings.worker_count,
            rules = self.rule_count(),
            "classifier started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RemedyError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping classifier");

        // 1. 인테이크 중단 -> 인테이크 채널 송신측이 닫힘
        self.intake_cancel.cancel();
        if let Some(handle) = self.intake.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "intake task panicked");
        }

        // 2. 워커가 남은 라인을 처리하도록 대기, 시간 초과 시 강제 종료
        if let Some(workers) = self.workers.take() {
            let cancel = self.worker_cancel.clone();
            let drain = workers.join();
            tokio::pin!(drain);
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut drain).await.is_err() {
                warn!("classifier workers did not drain in time, cancelling");
                cancel.cancel();
                drain.await;
            }
        }

        // 3. 워커가 모두 끝나면 인시던트 채널이 닫혀 발행기가 종료
        if let Some(handle) = self.publisher.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "incident publisher panicked");
        }

        self.state = PipelineState::Stopped;
        info!(
            processed = self.processed_count(),
            published = self.published_count(),
            "classifier stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.intake.as_ref().is_some_and(|h| h.is_finished()) {
                    HealthStatus::Unhealthy("log queue subscription ended".to_owned())
                } else if self.publisher.as_ref().is_some_and(|h| h.is_finished()) {
                    HealthStatus::Unhealthy("incident publisher stopped".to_owned())
                } else if self.publisher_stats.errors() > 0 {
                    HealthStatus::Degraded(format!(
                        "{} incident publish errors",
                        self.publisher_stats.errors()
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 큐의 delivery를 인테이크 채널로 넘기고 ack합니다.
async fn run_intake<T: QueueTransport>(
    mut input: ConsumeEndpoint<T>,
    lines: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    info!(queue = %input.queue(), "classifier intake started");

    loop {
        let delivery = tokio::select! {
            _ = cancel.cancelled() => break,
            delivery = input.recv() => delivery,
        };
        let Some(delivery) = delivery else {
            warn!(queue = %input.queue(), "log queue subscription ended");
            break;
        };

        let line = String::from_utf8_lossy(&delivery.body).into_owned();
        // 넘기기 전에 취소되면 delivery는 ack되지 않고 드롭되어 재큐잉됨
        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = lines.send(line) => sent,
        };
        if sent.is_err() {
            debug!("intake channel closed");
            break;
        }

        if let Err(e) = delivery.ack(false).await {
            warn!(error = %e, "failed to ack log delivery");
        }
    }

    if let Err(e) = input.close().await {
        debug!(error = %e, "log endpoint close failed");
    }
    info!("classifier intake stopped");
}

/// 분류기 파이프라인 빌더
pub struct ClassifierPipelineBuilder<T> {
    settings: ClassifierSettings,
    broker: BrokerConfig,
    transports: Option<(Arc<T>, Arc<T>)>,
    rules: Option<CompiledRules>,
}

impl<T: QueueTransport> ClassifierPipelineBuilder<T> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: ClassifierSettings::default(),
            broker: BrokerConfig::default(),
            transports: None,
            rules: None,
        }
    }

    /// 분류기 설정을 지정합니다.
    pub fn settings(mut self, settings: ClassifierSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 브로커 연결 설정을 지정합니다.
    pub fn broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = broker;
        self
    }

    /// 입력(로그 큐)과 출력(인시던트 큐) 채널을 지정합니다.
    ///
    /// 발행 채널은 동시 사용에 안전하지 않으므로 서로 다른 채널이어야 합니다.
    pub fn transports(mut self, input: Arc<T>, output: Arc<T>) -> Self {
        self.transports = Some((input, output));
        self
    }

    /// 이미 컴파일된 룰을 지정합니다. 지정하면 시작 시 룰 파일을 읽지 않습니다.
    pub fn rules(mut self, rules: CompiledRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<ClassifierPipeline<T>, ClassifierError> {
        self.settings.validate()?;
        let (input, output) = self.transports.ok_or_else(|| ClassifierError::Config {
            field: "transports".to_owned(),
            reason: "input and output transports are required".to_owned(),
        })?;

        Ok(ClassifierPipeline {
            settings: self.settings,
            broker: self.broker,
            input,
            output,
            state: PipelineState::Initialized,
            rules: self.rules.map(Arc::new),
            intake_cancel: CancellationToken::new(),
            worker_cancel: CancellationToken::new(),
            intake: None,
            workers: None,
            publisher: None,
            classifier_stats: Arc::new(ClassifierStats::default()),
            publisher_stats: Arc::new(PublisherStats::default()),
        })
    }
}

impl<T: QueueTransport> Default for ClassifierPipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
