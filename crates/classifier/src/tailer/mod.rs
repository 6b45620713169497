//! 원시 로그 테일러 -- 여러 소스에서 텍스트를 받아 로그 큐로 발행합니다.
//!
//! # 소스
//! - [`FileTailer`]: 파일 감시 (`tail -f` 방식)
//! - [`SyslogUdpTailer`]: UDP syslog 수신 (데이터그램 하나가 메시지 하나)
//! - [`SyslogTcpTailer`]: TCP syslog 수신 (개행 구분)
//!
//! # 아키텍처
//! 각 소스는 자체 tokio 태스크에서 실행되며 수집한 [`RawLog`]를
//! mpsc 채널로 보냅니다. 발행 태스크 하나가 채널을 비우며 로그 큐로 발행합니다.
//!
//! ```text
//! FileTailer ──────┐
//! SyslogUdpTailer ─┼─▶ mpsc<RawLog> ─▶ forwarder ─▶ (log queue)
//! SyslogTcpTailer ─┘
//! ```

pub mod file;
pub mod syslog_tcp;
pub mod syslog_udp;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use remedy_core::config::BrokerConfig;
use remedy_core::endpoint::{PublishEndpoint, QueueEndpoint};
use remedy_core::error::{PipelineError, RemedyError};
use remedy_core::metrics as m;
use remedy_core::pipeline::{HealthStatus, Pipeline};
use remedy_core::queue::QueueTransport;

pub use file::FileTailer;
pub use syslog_tcp::SyslogTcpTailer;
pub use syslog_udp::SyslogUdpTailer;

use crate::config::TailerSettings;
use crate::error::ClassifierError;

/// 수집된 원시 로그
#[derive(Debug, Clone)]
pub struct RawLog {
    /// 원시 로그 바이트 (개행 제외)
    pub data: Bytes,
    /// 수집 소스 유형 (file, syslog_udp, syslog_tcp)
    pub source: &'static str,
}

impl RawLog {
    /// 새 RawLog를 생성합니다.
    pub fn new(data: impl Into<Bytes>, source: &'static str) -> Self {
        Self {
            data: data.into(),
            source,
        }
    }
}

/// 테일러 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum TailerState {
    Initialized,
    Running,
    Stopped,
}

/// 테일러 발행 카운터
#[derive(Debug, Default)]
pub struct TailerStats {
    /// 발행된 라인 수
    pub published: AtomicU64,
    /// 발행 실패 수
    pub errors: AtomicU64,
}

/// 테일러 파이프라인 -- 설정된 소스들과 로그 큐 발행 태스크를 관리합니다.
pub struct TailerPipeline<T> {
    settings: TailerSettings,
    broker: BrokerConfig,
    transport: Arc<T>,
    state: TailerState,
    cancel: CancellationToken,
    sources: Vec<(&'static str, JoinHandle<()>)>,
    forwarder: Option<JoinHandle<()>>,
    stats: Arc<TailerStats>,
}

impl<T: QueueTransport> TailerPipeline<T> {
    /// 새 테일러 파이프라인을 생성합니다.
    ///
    /// `transport`는 이 파이프라인 전용 채널이어야 합니다.
    pub fn new(
        settings: TailerSettings,
        broker: BrokerConfig,
        transport: Arc<T>,
    ) -> Result<Self, ClassifierError> {
        settings.validate()?;
        Ok(Self {
            settings,
            broker,
            transport,
            state: TailerState::Initialized,
            cancel: CancellationToken::new(),
            sources: Vec::new(),
            forwarder: None,
            stats: Arc::new(TailerStats::default()),
        })
    }

    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            TailerState::Initialized => "initialized",
            TailerState::Running => "running",
            TailerState::Stopped => "stopped",
        }
    }

    /// 로그 큐로 발행된 라인 수
    pub fn published_count(&self) -> u64 {
        self.stats.published.load(Ordering::Relaxed)
    }

    /// 발행 실패 수
    pub fn error_count(&self) -> u64 {
        self.stats.errors.load(Ordering::Relaxed)
    }

    async fn spawn_sources(&mut self, tx: &mpsc::Sender<RawLog>) -> Result<(), ClassifierError> {
        if self.settings.file_enabled {
            let tailer = FileTailer::new(
                self.settings.syslog_file.clone(),
                self.settings.read_from_start,
                self.settings.poll_interval,
                self.settings.max_line_length,
            );
            let (tx, cancel) = (tx.clone(), self.cancel.clone());
            self.sources.push((
                file::SOURCE_TYPE,
                tokio::spawn(async move {
                    if let Err(e) = tailer.run(tx, cancel).await {
                        error!(source = file::SOURCE_TYPE, error = %e, "tailer stopped with error");
                    }
                }),
            ));
        }

        if self.settings.udp_enabled {
            let tailer =
                SyslogUdpTailer::bind(&self.settings.listen_address, self.settings.max_line_length)
                    .await?;
            let (tx, cancel) = (tx.clone(), self.cancel.clone());
            self.sources.push((
                syslog_udp::SOURCE_TYPE,
                tokio::spawn(async move {
                    if let Err(e) = tailer.run(tx, cancel).await {
                        error!(source = syslog_udp::SOURCE_TYPE, error = %e, "tailer stopped with error");
                    }
                }),
            ));
        }

        if self.settings.tcp_enabled {
            let tailer = SyslogTcpTailer::bind(
                &self.settings.listen_address,
                self.settings.max_connections,
                self.settings.max_line_length,
            )
            .await?;
            let (tx, cancel) = (tx.clone(), self.cancel.clone());
            self.sources.push((
                syslog_tcp::SOURCE_TYPE,
                tokio::spawn(async move {
                    if let Err(e) = tailer.run(tx, cancel).await {
                        error!(source = syslog_tcp::SOURCE_TYPE, error = %e, "tailer stopped with error");
                    }
                }),
            ));
        }

        Ok(())
    }
}

impl<T: QueueTransport> Pipeline for TailerPipeline<T> {
    async fn start(&mut self) -> Result<(), RemedyError> {
        if self.state == TailerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting tailers");
        self.cancel = CancellationToken::new();

        let mut endpoint = PublishEndpoint::new(
            Arc::clone(&self.transport),
            self.broker.clone(),
            self.settings.log_queue.clone(),
        );
        endpoint.connect().await?;

        let (tx, rx) = mpsc::channel(self.settings.forward_capacity);
        if let Err(e) = self.spawn_sources(&tx).await {
            self.cancel.cancel();
            for (_, handle) in self.sources.drain(..) {
                handle.abort();
            }
            if let Err(close_err) = endpoint.close().await {
                debug!(error = %close_err, "log endpoint close failed");
            }
            return Err(e.into());
        }
        drop(tx);

        self.forwarder = Some(tokio::spawn(forward(endpoint, rx, Arc::clone(&self.stats))));
        self.state = TailerState::Running;
        info!(sources = self.sources.len(), "tailers started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RemedyError> {
        if self.state != TailerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping tailers");
        self.cancel.cancel();

        for (source, handle) in self.sources.drain(..) {
            if let Err(e) = handle.await {
                warn!(source, error = %e, "tailer task panicked");
            }
        }
        // 모든 소스가 끝나면 송신측이 닫혀 forwarder가 남은 로그를 비우고 종료
        if let Some(handle) = self.forwarder.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "log forwarder panicked");
        }

        self.state = TailerState::Stopped;
        info!(published = self.published_count(), "tailers stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            TailerState::Running => {
                let dead: Vec<&str> = self
                    .sources
                    .iter()
                    .filter(|(_, handle)| handle.is_finished())
                    .map(|(source, _)| *source)
                    .collect();
                if !dead.is_empty() {
                    HealthStatus::Degraded(format!("tailer stopped: {}", dead.join(", ")))
                } else if self.error_count() > 0 {
                    HealthStatus::Degraded(format!("{} publish errors", self.error_count()))
                } else {
                    HealthStatus::Healthy
                }
            }
            TailerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            TailerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수집된 로그를 로그 큐로 발행합니다. 발행 실패는 기록 후 계속합니다.
async fn forward<T: QueueTransport>(
    mut endpoint: PublishEndpoint<T>,
    mut rx: mpsc::Receiver<RawLog>,
    stats: Arc<TailerStats>,
) {
    while let Some(raw) = rx.recv().await {
        match endpoint.publish(raw.data).await {
            Ok(()) => {
                stats.published.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::TAILER_LINES_PUBLISHED_TOTAL, m::LABEL_SOURCE => raw.source)
                    .increment(1);
            }
            Err(e) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::TAILER_PUBLISH_ERRORS_TOTAL, m::LABEL_SOURCE => raw.source)
                    .increment(1);
                warn!(source = raw.source, error = %e, "failed to publish raw log");
            }
        }
    }

    if let Err(e) = endpoint.close().await {
        debug!(error = %e, "log endpoint close failed");
    }
}

/// 라인 끝의 `\r\n`/`\n`을 제거한 바이트를 반환합니다. 빈 라인은 `None`입니다.
pub(crate) fn trim_line(line: &[u8]) -> Option<&[u8]> {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    let trimmed = &line[..end];
    if trimmed.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(trimmed)
    }
}
