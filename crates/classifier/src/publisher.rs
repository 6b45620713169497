//! 인시던트 발행기 -- 인시던트 큐의 단일 writer
//!
//! 분류는 병렬로 일어나지만 발행 채널은 동시 사용에 안전하지 않으므로,
//! 모든 인시던트는 이 태스크 하나를 거쳐 순차적으로 발행됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use remedy_core::codec;
use remedy_core::endpoint::{PublishEndpoint, QueueEndpoint};
use remedy_core::metrics as m;
use remedy_core::queue::QueueTransport;
use remedy_core::types::Incident;

use crate::error::ClassifierError;

/// 발행 카운터
#[derive(Debug, Default)]
pub struct PublisherStats {
    /// 발행 성공 수
    pub published: AtomicU64,
    /// 인코딩/발행 실패 수
    pub errors: AtomicU64,
}

impl PublisherStats {
    /// 발행 성공 수
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// 실패 수
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// 인시던트 발행기
pub struct IncidentPublisher<T> {
    endpoint: PublishEndpoint<T>,
    stats: Arc<PublisherStats>,
}

impl<T: QueueTransport> IncidentPublisher<T> {
    /// 연결된 발행 엔드포인트로 발행기를 생성합니다.
    pub fn new(endpoint: PublishEndpoint<T>, stats: Arc<PublisherStats>) -> Self {
        Self { endpoint, stats }
    }

    /// 인시던트 하나를 인코딩하여 발행합니다.
    pub async fn publish(&mut self, incident: &Incident) -> Result<(), ClassifierError> {
        let body = codec::encode(incident)?;
        self.endpoint.publish(body).await?;
        Ok(())
    }

    /// 채널의 모든 송신측이 닫힐 때까지 인시던트를 발행합니다.
    ///
    /// 실패한 인시던트는 로그를 남기고 건너뜁니다. 종료 시 엔드포인트를 닫습니다.
    pub async fn run(mut self, mut incidents: mpsc::Receiver<Incident>) {
        info!(queue = %self.endpoint.queue(), "incident publisher started");

        while let Some(incident) = incidents.recv().await {
            match self.publish(&incident).await {
                Ok(()) => {
                    self.stats.published.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::CLASSIFIER_INCIDENTS_PUBLISHED_TOTAL).increment(1);
                    info!(
                        incident_id = %incident.id,
                        rule = %incident.rule.name,
                        alert_type = %incident.rule.alert_type,
                        "incident published"
                    );
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::CLASSIFIER_PUBLISH_ERRORS_TOTAL).increment(1);
                    warn!(
                        incident_id = %incident.id,
                        rule = %incident.rule.name,
                        error = %e,
                        "failed to publish incident"
                    );
                }
            }
        }

        if let Err(e) = self.endpoint.close().await {
            debug!(error = %e, "incident endpoint close failed");
        }
        info!("incident publisher stopped");
    }
}
