//! 인시던트 실행기 -- 스테이지 상태 머신과 delivery 정산
//!
//! ```text
//! PreAudit ──▶ Remediation ──▶ PostAudit ──▶ Acknowledged
//!    │              │               │
//!    └──────────────┴───────────────┴──▶ Rejected(stage)
//! ```
//!
//! delivery 정산 규칙:
//! - 디코딩 실패: 재큐잉 없이 nack (폐기)
//! - 전달 횟수 초과: dead-letter 큐로 발행 후 ack
//! - 스테이지 실패: 재큐잉 nack
//! - 세 스테이지 모두 통과: ack

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use remedy_core::codec;
use remedy_core::endpoint::PublishEndpoint;
use remedy_core::metrics as m;
use remedy_core::queue::{Delivery, QueueTransport};
use remedy_core::types::{Incident, Stage};

use crate::error::ExecutorError;
use crate::runner::CommandRunner;
use crate::stage::{StageOutcome, run_stage};

/// 인시던트 처리 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentState {
    /// 사전 감사 실행 중
    PreAudit,
    /// 조치 실행 중
    Remediation,
    /// 사후 감사 실행 중
    PostAudit,
    /// 모든 스테이지 통과
    Acknowledged,
    /// 해당 스테이지에서 실패
    Rejected(Stage),
}

impl IncidentState {
    fn running(stage: Stage) -> Self {
        match stage {
            Stage::PreAudit => Self::PreAudit,
            Stage::Remediation => Self::Remediation,
            Stage::PostAudit => Self::PostAudit,
        }
    }

    /// 종료 상태인지 여부
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::Rejected(_))
    }
}

/// 인시던트 하나의 실행 결과
#[derive(Debug)]
pub struct ExecutionReport {
    /// 최종 상태
    pub state: IncidentState,
    /// 실행된 스테이지 결과 (실패한 스테이지까지)
    pub stages: Vec<StageOutcome>,
}

/// delivery 정산 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 모든 스테이지 통과, ack
    Acknowledged,
    /// 스테이지 실패, 재큐잉
    Requeued(Stage),
    /// 디코딩 실패, 폐기
    Discarded,
    /// 전달 횟수 초과, dead-letter 큐로 이동
    DeadLettered,
}

/// 실행기 카운터
#[derive(Debug, Default)]
pub struct ExecutorStats {
    /// ack된 인시던트 수
    pub acknowledged: AtomicU64,
    /// 재큐잉된 인시던트 수
    pub requeued: AtomicU64,
    /// 폐기된 메시지 수
    pub discarded: AtomicU64,
    /// dead-letter 큐로 옮긴 인시던트 수
    pub dead_lettered: AtomicU64,
    /// 큐 연산 실패 수
    pub errors: AtomicU64,
}

impl ExecutorStats {
    /// ack된 인시던트 수
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Relaxed)
    }

    /// 재큐잉된 인시던트 수
    pub fn requeued(&self) -> u64 {
        self.requeued.load(Ordering::Relaxed)
    }

    /// 폐기된 메시지 수
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// dead-letter 수
    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }

    /// 큐 연산 실패 수
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// 인시던트 실행기
pub struct IncidentExecutor {
    runner: Arc<CommandRunner>,
    stage_timeout: Duration,
    max_delivery_attempts: u32,
    stats: Arc<ExecutorStats>,
}

impl IncidentExecutor {
    /// 새 실행기를 생성합니다.
    ///
    /// `max_delivery_attempts`가 0이면 재전달 횟수를 제한하지 않습니다.
    pub fn new(
        runner: Arc<CommandRunner>,
        stage_timeout: Duration,
        max_delivery_attempts: u32,
        stats: Arc<ExecutorStats>,
    ) -> Self {
        Self {
            runner,
            stage_timeout,
            max_delivery_attempts,
            stats,
        }
    }

    /// 공유 카운터
    pub fn stats(&self) -> &Arc<ExecutorStats> {
        &self.stats
    }

    /// 세 스테이지를 순서대로 실행합니다. 실패한 스테이지에서 멈춥니다.
    pub async fn execute(&self, incident: &Incident, cancel: &CancellationToken) -> ExecutionReport {
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        for stage in Stage::ALL {
            let state = IncidentState::running(stage);
            let commands = incident.commands(stage);
            info!(
                incident_id = %incident.id,
                rule = %incident.rule.name,
                state = ?state,
                commands = commands.len(),
                "running stage"
            );

            let outcome =
                run_stage(&self.runner, stage, commands, self.stage_timeout, cancel).await;
            let passed = outcome.passed;
            stages.push(outcome);

            if !passed {
                return ExecutionReport {
                    state: IncidentState::Rejected(stage),
                    stages,
                };
            }
        }

        ExecutionReport {
            state: IncidentState::Acknowledged,
            stages,
        }
    }

    /// delivery 하나를 처리하고 정확히 한 번 정산합니다.
    ///
    /// 큐 연산이 실패하면 에러를 반환합니다. 이때 delivery는 이미 소비되었으며
    /// 정산되지 못한 경우 채널 종료 시 재큐잉됩니다.
    pub async fn process<T: QueueTransport>(
        &self,
        delivery: Delivery,
        dead_letters: &mut PublishEndpoint<T>,
        cancel: &CancellationToken,
    ) -> Result<Disposition, ExecutorError> {
        let incident = match codec::decode(&delivery.body) {
            Ok(incident) => incident,
            Err(e) => {
                warn!(
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "discarding malformed incident"
                );
                metrics::counter!(m::EXECUTOR_MALFORMED_TOTAL).increment(1);
                self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                delivery.nack(false, false).await?;
                return Ok(Disposition::Discarded);
            }
        };

        if self.max_delivery_attempts > 0 && delivery.delivery_count > self.max_delivery_attempts {
            error!(
                incident_id = %incident.id,
                rule = %incident.rule.name,
                attempts = delivery.delivery_count,
                queue = %dead_letters.queue(),
                "delivery limit exceeded, moving incident to dead-letter queue"
            );
            if let Err(e) = dead_letters.publish(delivery.body.clone()).await {
                delivery.nack(false, true).await?;
                return Err(e.into());
            }
            delivery.ack(false).await?;
            metrics::counter!(m::EXECUTOR_INCIDENTS_DEAD_LETTERED_TOTAL).increment(1);
            self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
            return Ok(Disposition::DeadLettered);
        }

        if delivery.redelivered() {
            info!(
                incident_id = %incident.id,
                attempt = delivery.delivery_count,
                "processing redelivered incident"
            );
        }

        let report = self.execute(&incident, cancel).await;
        match report.state {
            IncidentState::Rejected(stage) => {
                warn!(
                    incident_id = %incident.id,
                    rule = %incident.rule.name,
                    stage = %stage,
                    "incident rejected, requeueing"
                );
                delivery.nack(false, true).await?;
                metrics::counter!(
                    m::EXECUTOR_INCIDENTS_REJECTED_TOTAL,
                    m::LABEL_STAGE => stage.as_str()
                )
                .increment(1);
                self.stats.requeued.fetch_add(1, Ordering::Relaxed);
                Ok(Disposition::Requeued(stage))
            }
            _ => {
                delivery.ack(false).await?;
                info!(
                    incident_id = %incident.id,
                    rule = %incident.rule.name,
                    "incident remediated and acknowledged"
                );
                metrics::counter!(m::EXECUTOR_INCIDENTS_ACKED_TOTAL).increment(1);
                self.stats.acknowledged.fetch_add(1, Ordering::Relaxed);
                Ok(Disposition::Acknowledged)
            }
        }
    }
}
