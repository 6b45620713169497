//! 분류기 워커 풀 -- 원시 텍스트 라인을 인시던트로 변환합니다.
//!
//! 고정 크기 워커들이 공유 인테이크 채널에서 라인을 하나씩 가져와
//! 컴파일된 룰 목록에 대해 순서대로 평가합니다. 매칭된 라인마다 인시던트를 만들어
//! 발행기 채널로 보냅니다. 워커 간 인시던트 순서는 보장되지 않습니다.
//!
//! ```text
//! intake (mpsc) ─┬─▶ worker 0 ─┐
//!                ├─▶ worker 1 ─┼─▶ incident (mpsc) ─▶ publisher
//!                └─▶ worker N ─┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use remedy_core::metrics as m;
use remedy_core::types::Incident;

use crate::rule::CompiledRules;

/// 한 라인을 분류합니다.
///
/// 첫 번째로 매칭된 룰로 인시던트를 만들며, 어떤 룰에도 매칭되지 않으면 `None`입니다.
pub fn classify(rules: &CompiledRules, line: &str, engine: &str) -> Option<Incident> {
    let matched = rules.first_match(line)?;
    Some(Incident::from_match(
        matched.rule,
        matched.parameters,
        line,
        engine,
    ))
}

/// 워커 풀 공유 카운터
#[derive(Debug, Default)]
pub struct ClassifierStats {
    /// 평가한 라인 수
    pub lines: AtomicU64,
    /// 룰에 매칭된 라인 수
    pub matched: AtomicU64,
}

impl ClassifierStats {
    /// 평가한 라인 수
    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// 매칭된 라인 수
    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }
}

/// 분류기 워커 풀
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// `worker_count`개의 워커를 스폰합니다.
    ///
    /// 워커는 인테이크 채널이 닫히거나 `cancel`이 취소되면 종료합니다.
    /// 인시던트 채널의 수신측이 닫혀도 종료합니다.
    pub fn spawn(
        worker_count: usize,
        rules: Arc<CompiledRules>,
        engine: Arc<str>,
        intake: mpsc::Receiver<String>,
        incidents: mpsc::Sender<Incident>,
        stats: Arc<ClassifierStats>,
        cancel: CancellationToken,
    ) -> Self {
        let intake = Arc::new(Mutex::new(intake));
        let handles = (0..worker_count.max(1))
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&rules),
                    Arc::clone(&engine),
                    Arc::clone(&intake),
                    incidents.clone(),
                    Arc::clone(&stats),
                    cancel.clone(),
                ))
            })
            .collect::<Vec<_>>();

        info!(workers = handles.len(), "classifier workers started");
        Self { handles }
    }

    /// 워커 수
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// 워커가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 모든 워커가 종료될 때까지 기다립니다.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "classifier worker panicked");
            }
        }
    }
}

async fn run_worker(
    id: usize,
    rules: Arc<CompiledRules>,
    engine: Arc<str>,
    intake: Arc<Mutex<mpsc::Receiver<String>>>,
    incidents: mpsc::Sender<Incident>,
    stats: Arc<ClassifierStats>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = async { intake.lock().await.recv().await } => line,
        };
        let Some(line) = line else { break };

        stats.lines.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::CLASSIFIER_LINES_TOTAL).increment(1);

        let Some(incident) = classify(&rules, &line, &engine) else {
            continue;
        };

        stats.matched.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::CLASSIFIER_RULE_MATCHES_TOTAL, m::LABEL_RULE => incident.rule.name.clone())
            .increment(1);
        debug!(worker = id, incident_id = %incident.id, rule = %incident.rule.name, "line matched rule");

        if incidents.send(incident).await.is_err() {
            debug!(worker = id, "incident channel closed");
            break;
        }
    }

    debug!(worker = id, "classifier worker stopped");
}
