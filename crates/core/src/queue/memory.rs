//! 인프로세스 브로커 -- [`QueueTransport`]의 메모리 구현
//!
//! 단일 데몬 안에서 테일러, 분류기, 실행기를 연결할 때와 테스트에서 사용합니다.
//! AMQP 작업 큐의 의미를 따릅니다:
//! - 큐는 이름으로 선언되며 선언은 멱등입니다.
//! - 채널마다 prefetch 한도 안에서만 delivery를 내보냅니다.
//! - nack(requeue) 또는 정산 없는 drop은 메시지를 큐 앞쪽으로 되돌립니다.
//! - 채널을 닫으면 미정산 delivery가 모두 큐로 돌아갑니다.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Acknowledger, Delivery, DeliveryStream, QueueTransport};
use crate::config::BrokerConfig;
use crate::error::QueueError;
use crate::pipeline::BoxFuture;

#[derive(Debug, Clone)]
struct Message {
    body: Bytes,
    delivery_count: u32,
}

#[derive(Debug)]
struct Unacked {
    queue: String,
    message: Message,
}

#[derive(Default)]
struct BrokerState {
    queues: Mutex<HashMap<String, VecDeque<Message>>>,
    /// 메시지 추가, 재적재, prefetch 여유 발생 시 깨움
    notify: Notify,
}

impl BrokerState {
    fn requeue(&self, items: Vec<Unacked>) {
        if items.is_empty() {
            return;
        }
        let mut queues = lock(&self.queues);
        // 역순으로 앞에 넣어 원래 순서를 유지
        for item in items.into_iter().rev() {
            queues
                .entry(item.queue)
                .or_default()
                .push_front(item.message);
        }
        drop(queues);
        self.notify.notify_waiters();
    }
}

/// 인프로세스 메시지 브로커
///
/// 복제본은 같은 큐 집합을 공유합니다.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// 빈 브로커를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 이 브로커에 대한 새 채널을 엽니다. 사용 전에 `connect`가 필요합니다.
    pub fn channel(&self) -> MemoryChannel {
        MemoryChannel {
            broker: Arc::clone(&self.state),
            channel: Arc::new(ChannelState::default()),
        }
    }

    /// 큐가 선언되었는지 확인합니다.
    pub fn is_declared(&self, queue: &str) -> bool {
        lock(&self.state.queues).contains_key(queue)
    }

    /// 전달 대기 중인 메시지 수 (미정산 delivery 제외)
    pub fn queue_len(&self, queue: &str) -> usize {
        lock(&self.state.queues).get(queue).map_or(0, VecDeque::len)
    }

    /// 전달 대기 중인 메시지 본문을 순서대로 복사합니다.
    pub fn peek_messages(&self, queue: &str) -> Vec<Bytes> {
        lock(&self.state.queues)
            .get(queue)
            .map(|q| q.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct ChannelState {
    inner: Mutex<ChannelInner>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ChannelInner {
    connected: bool,
    closed: bool,
    prefetch: u16,
    next_tag: u64,
    unacked: BTreeMap<u64, Unacked>,
}

impl ChannelInner {
    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed {
            return Err(QueueError::ChannelClosed);
        }
        if !self.connected {
            return Err(QueueError::NotConnected);
        }
        Ok(())
    }

    fn has_capacity(&self) -> bool {
        self.prefetch == 0 || self.unacked.len() < usize::from(self.prefetch)
    }
}

/// [`MemoryBroker`]의 채널
///
/// 복제본은 같은 채널(같은 prefetch, 같은 미정산 집합)을 가리킵니다.
#[derive(Clone)]
pub struct MemoryChannel {
    broker: Arc<BrokerState>,
    channel: Arc<ChannelState>,
}

impl MemoryChannel {
    fn ensure_open(&self) -> Result<(), QueueError> {
        lock(&self.channel.inner).ensure_open()
    }

    /// 미정산 delivery 수
    pub fn unacked_count(&self) -> usize {
        lock(&self.channel.inner).unacked.len()
    }
}

impl QueueTransport for MemoryChannel {
    async fn connect(&self, config: &BrokerConfig) -> Result<(), QueueError> {
        config.validate()?;
        let mut inner = lock(&self.channel.inner);
        if inner.closed {
            return Err(QueueError::ChannelClosed);
        }
        inner.connected = true;
        debug!(address = %config.address(), "memory channel connected");
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        let pending = {
            let mut inner = lock(&self.channel.inner);
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.connected = false;
            std::mem::take(&mut inner.unacked)
        };
        let requeued = pending.len();
        self.channel.cancel.cancel();
        self.broker.requeue(pending.into_values().collect());
        debug!(requeued, "memory channel closed");
        Ok(())
    }

    async fn declare_queue(&self, queue: &str) -> Result<(), QueueError> {
        self.ensure_open()?;
        lock(&self.broker.queues)
            .entry(queue.to_owned())
            .or_default();
        Ok(())
    }

    async fn set_qos(&self, prefetch: u16) -> Result<(), QueueError> {
        {
            let mut inner = lock(&self.channel.inner);
            inner.ensure_open()?;
            inner.prefetch = prefetch;
        }
        self.broker.notify.notify_waiters();
        Ok(())
    }

    async fn publish(&self, queue: &str, body: Bytes) -> Result<(), QueueError> {
        self.ensure_open()?;
        {
            let mut queues = lock(&self.broker.queues);
            let Some(ready) = queues.get_mut(queue) else {
                return Err(QueueError::QueueNotFound(queue.to_owned()));
            };
            ready.push_back(Message {
                body,
                delivery_count: 0,
            });
        }
        self.broker.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, QueueError> {
        self.ensure_open()?;
        if !lock(&self.broker.queues).contains_key(queue) {
            return Err(QueueError::QueueNotFound(queue.to_owned()));
        }

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(dispatch(
            Arc::clone(&self.broker),
            Arc::clone(&self.channel),
            queue.to_owned(),
            tx,
        ));
        debug!(queue, "consumer registered");
        Ok(DeliveryStream::new(rx))
    }
}

/// 구독자 하나에 delivery를 공급하는 루프
async fn dispatch(
    broker: Arc<BrokerState>,
    channel: Arc<ChannelState>,
    queue: String,
    tx: mpsc::Sender<Delivery>,
) {
    loop {
        // 상태 확인 전에 등록해야 그 사이의 notify를 놓치지 않음
        let notified = broker.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(delivery) = take_next(&broker, &channel, &queue) {
            tokio::select! {
                sent = tx.send(delivery) => {
                    if sent.is_err() {
                        trace!(queue = %queue, "consumer dropped");
                        return;
                    }
                }
                _ = channel.cancel.cancelled() => return,
            }
            continue;
        }

        tokio::select! {
            _ = &mut notified => {}
            _ = tx.closed() => return,
            _ = channel.cancel.cancelled() => return,
        }
    }
}

fn take_next(
    broker: &Arc<BrokerState>,
    channel: &Arc<ChannelState>,
    queue: &str,
) -> Option<Delivery> {
    let mut inner = lock(&channel.inner);
    if inner.ensure_open().is_err() || !inner.has_capacity() {
        return None;
    }

    let mut message = lock(&broker.queues).get_mut(queue)?.pop_front()?;
    message.delivery_count = message.delivery_count.saturating_add(1);
    inner.next_tag += 1;
    let tag = inner.next_tag;
    inner.unacked.insert(
        tag,
        Unacked {
            queue: queue.to_owned(),
            message: message.clone(),
        },
    );
    drop(inner);

    let acker = MemoryAcker {
        broker: Arc::clone(broker),
        channel: Arc::clone(channel),
        tag,
    };
    Some(Delivery::new(
        message.body,
        tag,
        message.delivery_count,
        Box::new(acker),
    ))
}

enum Settlement {
    Ack,
    Reject { requeue: bool },
}

struct MemoryAcker {
    broker: Arc<BrokerState>,
    channel: Arc<ChannelState>,
    tag: u64,
}

impl MemoryAcker {
    fn settle(&self, multiple: bool, settlement: Settlement) -> Result<(), QueueError> {
        let settled = {
            let mut inner = lock(&self.channel.inner);
            if inner.closed {
                return Err(QueueError::ChannelClosed);
            }
            if !inner.unacked.contains_key(&self.tag) {
                return Err(QueueError::UnknownDeliveryTag(self.tag));
            }
            let tags: Vec<u64> = if multiple {
                inner.unacked.range(..=self.tag).map(|(tag, _)| *tag).collect()
            } else {
                vec![self.tag]
            };
            tags.iter()
                .filter_map(|tag| inner.unacked.remove(tag))
                .collect::<Vec<_>>()
        };

        match settlement {
            Settlement::Reject { requeue: true } => self.broker.requeue(settled),
            Settlement::Ack | Settlement::Reject { requeue: false } => {
                self.broker.notify.notify_waiters();
            }
        }
        Ok(())
    }
}

impl Acknowledger for MemoryAcker {
    fn ack(&self, multiple: bool) -> BoxFuture<'_, Result<(), QueueError>> {
        Box::pin(std::future::ready(self.settle(multiple, Settlement::Ack)))
    }

    fn nack(&self, multiple: bool, requeue: bool) -> BoxFuture<'_, Result<(), QueueError>> {
        Box::pin(std::future::ready(
            self.settle(multiple, Settlement::Reject { requeue }),
        ))
    }

    fn release(&self) {
        // 닫힌 채널이면 close가 이미 되돌려 놓았음
        if let Err(e) = self.settle(false, Settlement::Reject { requeue: true }) {
            trace!(tag = self.tag, error = %e, "release skipped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
