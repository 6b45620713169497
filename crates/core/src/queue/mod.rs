//! 큐 전송 추상화
//!
//! 분류기와 실행기는 [`QueueTransport`]를 통해서만 브로커와 통신합니다.
//! 하나의 `QueueTransport` 값은 AMQP의 채널 하나에 해당하며,
//! 동시에 여러 태스크에서 발행하지 않도록 호출 측에서 단일 writer를 보장해야 합니다.
//!
//! # 수동 ack
//! [`Delivery`]는 `ack`/`nack`이 `self`를 소비하므로 한 번만 정산됩니다.
//! 정산 없이 drop 된 delivery는 큐로 되돌아갑니다.

pub mod memory;

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::BrokerConfig;
use crate::error::QueueError;
use crate::pipeline::BoxFuture;

pub use memory::{MemoryBroker, MemoryChannel};

/// 브로커 전송 계층 trait
///
/// 큐 선언은 멱등이어야 합니다.
pub trait QueueTransport: Send + Sync + 'static {
    /// 브로커에 연결합니다. 접속 파라미터가 잘못되면 `QueueError::Config`를 반환합니다.
    fn connect(
        &self,
        config: &BrokerConfig,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// 연결을 닫습니다. 정산되지 않은 delivery는 큐로 되돌아갑니다.
    fn close(&self) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// durable 큐를 선언합니다.
    fn declare_queue(&self, queue: &str) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// 미정산 delivery 최대 수(prefetch)를 설정합니다. 0은 무제한입니다.
    fn set_qos(&self, prefetch: u16) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// 메시지를 큐에 발행합니다.
    fn publish(
        &self,
        queue: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// 큐를 수동 ack 모드로 구독합니다.
    fn consume(
        &self,
        queue: &str,
    ) -> impl Future<Output = Result<DeliveryStream, QueueError>> + Send;
}

/// delivery 정산을 브로커에 전달하는 trait
///
/// 전송 구현체마다 하나씩 제공합니다.
pub trait Acknowledger: Send + Sync {
    /// 긍정 확인. `multiple`이면 같은 채널에서 이 tag 이하의 미정산 delivery를 모두 확인합니다.
    fn ack(&self, multiple: bool) -> BoxFuture<'_, Result<(), QueueError>>;

    /// 부정 확인. `requeue`이면 브로커가 다시 전달하고, 아니면 폐기합니다.
    fn nack(&self, multiple: bool, requeue: bool) -> BoxFuture<'_, Result<(), QueueError>>;

    /// 정산 없이 버려진 delivery를 큐로 되돌립니다 (drop 경로).
    fn release(&self);
}

/// 수신된 메시지 하나
pub struct Delivery {
    /// 메시지 본문
    pub body: Bytes,
    /// 채널 내 delivery tag
    pub delivery_tag: u64,
    /// 이 메시지가 전달된 횟수 (첫 전달이면 1)
    pub delivery_count: u32,
    acker: Option<Box<dyn Acknowledger>>,
}

impl Delivery {
    /// 새 delivery를 생성합니다.
    pub fn new(
        body: Bytes,
        delivery_tag: u64,
        delivery_count: u32,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            body,
            delivery_tag,
            delivery_count,
            acker: Some(acker),
        }
    }

    /// 재전달된 메시지인지 여부
    pub fn redelivered(&self) -> bool {
        self.delivery_count > 1
    }

    /// delivery를 긍정 확인하여 큐에서 제거합니다.
    pub async fn ack(mut self, multiple: bool) -> Result<(), QueueError> {
        let Some(acker) = self.acker.take() else {
            return Err(QueueError::AlreadySettled(self.delivery_tag));
        };
        acker.ack(multiple).await
    }

    /// delivery를 부정 확인합니다.
    pub async fn nack(mut self, multiple: bool, requeue: bool) -> Result<(), QueueError> {
        let Some(acker) = self.acker.take() else {
            return Err(QueueError::AlreadySettled(self.delivery_tag));
        };
        acker.nack(multiple, requeue).await
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(acker) = self.acker.take() {
            acker.release();
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("delivery_count", &self.delivery_count)
            .field("body_len", &self.body.len())
            .field("settled", &self.acker.is_none())
            .finish()
    }
}

/// 구독으로 받은 delivery 스트림
///
/// 스트림을 drop 하면 구독이 취소되고, 아직 꺼내지 않은 메시지는 큐에 남습니다.
#[derive(Debug)]
pub struct DeliveryStream {
    rx: mpsc::Receiver<Delivery>,
}

impl DeliveryStream {
    /// 채널 수신단으로 스트림을 생성합니다.
    pub fn new(rx: mpsc::Receiver<Delivery>) -> Self {
        Self { rx }
    }

    /// 다음 delivery를 기다립니다. 구독이 끝나면 `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}
