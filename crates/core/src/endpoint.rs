//! 큐 엔드포인트 -- 연결 단계의 조합
//!
//! [`QueueEndpoint`]는 `connect`/`close` 능력을 정의합니다.
//! [`BrokerEndpoint`]가 전송 계층 연결만 담당하고, 상위 엔드포인트는
//! 명시적 위임으로 자기 연결 단계를 덧붙입니다.
//!
//! ```text
//! BrokerEndpoint   : transport.connect
//! PublishEndpoint  : BrokerEndpoint + declare_queue
//! ConsumeEndpoint  : BrokerEndpoint + declare_queue + set_qos + consume
//! ```

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use crate::config::BrokerConfig;
use crate::error::QueueError;
use crate::queue::{Delivery, DeliveryStream, QueueTransport};

/// 연결/종료 능력
pub trait QueueEndpoint: Send {
    /// 엔드포인트를 사용 가능한 상태로 만듭니다.
    fn connect(&mut self) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// 엔드포인트를 닫습니다.
    fn close(&mut self) -> impl Future<Output = Result<(), QueueError>> + Send;
}

/// 전송 계층 연결만 담당하는 기본 엔드포인트
pub struct BrokerEndpoint<T> {
    transport: Arc<T>,
    config: BrokerConfig,
    connected: bool,
}

impl<T: QueueTransport> BrokerEndpoint<T> {
    /// 새 엔드포인트를 생성합니다.
    pub fn new(transport: Arc<T>, config: BrokerConfig) -> Self {
        Self {
            transport,
            config,
            connected: false,
        }
    }

    /// 내부 전송 계층
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 연결 여부
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl<T: QueueTransport> QueueEndpoint for BrokerEndpoint<T> {
    async fn connect(&mut self) -> Result<(), QueueError> {
        self.transport.connect(&self.config).await?;
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.transport.close().await
    }
}

/// 한 큐로 발행하는 엔드포인트
///
/// `&mut self`로만 발행할 수 있으므로 소유자가 단일 writer가 됩니다.
pub struct PublishEndpoint<T> {
    base: BrokerEndpoint<T>,
    queue: String,
}

impl<T: QueueTransport> PublishEndpoint<T> {
    /// 새 발행 엔드포인트를 생성합니다.
    pub fn new(transport: Arc<T>, config: BrokerConfig, queue: impl Into<String>) -> Self {
        Self {
            base: BrokerEndpoint::new(transport, config),
            queue: queue.into(),
        }
    }

    /// 대상 큐 이름
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// 메시지를 발행합니다.
    pub async fn publish(&mut self, body: Bytes) -> Result<(), QueueError> {
        if !self.base.is_connected() {
            return Err(QueueError::NotConnected);
        }
        self.base.transport().publish(&self.queue, body).await
    }
}

impl<T: QueueTransport> QueueEndpoint for PublishEndpoint<T> {
    async fn connect(&mut self) -> Result<(), QueueError> {
        self.base.connect().await?;
        self.base.transport().declare_queue(&self.queue).await?;
        info!(queue = %self.queue, "publish endpoint connected");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        self.base.close().await
    }
}

/// 한 큐를 구독하는 엔드포인트
pub struct ConsumeEndpoint<T> {
    base: BrokerEndpoint<T>,
    queue: String,
    prefetch: u16,
    stream: Option<DeliveryStream>,
}

impl<T: QueueTransport> ConsumeEndpoint<T> {
    /// 새 구독 엔드포인트를 생성합니다.
    pub fn new(
        transport: Arc<T>,
        config: BrokerConfig,
        queue: impl Into<String>,
        prefetch: u16,
    ) -> Self {
        Self {
            base: BrokerEndpoint::new(transport, config),
            queue: queue.into(),
            prefetch,
            stream: None,
        }
    }

    /// 구독 중인 큐 이름
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// 같은 채널의 전송 계층 (ack 외의 발행이 필요할 때)
    pub fn transport(&self) -> &T {
        self.base.transport()
    }

    /// 다음 delivery를 기다립니다. 연결 전이거나 구독이 끝나면 `None`입니다.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.stream.as_mut() {
            Some(stream) => stream.recv().await,
            None => None,
        }
    }
}

impl<T: QueueTransport> QueueEndpoint for ConsumeEndpoint<T> {
    async fn connect(&mut self) -> Result<(), QueueError> {
        self.base.connect().await?;
        let transport = self.base.transport();
        transport.declare_queue(&self.queue).await?;
        transport.set_qos(self.prefetch).await?;
        self.stream = Some(transport.consume(&self.queue).await?);
        info!(queue = %self.queue, prefetch = self.prefetch, "consume endpoint connected");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        self.stream = None;
        self.base.close().await
    }
}
