//! UDP syslog 테일러
//!
//! 각 UDP 데이터그램을 하나의 로그 메시지로 취급합니다.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{RawLog, trim_line};
use crate::error::ClassifierError;

/// 소스 유형 식별자
pub const SOURCE_TYPE: &str = "syslog_udp";

/// UDP 데이터그램 최대 크기
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// UDP syslog 테일러
pub struct SyslogUdpTailer {
    socket: UdpSocket,
    max_message_size: usize,
}

impl SyslogUdpTailer {
    /// 주소에 바인드합니다.
    pub async fn bind(addr: &str, max_message_size: usize) -> Result<Self, ClassifierError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| ClassifierError::Tailer {
                source_type: SOURCE_TYPE.to_owned(),
                reason: format!("failed to bind to {addr}: {e}"),
            })?;
        Ok(Self {
            socket,
            max_message_size: max_message_size.min(MAX_DATAGRAM_SIZE),
        })
    }

    /// 실제 바인드된 주소
    pub fn local_addr(&self) -> Result<SocketAddr, ClassifierError> {
        Ok(self.socket.local_addr()?)
    }

    /// 취소되거나 수신측이 닫힐 때까지 데이터그램을 수신합니다.
    pub async fn run(
        self,
        tx: mpsc::Sender<RawLog>,
        cancel: CancellationToken,
    ) -> Result<(), ClassifierError> {
        let local = self.local_addr()?;
        info!(addr = %local, "UDP syslog tailer listening");

        // 최대 크기를 넘는 데이터그램을 감지하기 위해 1바이트 여유를 둠
        let mut buf = vec![0u8; self.max_message_size + 1];

        loop {
            let (len, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "UDP receive error");
                        continue;
                    }
                },
            };

            if len > self.max_message_size {
                warn!(%peer, max = self.max_message_size, "datagram too large, dropping");
                continue;
            }

            let Some(message) = trim_line(&buf[..len]) else {
                continue;
            };

            if tx
                .send(RawLog::new(bytes::Bytes::copy_from_slice(message), SOURCE_TYPE))
                .await
                .is_err()
            {
                debug!("raw log channel closed, stopping UDP tailer");
                return Ok(());
            }
        }

        info!(addr = %local, "UDP syslog tailer stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn datagrams_become_raw_logs() {
        let tailer = SyslogUdpTailer::bind("127.0.0.1:0", 1024).await.unwrap();
        let addr = tailer.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tailer.run(tx, cancel.clone()));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"<34>Oct 19 10:00:00 host sshd[1]: login failed\n", addr)
            .await
            .unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.source, SOURCE_TYPE);
        assert_eq!(raw.data, "<34>Oct 19 10:00:00 host sshd[1]: login failed");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_datagram_is_dropped() {
        let tailer = SyslogUdpTailer::bind("127.0.0.1:0", 8).await.unwrap();
        let addr = tailer.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tailer.run(tx, cancel.clone()));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"this is far too long", addr).await.unwrap();
        client.send_to(b"short", addr).await.unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.data, "short");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_tailer_error() {
        let first = SyslogUdpTailer::bind("127.0.0.1:0", 1024).await.unwrap();
        let addr = first.local_addr().unwrap().to_string();
        let result = SyslogUdpTailer::bind(&addr, 1024).await;
        assert!(matches!(result, Err(ClassifierError::Tailer { .. })));
    }
}
