//! TCP syslog 테일러
//!
//! 개행으로 구분된 syslog 메시지를 TCP로 수신합니다.
//! 각 연결은 별도의 tokio 태스크에서 처리되며 동시 연결 수는 세마포어로 제한합니다.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{RawLog, trim_line};
use crate::error::ClassifierError;

/// 소스 유형 식별자
pub const SOURCE_TYPE: &str = "syslog_tcp";

/// TCP syslog 테일러
pub struct SyslogTcpTailer {
    listener: TcpListener,
    max_connections: usize,
    max_message_size: usize,
}

impl SyslogTcpTailer {
    /// 주소에 바인드합니다.
    pub async fn bind(
        addr: &str,
        max_connections: usize,
        max_message_size: usize,
    ) -> Result<Self, ClassifierError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ClassifierError::Tailer {
                source_type: SOURCE_TYPE.to_owned(),
                reason: format!("failed to bind to {addr}: {e}"),
            })?;
        Ok(Self {
            listener,
            max_connections,
            max_message_size,
        })
    }

    /// 실제 바인드된 주소
    pub fn local_addr(&self) -> Result<SocketAddr, ClassifierError> {
        Ok(self.listener.local_addr()?)
    }

    /// 취소될 때까지 연결을 수락합니다.
    pub async fn run(
        self,
        tx: mpsc::Sender<RawLog>,
        cancel: CancellationToken,
    ) -> Result<(), ClassifierError> {
        let local = self.local_addr()?;
        info!(addr = %local, "TCP syslog tailer listening");

        let semaphore = Arc::new(Semaphore::new(self.max_connections));
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "TCP accept error");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                        warn!(%peer, "max connections reached, rejecting");
                        continue;
                    };

                    debug!(%peer, "accepted syslog connection");
                    let (tx, cancel) = (tx.clone(), cancel.clone());
                    let max = self.max_message_size;
                    connections.spawn(async move {
                        handle_connection(stream, peer, tx, max, cancel).await;
                        drop(permit);
                    });
                }
                // 끝난 연결 태스크 회수
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        connections.shutdown().await;
        info!(addr = %local, "TCP syslog tailer stopped");
        Ok(())
    }
}

/// 단일 연결에서 개행 구분 메시지를 읽습니다.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<RawLog>,
    max_message_size: usize,
    cancel: CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    // 개행 없이 한도를 넘는 입력도 감지할 수 있도록 1바이트 여유
    let limit = max_message_size as u64 + 1;

    loop {
        line.clear();
        let mut limited = (&mut reader).take(limit);
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = limited.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => {
                debug!(%peer, "connection closed by peer");
                break;
            }
            Ok(_) => {
                if line.len() > max_message_size {
                    warn!(%peer, length = line.len(), max = max_message_size, "message too large, closing connection");
                    break;
                }
                let Some(message) = trim_line(&line) else {
                    continue;
                };
                if tx
                    .send(RawLog::new(Bytes::copy_from_slice(message), SOURCE_TYPE))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                warn!(%peer, error = %e, "TCP read error");
                break;
            }
        }
    }
}
