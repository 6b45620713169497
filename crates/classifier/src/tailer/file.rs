//! 파일 테일러
//!
//! 로그 파일을 주기적으로 폴링하며 새로 추가된 라인을 수집합니다.
//! `tail -F`와 유사하게 동작합니다.
//!
//! # 로테이션 감지
//! - inode 변경 (logrotate 등): 새 파일을 처음부터 읽음
//! - 파일 크기 축소 (truncation): 처음부터 다시 읽음
//! - 파일이 아직 없으면 생길 때까지 대기

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{RawLog, trim_line};
use crate::error::ClassifierError;

/// 소스 유형 식별자
pub const SOURCE_TYPE: &str = "file";

/// 폴링 한 번에 읽는 최대 바이트
const MAX_READ_CHUNK: u64 = 1024 * 1024; // 1MB

/// 파일 읽기 위치
#[derive(Debug, Default)]
struct Cursor {
    offset: u64,
    inode: Option<u64>,
    /// 아직 개행을 만나지 못한 마지막 부분 라인
    pending: Vec<u8>,
}

impl Cursor {
    fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
    }
}

/// 파일 테일러
pub struct FileTailer {
    path: PathBuf,
    read_from_start: bool,
    poll_interval: Duration,
    max_line_length: usize,
}

impl FileTailer {
    /// 새 파일 테일러를 생성합니다.
    pub fn new(
        path: PathBuf,
        read_from_start: bool,
        poll_interval: Duration,
        max_line_length: usize,
    ) -> Self {
        Self {
            path,
            read_from_start,
            poll_interval,
            max_line_length,
        }
    }

    /// 감시 중인 경로
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// 취소되거나 수신측이 닫힐 때까지 파일을 따라갑니다.
    pub async fn run(
        self,
        tx: mpsc::Sender<RawLog>,
        cancel: CancellationToken,
    ) -> Result<(), ClassifierError> {
        let mut cursor = Cursor::default();

        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => {
                cursor.inode = file_id(&metadata);
                if !self.read_from_start {
                    cursor.offset = metadata.len();
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "log file does not exist yet, waiting");
            }
            Err(e) => return Err(self.error(format!("failed to stat file: {e}"))),
        }

        info!(
            path = %self.path.display(),
            offset = cursor.offset,
            "file tailer started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let lines = match self.poll_once(&mut cursor).await {
                Ok(lines) => lines,
                Err(e) => {
                    // 일시적인 I/O 오류는 다음 폴링에서 재시도
                    warn!(path = %self.path.display(), error = %e, "failed to read log file");
                    continue;
                }
            };

            for line in lines {
                if tx.send(RawLog::new(line, SOURCE_TYPE)).await.is_err() {
                    debug!("raw log channel closed, stopping file tailer");
                    return Ok(());
                }
            }
        }

        info!(path = %self.path.display(), "file tailer stopped");
        Ok(())
    }

    /// 마지막 위치 이후에 추가된 완전한 라인들을 읽습니다.
    async fn poll_once(&self, cursor: &mut Cursor) -> Result<Vec<Bytes>, ClassifierError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.error(format!("failed to stat file: {e}"))),
        };

        let inode = file_id(&metadata);
        if cursor.inode.is_some() && inode != cursor.inode {
            info!(path = %self.path.display(), "log file rotated, reopening");
            cursor.reset();
        }
        cursor.inode = inode;

        if metadata.len() < cursor.offset {
            info!(path = %self.path.display(), "log file truncated, reading from start");
            cursor.reset();
        }
        if metadata.len() == cursor.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(cursor.offset)).await?;
        let mut buf = Vec::new();
        let read = file.take(MAX_READ_CHUNK).read_to_end(&mut buf).await?;
        cursor.offset += read as u64;
        cursor.pending.extend_from_slice(&buf);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = cursor.pending[start..].iter().position(|b| *b == b'\n') {
            let line = &cursor.pending[start..start + pos];
            start += pos + 1;
            if line.len() > self.max_line_length {
                warn!(
                    path = %self.path.display(),
                    length = line.len(),
                    max = self.max_line_length,
                    "line too long, skipping"
                );
                continue;
            }
            if let Some(trimmed) = trim_line(line) {
                lines.push(Bytes::copy_from_slice(trimmed));
            }
        }
        cursor.pending.drain(..start);

        if cursor.pending.len() > self.max_line_length {
            warn!(
                path = %self.path.display(),
                length = cursor.pending.len(),
                "partial line exceeds max length, discarding"
            );
            cursor.pending.clear();
        }

        Ok(lines)
    }

    fn error(&self, reason: String) -> ClassifierError {
        ClassifierError::Tailer {
            source_type: SOURCE_TYPE.to_owned(),
            reason: format!("{}: {reason}", self.path.display()),
        }
    }
}

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, Write};

    use super::*;

    fn tailer(path: PathBuf, read_from_start: bool) -> FileTailer {
        FileTailer::new(path, read_from_start, Duration::from_millis(10), 1024)
    }

    async fn recv_line(rx: &mut mpsc::Receiver<RawLog>) -> String {
        let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for line")
            .expect("channel closed");
        String::from_utf8(raw.data.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn poll_once_keeps_partial_line_for_next_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "complete\npart").unwrap();
        file.flush().unwrap();

        let tailer = tailer(file.path().to_path_buf(), true);
        let mut cursor = Cursor::default();
        let lines = tailer.poll_once(&mut cursor).await.unwrap();
        assert_eq!(lines, vec![Bytes::from("complete")]);

        writeln!(file, "ial").unwrap();
        file.flush().unwrap();
        let lines = tailer.poll_once(&mut cursor).await.unwrap();
        assert_eq!(lines, vec![Bytes::from("partial")]);
    }

    #[tokio::test]
    async fn poll_once_skips_blank_and_overlong_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let long = "x".repeat(2048);
        write!(file, "a\n\n{long}\nb\r\n").unwrap();
        file.flush().unwrap();

        let tailer = tailer(file.path().to_path_buf(), true);
        let mut cursor = Cursor::default();
        let lines = tailer.poll_once(&mut cursor).await.unwrap();
        assert_eq!(lines, vec![Bytes::from("a"), Bytes::from("b")]);
    }

    #[tokio::test]
    async fn starts_at_end_unless_read_from_start() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "old line").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tailer(file.path().to_path_buf(), false).run(tx, cancel.clone()));

        // 시작 위치가 잡힐 때까지 대기
        tokio::time::sleep(Duration::from_millis(50)).await;
        writeln!(file, "new line").unwrap();
        file.flush().unwrap();

        assert_eq!(recv_line(&mut rx).await, "new line");
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn truncation_restarts_from_beginning() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "before truncation with a long line").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tailer(file.path().to_path_buf(), true).run(tx, cancel.clone()));
        assert_eq!(recv_line(&mut rx).await, "before truncation with a long line");

        file.as_file().set_len(0).unwrap();
        file.as_file_mut().rewind().unwrap();
        writeln!(file, "after").unwrap();
        file.flush().unwrap();

        assert_eq!(recv_line(&mut rx).await, "after");
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_picked_up_when_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.log");

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tailer(path.clone(), false).run(tx, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        std::fs::write(&path, "hello\n").unwrap();

        assert_eq!(recv_line(&mut rx).await, "hello");
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
