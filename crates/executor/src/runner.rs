//! 명령 러너 -- 조치/감사 스크립트 하나를 실행하고 결과를 분류합니다.
//!
//! 스크립트는 `remediations_dir/<이름>`으로 실행되며, 인자 문자열은 하나의 argv로 전달됩니다.
//! stdout에는 정확히 하나의 [`StructuredOutput`] JSON 객체만 있어야 합니다.
//!
//! # 결과 분류
//!
//! | 상황 | [`ExitClass`] |
//! |---|---|
//! | 잘못된 스크립트 이름, 실행 실패 | `ConfigurationError` |
//! | stdout 디코딩 실패 | `OutputProtocolError` |
//! | 0이 아닌 종료 코드, 파이프 읽기 실패, 타임아웃, 취소 | `ExecutionError` |

use std::path::{Component, Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use remedy_core::types::Command;

/// stdout/stderr 각각 보관하는 최대 바이트 수
pub const MAX_CAPTURE_BYTES: u64 = 1024 * 1024;

/// 스크립트가 stdout으로 보고하는 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredOutput {
    /// 스크립트 자체의 동작 성공 여부
    pub success: bool,
    /// 감사/조치 통과 여부 (스테이지 판정에 사용)
    pub passed: bool,
    /// 자유 형식 결과 메시지
    pub result: String,
}

impl StructuredOutput {
    /// stdout 바이트를 엄격하게 디코딩합니다.
    ///
    /// 세 필드가 모두 있어야 하며 객체 뒤에는 공백만 허용됩니다.
    pub fn decode(stdout: &[u8]) -> Result<Self, RunnerError> {
        serde_json::from_slice(stdout).map_err(|e| RunnerError::Decode(e.to_string()))
    }
}

/// 명령 결과 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitClass {
    /// 정상 실행 및 디코딩 성공
    Ok,
    /// 스크립트를 찾거나 실행할 수 없음
    ConfigurationError,
    /// stdout이 결과 프로토콜을 따르지 않음
    OutputProtocolError,
    /// 실행 중 실패 (종료 코드, 타임아웃, 취소)
    ExecutionError,
}

impl ExitClass {
    /// 로그/메트릭 레이블에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ConfigurationError => "configuration_error",
            Self::OutputProtocolError => "output_protocol_error",
            Self::ExecutionError => "execution_error",
        }
    }
}

impl std::fmt::Display for ExitClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 명령 실패의 원인
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// 경로 구분자나 상위 디렉토리를 포함한 스크립트 이름
    #[error("invalid script name: '{0}'")]
    InvalidScript(String),

    /// 프로세스 생성 실패
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        /// 실행하려던 경로
        path: PathBuf,
        /// 원인
        source: std::io::Error,
    },

    /// 파이프 읽기 또는 reap 실패
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// stdout 디코딩 실패
    #[error("malformed structured output: {0}")]
    Decode(String),

    /// 0이 아닌 종료 상태
    #[error("process exited with {0}")]
    ExitStatus(ExitStatus),

    /// 스테이지 데드라인 초과
    #[error("stage deadline exceeded")]
    Timeout,

    /// 같은 스테이지의 다른 명령 실패로 취소됨
    #[error("cancelled")]
    Cancelled,
}

/// 명령 한 번의 실행 결과
#[derive(Debug)]
pub struct CommandResult {
    /// 결과 분류
    pub exit_class: ExitClass,
    /// 캡처된 stderr (진단용)
    pub stderr: Vec<u8>,
    /// 실패 원인
    pub error: Option<RunnerError>,
    /// 디코딩된 결과 (디코딩에 성공한 경우)
    pub output: Option<StructuredOutput>,
}

impl CommandResult {
    fn failed(exit_class: ExitClass, stderr: Vec<u8>, error: RunnerError) -> Self {
        Self {
            exit_class,
            stderr,
            error: Some(error),
            output: None,
        }
    }

    /// 스테이지 관점에서 통과했는지 여부
    ///
    /// 정상 실행되었고 스크립트가 `passed: true`를 보고해야 합니다.
    /// `success` 필드는 판정에 쓰이지 않습니다.
    pub fn passed(&self) -> bool {
        self.exit_class == ExitClass::Ok && self.output.as_ref().is_some_and(|o| o.passed)
    }

    /// stderr를 손실 허용 UTF-8로 반환합니다.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim_end().to_owned()
    }
}

/// 스크립트 디렉토리 기준의 명령 러너
#[derive(Debug, Clone)]
pub struct CommandRunner {
    remediations_dir: PathBuf,
}

impl CommandRunner {
    /// 새 러너를 생성합니다.
    pub fn new(remediations_dir: impl Into<PathBuf>) -> Self {
        Self {
            remediations_dir: remediations_dir.into(),
        }
    }

    /// 스크립트 디렉토리
    pub fn remediations_dir(&self) -> &Path {
        &self.remediations_dir
    }

    /// 스크립트 이름을 실행 경로로 변환합니다.
    pub fn resolve(&self, script: &str) -> Result<PathBuf, RunnerError> {
        let name = Path::new(script);
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name.as_os_str() => {
                Ok(self.remediations_dir.join(part))
            }
            _ => Err(RunnerError::InvalidScript(script.to_owned())),
        }
    }

    /// 명령을 실행하고 결과를 분류합니다.
    ///
    /// `deadline`이 지나거나 `cancel`이 취소되면 프로세스를 종료하고
    /// `ExecutionError`로 보고합니다. 어떤 경우에도 결과는 정확히 하나입니다.
    pub async fn run(
        &self,
        command: &Command,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> CommandResult {
        let path = match self.resolve(&command.cmd) {
            Ok(path) => path,
            Err(e) => return CommandResult::failed(ExitClass::ConfigurationError, Vec::new(), e),
        };

        let mut process = tokio::process::Command::new(&path);
        if !command.args.is_empty() {
            process.arg(&command.args);
        }
        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // 스크립트가 띄운 하위 프로세스까지 함께 종료할 수 있도록 별도 그룹으로 실행
        #[cfg(unix)]
        process.process_group(0);

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(source) => {
                return CommandResult::failed(
                    ExitClass::ConfigurationError,
                    Vec::new(),
                    RunnerError::Spawn { path, source },
                );
            }
        };

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            if let Err(e) = child.kill().await {
                debug!(command = %command.cmd, error = %e, "kill after pipe setup failure");
            }
            return CommandResult::failed(
                ExitClass::ConfigurationError,
                Vec::new(),
                RunnerError::Io(std::io::Error::other("child pipes unavailable")),
            );
        };

        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();

        // 타임아웃 시에도 그때까지 받은 stderr는 보존되도록 버퍼는 바깥에 둠
        let finished = {
            let io = async {
                let (out, err) = tokio::join!(
                    capture(&mut stdout, &mut out_buf),
                    capture(&mut stderr, &mut err_buf)
                );
                (out, err, child.wait().await)
            };
            tokio::select! {
                result = io => Ok(result),
                _ = tokio::time::sleep_until(deadline) => Err(RunnerError::Timeout),
                _ = cancel.cancelled() => Err(RunnerError::Cancelled),
            }
        };

        let (stdout_read, stderr_read, status) = match finished {
            Ok(result) => result,
            Err(cause) => {
                if let Some(pid) = child.id() {
                    kill_process_group(pid);
                }
                if let Err(e) = child.kill().await {
                    debug!(command = %command.cmd, error = %e, "kill failed");
                }
                return CommandResult::failed(ExitClass::ExecutionError, err_buf, cause);
            }
        };

        if let Err(e) = stdout_read {
            return CommandResult::failed(ExitClass::ExecutionError, err_buf, e.into());
        }
        let output = match StructuredOutput::decode(&out_buf) {
            Ok(output) => output,
            Err(e) => return CommandResult::failed(ExitClass::OutputProtocolError, err_buf, e),
        };

        let error = match (stderr_read, status) {
            (Err(e), _) | (_, Err(e)) => Some(RunnerError::Io(e)),
            (Ok(()), Ok(status)) if !status.success() => Some(RunnerError::ExitStatus(status)),
            _ => None,
        };

        CommandResult {
            exit_class: if error.is_some() {
                ExitClass::ExecutionError
            } else {
                ExitClass::Ok
            },
            stderr: err_buf,
            error,
            output: Some(output),
        }
    }
}

/// 프로세스 그룹 전체에 SIGKILL을 보냅니다.
#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: 음수 pid는 그룹 전체를 대상으로 하며 메모리에 접근하지 않음
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "process group kill failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// 스트림을 끝까지 읽되 [`MAX_CAPTURE_BYTES`]까지만 보관합니다.
///
/// 상한을 넘은 stdout은 디코딩에서 실패합니다.
async fn capture<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    (&mut *reader).take(MAX_CAPTURE_BYTES).read_to_end(buf).await?;
    tokio::io::copy(reader, &mut tokio::io::sink()).await?;
    Ok(())
}
