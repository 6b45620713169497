//! 스테이지 실행 -- 한 스테이지의 명령을 동시에 실행하고 통과 여부를 판정합니다.
//!
//! 모든 명령은 하나의 데드라인을 공유합니다. 첫 실패가 보이면 스테이지 토큰을 취소해
//! 나머지 명령을 조기 종료하지만, 결과 채널은 명령 수만큼 버퍼를 가지므로
//! 모든 태스크가 결과를 보내고 종료할 수 있으며 수집 루프는 끝까지 결과를 받습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use remedy_core::metrics as m;
use remedy_core::types::{Command, Stage};

use crate::runner::{CommandResult, CommandRunner};

/// 명령 하나와 그 결과
#[derive(Debug)]
pub struct CommandReport {
    /// 실행한 명령
    pub command: Command,
    /// 실행 결과
    pub result: CommandResult,
}

/// 스테이지 실행 결과
#[derive(Debug)]
pub struct StageOutcome {
    /// 실행한 스테이지
    pub stage: Stage,
    /// 모든 명령이 통과했는지 여부
    pub passed: bool,
    /// 명령 순서대로 정렬된 결과
    pub reports: Vec<CommandReport>,
    /// 소요 시간
    pub elapsed: Duration,
}

impl StageOutcome {
    /// 통과하지 못한 명령들
    pub fn failures(&self) -> impl Iterator<Item = &CommandReport> {
        self.reports.iter().filter(|r| !r.result.passed())
    }
}

/// 스테이지의 모든 명령을 동시에 실행합니다.
///
/// 명령이 없으면 즉시 통과합니다. `parent`가 취소되면 진행 중인 명령도 취소됩니다.
pub async fn run_stage(
    runner: &Arc<CommandRunner>,
    stage: Stage,
    commands: &[Command],
    timeout: Duration,
    parent: &CancellationToken,
) -> StageOutcome {
    let started = Instant::now();
    if commands.is_empty() {
        return StageOutcome {
            stage,
            passed: true,
            reports: Vec::new(),
            elapsed: Duration::ZERO,
        };
    }

    let deadline = started + timeout;
    let cancel = parent.child_token();
    let (tx, mut rx) = mpsc::channel(commands.len());

    for (index, command) in commands.iter().enumerate() {
        let runner = Arc::clone(runner);
        let command = command.clone();
        let cancel = cancel.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = runner.run(&command, deadline, &cancel).await;
            // 버퍼가 명령 수와 같으므로 수신측이 남아 있는 한 막히지 않음
            let _ = tx.send((index, result)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<CommandResult>> = (0..commands.len()).map(|_| None).collect();
    let mut passed = true;
    while let Some((index, result)) = rx.recv().await {
        let command = &commands[index];
        metrics::counter!(
            m::EXECUTOR_COMMANDS_TOTAL,
            m::LABEL_STAGE => stage.as_str(),
            m::LABEL_EXIT_CLASS => result.exit_class.as_str()
        )
        .increment(1);

        if result.passed() {
            debug!(
                stage = %stage,
                command = %command.cmd,
                result = result.output.as_ref().map_or("", |o| o.result.as_str()),
                "command passed"
            );
        } else {
            log_failure(stage, command, &result, passed);
            if passed {
                passed = false;
                cancel.cancel();
            }
        }
        slots[index] = Some(result);
    }

    let elapsed = started.elapsed();
    metrics::histogram!(
        m::EXECUTOR_STAGE_DURATION_SECONDS,
        m::LABEL_STAGE => stage.as_str(),
        m::LABEL_RESULT => if passed { "success" } else { "failure" }
    )
    .record(elapsed.as_secs_f64());

    // 태스크가 패닉하면 결과가 오지 않으므로 해당 슬롯은 실패로 간주
    let mut reports = Vec::with_capacity(commands.len());
    for (command, slot) in commands.iter().zip(slots) {
        match slot {
            Some(result) => reports.push(CommandReport {
                command: command.clone(),
                result,
            }),
            None => {
                warn!(stage = %stage, command = %command.cmd, "command task produced no result");
                passed = false;
            }
        }
    }

    StageOutcome {
        stage,
        passed,
        reports,
        elapsed,
    }
}

fn log_failure(stage: Stage, command: &Command, result: &CommandResult, first: bool) {
    let error = result
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "reported passed=false".to_owned());
    let detail = result.output.as_ref().map_or("", |o| o.result.as_str());

    if first {
        warn!(
            stage = %stage,
            command = %command.cmd,
            status = %result.exit_class,
            error = %error,
            result = detail,
            stderr = %result.stderr_lossy(),
            "command failed, cancelling stage"
        );
    } else {
        debug!(
            stage = %stage,
            command = %command.cmd,
            status = %result.exit_class,
            error = %error,
            "command failed after stage cancellation"
        );
    }
}
