//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> module init -> start -> incident handling -> shutdown.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use remedy_core::config::RemedyConfig;
use remedy_daemon::orchestrator::Orchestrator;

const RULES: &str = r#"
- RuleName: process_crash
  AlertType: process
  DeviceType: server
  Regex: '(?P<process>\w+)\[\d+\]: segfault'
  PreAudits: [check_process.sh]
  Remediations: [restart_process.sh]
  PostAudits: [check_process.sh]
"#;

const AUDIT: &str = r#"#!/bin/sh
echo '{"success": true, "passed": true, "result": "ok"}'
"#;

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Every module disabled.
fn idle_config() -> RemedyConfig {
    RemedyConfig::parse(
        r#"
[general]
log_level = "info"
pid_file = ""

[sources]
file_enabled = false

[classifier]
enabled = false

[executor]
enabled = false

[metrics]
enabled = false
"#,
    )
    .expect("failed to parse idle config")
}

struct Fixture {
    _dir: tempfile::TempDir,
    config: RemedyConfig,
    marker: PathBuf,
    pid_file: PathBuf,
}

/// Log file, rules and scripts in a temp directory; all three modules enabled.
fn full_fixture(log_content: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("remediations");
    fs::create_dir(&scripts).unwrap();

    let marker = dir.path().join("restarted");
    write_script(&scripts, "check_process.sh", AUDIT);
    write_script(
        &scripts,
        "restart_process.sh",
        &format!(
            "#!/bin/sh\necho \"$1\" >> {}\necho '{{\"success\": true, \"passed\": true, \"result\": \"restarted\"}}'\n",
            marker.display()
        ),
    );

    let rules = dir.path().join("rules.yaml");
    fs::write(&rules, RULES).unwrap();

    let log = dir.path().join("syslog");
    fs::write(&log, log_content).unwrap();

    let pid_file = dir.path().join("run").join("remedy.pid");

    let config = RemedyConfig::parse(&format!(
        r#"
[general]
log_level = "info"
pid_file = "{pid}"

[sources]
file_enabled = true
syslog_file = "{log}"
read_from_start = true
poll_interval_ms = 50

[classifier]
enabled = true
rules_file = "{rules}"
worker_count = 2

[executor]
enabled = true
remediations_dir = "{scripts}"
stage_timeout_secs = 5

[metrics]
enabled = false
"#,
        pid = pid_file.display(),
        log = log.display(),
        rules = rules.display(),
        scripts = scripts.display(),
    ))
    .expect("failed to parse fixture config");

    Fixture {
        _dir: dir,
        config,
        marker,
        pid_file,
    }
}

async fn wait_for_file(path: &Path, timeout: Duration) -> Option<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Ok(content) = fs::read_to_string(path)
            && !content.is_empty()
        {
            return Some(content);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
}

#[tokio::test]
async fn idle_config_builds_without_modules() {
    // Given: Every module disabled
    let mut orchestrator = Orchestrator::build_from_config(idle_config())
        .await
        .expect("build should succeed");

    // Then: Nothing is registered and start/stop are no-ops
    assert_eq!(orchestrator.module_count(), 0);
    orchestrator.start().await.unwrap();
    assert!(orchestrator.health().await.status.is_healthy());
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut config = idle_config();
    config.general.log_level = "verbose".to_owned();

    let result = Orchestrator::build_from_config(config).await;

    assert!(result.is_err(), "invalid log level must fail the build");
}

#[tokio::test]
async fn modules_register_producers_first() {
    let fixture = full_fixture("");

    let orchestrator = Orchestrator::build_from_config(fixture.config.clone())
        .await
        .unwrap();

    assert_eq!(
        orchestrator.module_names(),
        vec!["tailers", "classifier", "executor"]
    );
}

#[tokio::test]
async fn log_line_flows_through_to_remediation() {
    // Given: A log file holding one matching and one unrelated line
    let fixture = full_fixture("kernel: eth0 up\nsshd[42]: segfault at 0\n");
    let mut orchestrator = Orchestrator::build_from_config(fixture.config.clone())
        .await
        .unwrap();

    // When: Running until the remediation script has left its marker
    let marker = fixture.marker.clone();
    let pid_file = fixture.pid_file.clone();
    let observed = std::sync::Arc::new(std::sync::Mutex::new(None));
    let observed_in = std::sync::Arc::clone(&observed);
    let shutdown = async move {
        let pid_written = pid_file.exists();
        let content = wait_for_file(&marker, Duration::from_secs(10)).await;
        *observed_in.lock().unwrap() = Some((pid_written, content));
        "test"
    };
    orchestrator.run_until(shutdown).await.expect("run should succeed");

    // Then: The remediation ran with the captured parameter as one argument
    let (pid_written, content) = observed.lock().unwrap().take().unwrap();
    assert!(pid_written, "PID file should exist while running");
    assert_eq!(content.as_deref(), Some("--process=sshd\n"));
    assert!(!fixture.pid_file.exists(), "PID file should be removed on exit");
}

#[tokio::test]
async fn startup_failure_rolls_back_and_removes_pid_file() {
    // Given: A classifier pointed at a rules file that does not exist
    let mut fixture = full_fixture("");
    fixture.config.classifier.rules_file = "/nonexistent/remedy/rules.yaml".to_owned();
    let mut orchestrator = Orchestrator::build_from_config(fixture.config.clone())
        .await
        .unwrap();

    // When: Running
    let result = orchestrator.run_until(std::future::pending()).await;

    // Then: Startup fails, the tailers were stopped again and the PID file is gone
    let err = result.expect_err("missing rules file should fail startup");
    assert!(err.to_string().contains("classifier"), "got: {err}");
    assert!(!fixture.pid_file.exists());
}

#[tokio::test]
async fn build_loads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remedy.toml");
    fs::write(
        &path,
        "[sources]\nfile_enabled = false\n[classifier]\nenabled = false\n[executor]\nenabled = false\n",
    )
    .unwrap();

    let orchestrator = Orchestrator::build(&path).await.unwrap();

    assert_eq!(orchestrator.module_count(), 0);
    assert!(!orchestrator.config().metrics.enabled);
}
