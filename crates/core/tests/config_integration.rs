//! remedy.toml 통합 설정 테스트
//!
//! - remedy.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;

use remedy_core::config::RemedyConfig;
use remedy_core::error::{ConfigError, RemedyError};
use serial_test::serial;

const EXAMPLE: &str = include_str!("../../../remedy.toml.example");

// =============================================================================
// remedy.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = RemedyConfig::parse(EXAMPLE).expect("example config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert!(config.general.pid_file.is_empty());
}

#[test]
fn example_config_passes_validation() {
    let config = RemedyConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let config = RemedyConfig::parse(EXAMPLE).expect("should parse");
    let defaults = RemedyConfig::default();

    assert_eq!(config.broker.host, defaults.broker.host);
    assert_eq!(config.broker.port, defaults.broker.port);
    assert_eq!(config.broker.log_queue, defaults.broker.log_queue);
    assert_eq!(config.broker.incident_queue, defaults.broker.incident_queue);
    assert_eq!(
        config.broker.dead_letter_queue,
        defaults.broker.dead_letter_queue
    );
    assert_eq!(config.sources.listen_port, defaults.sources.listen_port);
    assert_eq!(config.classifier.worker_count, defaults.classifier.worker_count);
    assert_eq!(config.classifier.engine, defaults.classifier.engine);
    assert_eq!(
        config.executor.stage_timeout_secs,
        defaults.executor.stage_timeout_secs
    );
    assert_eq!(
        config.executor.max_delivery_attempts,
        defaults.executor.max_delivery_attempts
    );
    assert_eq!(config.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn only_executor_section_keeps_other_defaults() {
    let config = RemedyConfig::parse(
        r#"
[executor]
remediations_dir = "/opt/remediations"
stage_timeout_secs = 10
"#,
    )
    .expect("should parse");

    assert_eq!(config.executor.remediations_dir, "/opt/remediations");
    assert_eq!(config.executor.stage_timeout_secs, 10);
    assert_eq!(config.executor.prefetch, 1);
    assert!(config.classifier.enabled);
    assert_eq!(config.broker.port, 5672);
}

#[test]
fn unknown_type_in_section_is_parse_error() {
    let err = RemedyConfig::parse(
        r#"
[classifier]
worker_count = "ten"
"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RemedyError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 파일 로딩 + 환경변수 우선순위
// =============================================================================

#[tokio::test]
#[serial]
async fn load_applies_env_over_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[broker]\nhost = \"file-host\"\n\n[executor]\nstage_timeout_secs = 20"
    )
    .expect("write config");

    // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
    unsafe { std::env::set_var("REMEDY_BROKER_HOST", "env-host") };
    let result = RemedyConfig::load(file.path()).await;
    unsafe { std::env::remove_var("REMEDY_BROKER_HOST") };

    let config = result.expect("load should succeed");
    assert_eq!(config.broker.host, "env-host");
    assert_eq!(config.executor.stage_timeout_secs, 20);
}

#[tokio::test]
#[serial]
async fn load_validates_after_env_override() {
    let file = tempfile::NamedTempFile::new().expect("temp file");

    // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
    unsafe { std::env::set_var("REMEDY_EXECUTOR_STAGE_TIMEOUT_SECS", "0") };
    let result = RemedyConfig::load(file.path()).await;
    unsafe { std::env::remove_var("REMEDY_EXECUTOR_STAGE_TIMEOUT_SECS") };

    let err = result.unwrap_err();
    assert!(err.to_string().contains("stage_timeout_secs"));
}

#[tokio::test]
async fn empty_file_loads_defaults() {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let config = RemedyConfig::from_file(file.path())
        .await
        .expect("empty file should parse");
    assert_eq!(config.general.log_level, "info");
}

#[tokio::test]
async fn malformed_file_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[broker\nhost = ").expect("write config");
    let err = RemedyConfig::from_file(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        RemedyError::Config(ConfigError::ParseFailed { .. })
    ));
}
