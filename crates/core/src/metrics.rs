//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `remedy_`
//! - 모듈명: `tailer_`, `classifier_`, `executor_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(remedy_core::metrics::CLASSIFIER_LINES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소스 레이블 키 (file, syslog_udp, syslog_tcp)
pub const LABEL_SOURCE: &str = "source";

/// 룰 이름 레이블 키
pub const LABEL_RULE: &str = "rule";

/// 스테이지 레이블 키 (pre_audit, remediation, post_audit)
pub const LABEL_STAGE: &str = "stage";

/// 명령 결과 분류 레이블 키 (ok, configuration_error, output_protocol_error, execution_error)
pub const LABEL_EXIT_CLASS: &str = "exit_class";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Tailer 메트릭 ─────────────────────────────────────────────────

/// Tailer: 로그 큐로 발행된 라인 수 (counter, label: source)
pub const TAILER_LINES_PUBLISHED_TOTAL: &str = "remedy_tailer_lines_published_total";

/// Tailer: 발행 실패 수 (counter, label: source)
pub const TAILER_PUBLISH_ERRORS_TOTAL: &str = "remedy_tailer_publish_errors_total";

// ─── Classifier 메트릭 ─────────────────────────────────────────────

/// Classifier: 분류된 라인 수 (counter)
pub const CLASSIFIER_LINES_TOTAL: &str = "remedy_classifier_lines_total";

/// Classifier: 룰 매칭 수 (counter, label: rule)
pub const CLASSIFIER_RULE_MATCHES_TOTAL: &str = "remedy_classifier_rule_matches_total";

/// Classifier: 발행된 인시던트 수 (counter)
pub const CLASSIFIER_INCIDENTS_PUBLISHED_TOTAL: &str =
    "remedy_classifier_incidents_published_total";

/// Classifier: 인시던트 발행 실패 수 (counter)
pub const CLASSIFIER_PUBLISH_ERRORS_TOTAL: &str = "remedy_classifier_publish_errors_total";

/// Classifier: 활성 룰 수 (gauge)
pub const CLASSIFIER_RULES_LOADED: &str = "remedy_classifier_rules_loaded";

// ─── Executor 메트릭 ───────────────────────────────────────────────

/// Executor: 확인(ack)된 인시던트 수 (counter)
pub const EXECUTOR_INCIDENTS_ACKED_TOTAL: &str = "remedy_executor_incidents_acked_total";

/// Executor: 재큐잉된 인시던트 수 (counter, label: stage)
pub const EXECUTOR_INCIDENTS_REJECTED_TOTAL: &str = "remedy_executor_incidents_rejected_total";

/// Executor: dead-letter 큐로 옮겨진 인시던트 수 (counter)
pub const EXECUTOR_INCIDENTS_DEAD_LETTERED_TOTAL: &str =
    "remedy_executor_incidents_dead_lettered_total";

/// Executor: 디코딩 실패로 폐기된 메시지 수 (counter)
pub const EXECUTOR_MALFORMED_TOTAL: &str = "remedy_executor_malformed_total";

/// Executor: 실행된 명령 수 (counter, labels: stage, exit_class)
pub const EXECUTOR_COMMANDS_TOTAL: &str = "remedy_executor_commands_total";

/// Executor: 스테이지 소요 시간 (histogram, 초, labels: stage, result)
pub const EXECUTOR_STAGE_DURATION_SECONDS: &str = "remedy_executor_stage_duration_seconds";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "remedy_daemon_build_info";

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "remedy_daemon_uptime_seconds";

/// Daemon: 등록된 모듈 수 (gauge)
pub const DAEMON_MODULES_REGISTERED: &str = "remedy_daemon_modules_registered";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스테이지 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 기본 타임아웃(60s) 이상
pub const STAGE_DURATION_BUCKETS: [f64; 10] =
    [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        TAILER_LINES_PUBLISHED_TOTAL,
        "Raw log lines published to the log queue"
    );
    describe_counter!(
        TAILER_PUBLISH_ERRORS_TOTAL,
        "Raw log lines that failed to publish"
    );

    describe_counter!(CLASSIFIER_LINES_TOTAL, "Raw lines evaluated against rules");
    describe_counter!(
        CLASSIFIER_RULE_MATCHES_TOTAL,
        "Lines that matched a rule, by rule name"
    );
    describe_counter!(
        CLASSIFIER_INCIDENTS_PUBLISHED_TOTAL,
        "Incidents published to the incident queue"
    );
    describe_counter!(
        CLASSIFIER_PUBLISH_ERRORS_TOTAL,
        "Incidents that failed to encode or publish"
    );
    describe_gauge!(CLASSIFIER_RULES_LOADED, "Rules with a compiled matcher");

    describe_counter!(
        EXECUTOR_INCIDENTS_ACKED_TOTAL,
        "Incidents whose three stages all passed"
    );
    describe_counter!(
        EXECUTOR_INCIDENTS_REJECTED_TOTAL,
        "Incidents negatively acknowledged for redelivery, by failing stage"
    );
    describe_counter!(
        EXECUTOR_INCIDENTS_DEAD_LETTERED_TOTAL,
        "Incidents moved to the dead-letter queue after too many deliveries"
    );
    describe_counter!(
        EXECUTOR_MALFORMED_TOTAL,
        "Incident messages discarded because they could not be decoded"
    );
    describe_counter!(
        EXECUTOR_COMMANDS_TOTAL,
        "Commands run, by stage and exit classification"
    );
    describe_histogram!(
        EXECUTOR_STAGE_DURATION_SECONDS,
        "Wall-clock time of a single stage in seconds"
    );

    describe_gauge!(DAEMON_BUILD_INFO, "Build information, labelled by version");
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Seconds since the daemon started");
    describe_gauge!(DAEMON_MODULES_REGISTERED, "Modules registered with the daemon");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        TAILER_LINES_PUBLISHED_TOTAL,
        TAILER_PUBLISH_ERRORS_TOTAL,
        CLASSIFIER_LINES_TOTAL,
        CLASSIFIER_RULE_MATCHES_TOTAL,
        CLASSIFIER_INCIDENTS_PUBLISHED_TOTAL,
        CLASSIFIER_PUBLISH_ERRORS_TOTAL,
        CLASSIFIER_RULES_LOADED,
        EXECUTOR_INCIDENTS_ACKED_TOTAL,
        EXECUTOR_INCIDENTS_REJECTED_TOTAL,
        EXECUTOR_INCIDENTS_DEAD_LETTERED_TOTAL,
        EXECUTOR_MALFORMED_TOTAL,
        EXECUTOR_COMMANDS_TOTAL,
        EXECUTOR_STAGE_DURATION_SECONDS,
        DAEMON_BUILD_INFO,
        DAEMON_UPTIME_SECONDS,
        DAEMON_MODULES_REGISTERED,
    ];

    #[test]
    fn all_metrics_start_with_remedy_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("remedy_"),
                "Metric '{}' does not start with 'remedy_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn stage_duration_buckets_are_sorted() {
        let buckets = STAGE_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
