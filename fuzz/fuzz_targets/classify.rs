#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use remedy_classifier::{CompiledRules, classify};
use remedy_core::types::{Rule, Stage};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 룰 정규식 목록 (최대 8개로 제한)
    patterns: Vec<String>,
    /// 분류할 원시 라인
    line: String,
}

fuzz_target!(|input: FuzzInput| {
    let rules: Vec<Rule> = input
        .patterns
        .into_iter()
        .take(8)
        .enumerate()
        .map(|(i, regex)| Rule {
            name: format!("fuzz_{i}"),
            alert_type: String::new(),
            device_type: String::new(),
            regex,
            pre_audits: vec!["audit.sh".to_owned()],
            remediations: vec!["fix.sh".to_owned()],
            post_audits: Vec::new(),
        })
        .collect();

    let compiled = CompiledRules::compile(rules);

    // 매칭된 룰의 스크립트 수만큼 명령이 생성되어야 함
    if let Some(incident) = classify(&compiled, &input.line, "SYSLOGPROC") {
        assert_eq!(incident.commands(Stage::PreAudit).len(), 1);
        assert_eq!(incident.commands(Stage::Remediation).len(), 1);
        assert!(incident.commands(Stage::PostAudit).is_empty());
    }
});
