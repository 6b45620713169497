//! 룰 컴파일러 -- 룰 정의를 정규식 매처 목록으로 변환합니다.
//!
//! 정규식이 컴파일되지 않는 룰은 경고 로그를 남기고 제외합니다.
//! 나머지 룰은 원래 순서를 유지하며, 결과는 로드 후 변경되지 않습니다.

use std::collections::BTreeMap;

use regex::{Regex, RegexSet};

use remedy_core::types::Rule;

use crate::error::ClassifierError;

/// 컴파일된 매처 하나
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    /// 원본 룰 목록에서의 인덱스
    pub rule_index: usize,
    /// 컴파일된 정규식
    pub regex: Regex,
}

/// 첫 번째 매칭 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    /// 매칭된 룰
    pub rule: &'a Rule,
    /// 이름 있는 캡처 그룹 → 캡처된 부분 문자열
    pub parameters: BTreeMap<String, String>,
}

/// 컴파일된 룰 집합
///
/// 여러 분류기 워커가 `Arc`로 공유하며 읽기 전용으로만 사용합니다.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    /// 원본 룰 (컴파일 실패한 룰 포함, 인덱스 보존)
    rules: Vec<Rule>,
    /// 룰 순서대로 정렬된 매처
    matchers: Vec<CompiledMatcher>,
    /// 빠른 불일치 판정용 사전 필터. 구성에 실패하면 None.
    prefilter: Option<RegexSet>,
}

impl CompiledRules {
    /// 룰 목록을 컴파일합니다.
    ///
    /// 컴파일에 실패한 룰은 매처 목록에서 빠지지만 나머지 룰은 계속 매칭됩니다.
    pub fn compile(rules: Vec<Rule>) -> Self {
        let mut matchers = Vec::with_capacity(rules.len());

        for (rule_index, rule) in rules.iter().enumerate() {
            match compile_rule(rule) {
                Ok(regex) => matchers.push(CompiledMatcher { rule_index, regex }),
                Err(e) => {
                    tracing::warn!(rule = %rule.name, error = %e, "skipping rule with invalid regex");
                }
            }
        }

        let prefilter = if matchers.is_empty() {
            None
        } else {
            RegexSet::new(matchers.iter().map(|m| m.regex.as_str()))
                .map_err(|e| {
                    tracing::debug!(error = %e, "regex prefilter unavailable, using linear scan");
                })
                .ok()
        };

        tracing::info!(
            total = rules.len(),
            active = matchers.len(),
            skipped = rules.len() - matchers.len(),
            "compiled rules"
        );

        Self {
            rules,
            matchers,
            prefilter,
        }
    }

    /// 매칭 가능한 룰 수
    pub fn active_count(&self) -> usize {
        self.matchers.len()
    }

    /// 로드된 전체 룰 수 (컴파일 실패 포함)
    pub fn total_count(&self) -> usize {
        self.rules.len()
    }

    /// 매처가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// 매처 목록
    pub fn matchers(&self) -> &[CompiledMatcher] {
        &self.matchers
    }

    /// 인덱스로 원본 룰을 조회합니다.
    pub fn rule(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// 텍스트와 매칭되는 첫 번째 룰을 찾습니다.
    ///
    /// 룰 순서대로 검사하여 처음 매칭된 룰만 반환합니다.
    /// 참여한 이름 있는 그룹만 파라미터가 되며, 전체 매치(0번 그룹)와
    /// 이름 없는 그룹은 제외됩니다.
    pub fn first_match(&self, text: &str) -> Option<RuleMatch<'_>> {
        let matcher = match &self.prefilter {
            Some(set) => {
                // RegexSet 인덱스는 matchers 순서와 같으므로 가장 작은 인덱스가 첫 매칭
                let index = set.matches(text).into_iter().next()?;
                self.matchers.get(index)?
            }
            None => self.matchers.iter().find(|m| m.regex.is_match(text))?,
        };

        let captures = matcher.regex.captures(text)?;
        let parameters = matcher
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_owned(), m.as_str().to_owned()))
            })
            .collect();

        let rule = self.rules.get(matcher.rule_index)?;
        Some(RuleMatch { rule, parameters })
    }
}

/// 단일 룰의 정규식을 컴파일합니다.
pub fn compile_rule(rule: &Rule) -> Result<Regex, ClassifierError> {
    Regex::new(&rule.regex).map_err(|e| ClassifierError::InvalidRegex {
        rule: rule.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, regex: &str) -> Rule {
        Rule {
            name: name.to_owned(),
            alert_type: String::new(),
            device_type: String::new(),
            regex: regex.to_owned(),
            pre_audits: Vec::new(),
            remediations: vec![format!("{name}.py")],
            post_audits: Vec::new(),
        }
    }

    #[test]
    fn invalid_regex_is_skipped_and_others_still_match() {
        let compiled = CompiledRules::compile(vec![
            rule("broken", r"(unclosed"),
            rule("valid", r"disk (?P<mount>\S+) full"),
        ]);

        assert_eq!(compiled.total_count(), 2);
        assert_eq!(compiled.active_count(), 1);
        assert_eq!(compiled.matchers()[0].rule_index, 1);

        let m = compiled.first_match("disk /var full").unwrap();
        assert_eq!(m.rule.name, "valid");
        assert_eq!(m.parameters["mount"], "/var");
    }

    #[test]
    fn named_groups_become_parameters() {
        let compiled = CompiledRules::compile(vec![rule(
            "login",
            r"user=(?P<user>\w+) host=(?P<host>\w+)",
        )]);
        let m = compiled.first_match("user=alice host=db1").unwrap();

        let expected: BTreeMap<String, String> = [
            ("user".to_owned(), "alice".to_owned()),
            ("host".to_owned(), "db1".to_owned()),
        ]
        .into_iter()
        .collect();
        assert_eq!(m.parameters, expected);
    }

    #[test]
    fn unnamed_and_whole_match_groups_are_excluded() {
        let compiled =
            CompiledRules::compile(vec![rule("mixed", r"(\d+) errors on (?P<host>\w+)")]);
        let m = compiled.first_match("12 errors on web3").unwrap();
        assert_eq!(m.parameters.len(), 1);
        assert_eq!(m.parameters["host"], "web3");
    }

    #[test]
    fn non_participating_named_group_is_omitted() {
        let compiled = CompiledRules::compile(vec![rule(
            "optional",
            r"link (?P<iface>\S+) down(?: reason=(?P<reason>\w+))?",
        )]);
        let m = compiled.first_match("link eth0 down").unwrap();
        assert_eq!(m.parameters.get("iface").map(String::as_str), Some("eth0"));
        assert!(!m.parameters.contains_key("reason"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let compiled = CompiledRules::compile(vec![
            rule("specific", r"nginx crashed"),
            rule("generic", r"(?P<proc>\w+) crashed"),
        ]);
        let m = compiled.first_match("nginx crashed").unwrap();
        assert_eq!(m.rule.name, "specific");
        assert!(m.parameters.is_empty());

        let m = compiled.first_match("redis crashed").unwrap();
        assert_eq!(m.rule.name, "generic");
    }

    #[test]
    fn no_match_returns_none() {
        let compiled = CompiledRules::compile(vec![rule("a", r"^alpha$")]);
        assert!(compiled.first_match("beta").is_none());
    }

    #[test]
    fn empty_rule_set_never_matches() {
        let compiled = CompiledRules::compile(Vec::new());
        assert!(compiled.is_empty());
        assert!(compiled.first_match("anything").is_none());
    }

    #[test]
    fn match_is_searched_anywhere_in_text() {
        let compiled = CompiledRules::compile(vec![rule("oom", r"Out of memory: Kill process (?P<pid>\d+)")]);
        let m = compiled
            .first_match("Oct 19 10:00:01 host kernel: Out of memory: Kill process 4242 (java)")
            .unwrap();
        assert_eq!(m.parameters["pid"], "4242");
    }
}
