//! 룰 파일 로더 -- YAML 룰 목록을 디스크에서 로드합니다.
//!
//! 룰 파일은 [`Rule`] 항목의 YAML 시퀀스입니다. 파일 내 순서가 매칭 우선순위가 되므로
//! 로더는 순서를 그대로 보존합니다.
//!
//! ```yaml
//! - RuleName: process_crash
//!   AlertType: process
//!   DeviceType: server
//!   Regex: '(?P<process>\w+)\[\d+\]: segfault'
//!   PreAudits: [check_process.py]
//!   Remediations: [restart_process.py]
//!   PostAudits: [check_process.py]
//! ```

use std::path::Path;

use serde::Deserialize;

use remedy_core::types::Rule;

use crate::error::ClassifierError;

/// 룰 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 최대 룰 수
const MAX_RULES_COUNT: usize = 10_000;

/// 룰 파일의 한 항목
///
/// `RuleName`과 `Regex`만 필수이고 나머지는 생략 시 빈 값이 됩니다.
#[derive(Debug, Deserialize)]
struct RuleDefinition {
    #[serde(rename = "RuleName")]
    name: String,
    #[serde(rename = "AlertType", default)]
    alert_type: String,
    #[serde(rename = "DeviceType", default)]
    device_type: String,
    #[serde(rename = "Regex")]
    regex: String,
    #[serde(rename = "PreAudits", default)]
    pre_audits: Vec<String>,
    #[serde(rename = "Remediations", default)]
    remediations: Vec<String>,
    #[serde(rename = "PostAudits", default)]
    post_audits: Vec<String>,
}

impl From<RuleDefinition> for Rule {
    fn from(def: RuleDefinition) -> Self {
        Self {
            name: def.name,
            alert_type: def.alert_type,
            device_type: def.device_type,
            regex: def.regex,
            pre_audits: def.pre_audits,
            remediations: def.remediations,
            post_audits: def.post_audits,
        }
    }
}

/// 룰 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// YAML 파일에서 룰 목록을 로드합니다.
    ///
    /// # Errors
    /// - 파일을 읽을 수 없거나 크기 제한을 넘는 경우
    /// - YAML 문서가 룰 목록 형식이 아닌 경우
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<Rule>, ClassifierError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ClassifierError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(ClassifierError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ClassifierError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let rules = Self::parse_yaml(&content, &path.display().to_string())?;
        tracing::info!(path = %path.display(), count = rules.len(), "loaded rule definitions");
        Ok(rules)
    }

    /// YAML 문자열을 룰 목록으로 파싱합니다.
    ///
    /// 빈 문서는 빈 목록입니다. 이름이 비어 있는 항목은 경고 후 제외합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<Rule>, ClassifierError> {
        if yaml_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed: Vec<RuleDefinition> =
            serde_yaml::from_str(yaml_str).map_err(|e| ClassifierError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        if parsed.len() > MAX_RULES_COUNT {
            return Err(ClassifierError::RuleLoad {
                path: source.to_owned(),
                reason: format!("too many rules: max {MAX_RULES_COUNT}"),
            });
        }

        let mut rules = Vec::with_capacity(parsed.len());
        for (index, rule) in parsed.into_iter().map(Rule::from).enumerate() {
            if rule.name.trim().is_empty() {
                tracing::warn!(source, index, "rule without RuleName, skipping");
                continue;
            }
            if rules.iter().any(|r: &Rule| r.name == rule.name) {
                // 순서가 의미를 가지므로 제외하지 않고 경고만 남김
                tracing::warn!(source, rule = %rule.name, "duplicate rule name");
            }
            rules.push(rule);
        }

        Ok(rules)
    }
}
