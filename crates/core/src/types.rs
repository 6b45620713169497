//! 도메인 타입 -- 룰, 명령, 인시던트
//!
//! 분류기는 [`Rule`]에 매칭된 원시 텍스트로부터 [`Incident`]를 만들고,
//! 실행기는 인시던트의 [`Command`] 목록을 스테이지별로 실행합니다.
//! 필드 이름은 룰 파일과 큐 메시지의 wire 형식을 그대로 따릅니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 선언적 룰 정의
///
/// 룰 파일의 한 항목입니다. 로드 후에는 변경되지 않으며,
/// 파일 내 순서가 매칭 우선순위가 됩니다.
///
/// 인시던트에 스냅샷으로 실리므로 역직렬화 시 모든 필드가 필수입니다.
/// 생략 가능한 필드의 기본값 처리는 룰 로더가 담당합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 룰 이름
    #[serde(rename = "RuleName")]
    pub name: String,
    /// 알림 유형
    #[serde(rename = "AlertType")]
    pub alert_type: String,
    /// 장비 유형
    #[serde(rename = "DeviceType")]
    pub device_type: String,
    /// 정규식 (이름 있는 캡처 그룹이 파라미터가 됨)
    #[serde(rename = "Regex")]
    pub regex: String,
    /// 사전 감사 스크립트 이름
    #[serde(rename = "PreAudits")]
    pub pre_audits: Vec<String>,
    /// 조치 스크립트 이름
    #[serde(rename = "Remediations")]
    pub remediations: Vec<String>,
    /// 사후 감사 스크립트 이름
    #[serde(rename = "PostAudits")]
    pub post_audits: Vec<String>,
}

/// 실행할 외부 명령
///
/// 스크립트 이름과, 인시던트 파라미터를 `--key=value` 토큰으로 펼친
/// 단일 인자 문자열로 구성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// 실행할 스크립트 이름
    #[serde(rename = "Cmd")]
    pub cmd: String,
    /// 공백으로 연결된 `--key=value` 토큰
    #[serde(rename = "Args")]
    pub args: String,
}

impl Command {
    /// 파라미터 집합을 인자 문자열로 바인딩하여 명령을 생성합니다.
    pub fn bind(cmd: impl Into<String>, parameters: &BTreeMap<String, String>) -> Self {
        Self {
            cmd: cmd.into(),
            args: format_arguments(parameters),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.cmd)
        } else {
            write!(f, "{} {}", self.cmd, self.args)
        }
    }
}

/// 파라미터 맵을 `--key=value` 토큰을 공백으로 이은 문자열로 만듭니다.
pub fn format_arguments(parameters: &BTreeMap<String, String>) -> String {
    parameters
        .iter()
        .map(|(key, value)| format!("--{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 실행 스테이지
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 사전 감사
    PreAudit,
    /// 조치
    Remediation,
    /// 사후 감사
    PostAudit,
}

impl Stage {
    /// 실행 순서대로 나열한 전체 스테이지
    pub const ALL: [Stage; 3] = [Stage::PreAudit, Stage::Remediation, Stage::PostAudit];

    /// 로그/메트릭 레이블에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreAudit => "pre_audit",
            Self::Remediation => "remediation",
            Self::PostAudit => "post_audit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 룰 매칭으로 생성된 인시던트
///
/// 분류기가 생성한 뒤에는 변경되지 않으며, 큐를 통해 실행기로 전달되어
/// 정확히 한 번 소비됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Incident {
    /// 인시던트 ID (로그 상관관계용)
    pub id: Uuid,
    /// 매칭된 룰의 스냅샷
    pub rule: Rule,
    /// 매칭된 원시 텍스트
    pub raw_incident: String,
    /// 인시던트를 감지한 엔진 태그
    pub engine: String,
    /// 사전 감사 명령
    pub pre_audits: Vec<Command>,
    /// 조치 명령
    pub remediations: Vec<Command>,
    /// 사후 감사 명령
    pub post_audits: Vec<Command>,
    /// 이름 있는 캡처 그룹에서 추출한 파라미터
    pub parameters: BTreeMap<String, String>,
}

impl Incident {
    /// 룰과 추출된 파라미터로 인시던트를 생성합니다.
    ///
    /// 룰의 각 스크립트 이름은 동일한 인자 문자열로 바인딩됩니다.
    pub fn from_match(
        rule: &Rule,
        parameters: BTreeMap<String, String>,
        raw: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        let bind = |names: &[String]| -> Vec<Command> {
            names
                .iter()
                .map(|name| Command::bind(name.as_str(), &parameters))
                .collect()
        };

        Self {
            id: Uuid::new_v4(),
            rule: rule.clone(),
            raw_incident: raw.into(),
            engine: engine.into(),
            pre_audits: bind(&rule.pre_audits),
            remediations: bind(&rule.remediations),
            post_audits: bind(&rule.post_audits),
            parameters,
        }
    }

    /// 스테이지에 해당하는 명령 목록
    pub fn commands(&self, stage: Stage) -> &[Command] {
        match stage {
            Stage::PreAudit => &self.pre_audits,
            Stage::Remediation => &self.remediations,
            Stage::PostAudit => &self.post_audits,
        }
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] rule={} engine={} params={}",
            self.id,
            self.rule.name,
            self.engine,
            self.parameters.len()
        )
    }
}
