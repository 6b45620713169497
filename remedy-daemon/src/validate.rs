//! Offline configuration check (`--validate`).
//!
//! Loads the rule definitions exactly as the classifier would and checks
//! every script they reference against the remediations directory, without
//! starting any module.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use remedy_classifier::{CompiledRules, RuleLoader};
use remedy_core::config::RemedyConfig;
use remedy_executor::CommandRunner;

/// Result of a configuration check.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Rule definitions file that was loaded.
    pub rules_file: String,
    /// Rules present in the file.
    pub rules_defined: usize,
    /// Rules whose regex compiled.
    pub rules_active: usize,
    /// Names of rules skipped because their regex did not compile.
    pub invalid_rules: Vec<String>,
    /// Directory scripts are resolved against.
    pub remediations_dir: String,
    /// Whether that directory exists.
    pub remediations_dir_exists: bool,
    /// Referenced scripts that are not valid single file names.
    pub invalid_script_names: Vec<String>,
    /// Referenced scripts that do not exist in the remediations directory.
    pub missing_scripts: Vec<String>,
}

impl ValidationReport {
    /// True when every rule compiled and every referenced script resolves.
    pub fn is_clean(&self) -> bool {
        self.invalid_rules.is_empty()
            && self.remediations_dir_exists
            && self.invalid_script_names.is_empty()
            && self.missing_scripts.is_empty()
    }
}

/// Load rules from the configured file and check the scripts they name.
///
/// # Errors
///
/// Returns an error if the rules file cannot be read or parsed.
pub async fn validate_config(config: &RemedyConfig) -> Result<ValidationReport> {
    let rules_file = config.classifier.rules_file.clone();
    let rules = RuleLoader::load_file(&rules_file)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load rules: {}", e))?;
    let compiled = CompiledRules::compile(rules);

    let active: BTreeSet<usize> = compiled.matchers().iter().map(|m| m.rule_index).collect();
    let invalid_rules = (0..compiled.total_count())
        .filter(|idx| !active.contains(idx))
        .filter_map(|idx| compiled.rule(idx).map(|r| r.name.clone()))
        .collect();

    let runner = CommandRunner::new(&config.executor.remediations_dir);
    let remediations_dir_exists = runner.remediations_dir().is_dir();

    let mut scripts = BTreeSet::new();
    for idx in 0..compiled.total_count() {
        if let Some(rule) = compiled.rule(idx) {
            scripts.extend(
                rule.pre_audits
                    .iter()
                    .chain(&rule.remediations)
                    .chain(&rule.post_audits)
                    .cloned(),
            );
        }
    }

    let mut invalid_script_names = Vec::new();
    let mut missing_scripts = Vec::new();
    for script in scripts {
        match runner.resolve(&script) {
            Ok(path) if is_file(&path) => {}
            Ok(_) => missing_scripts.push(script),
            Err(_) => invalid_script_names.push(script),
        }
    }

    Ok(ValidationReport {
        rules_file,
        rules_defined: compiled.total_count(),
        rules_active: compiled.active_count(),
        invalid_rules,
        remediations_dir: config.executor.remediations_dir.clone(),
        remediations_dir_exists,
        invalid_script_names,
        missing_scripts,
    })
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
