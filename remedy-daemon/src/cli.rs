//! CLI argument definitions for remedy-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use remedy_core::config::RemedyConfig;

/// Remedy automated remediation daemon.
///
/// Tails raw logs, classifies them against rule definitions and runs
/// the audit/remediation scripts of every resulting incident.
#[derive(Parser, Debug)]
#[command(name = "remedy-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to remedy.toml configuration file.
    #[arg(short, long, default_value = "/etc/remedy/remedy.toml")]
    pub config: PathBuf,

    /// Override the rule definitions file.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Override the directory holding audit and remediation scripts.
    #[arg(long)]
    pub remediations: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Load configuration and rules, report what would run, and exit.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of the file and environment values.
    pub fn apply_overrides(&self, config: &mut RemedyConfig) {
        if let Some(rules) = &self.rules {
            config.classifier.rules_file = rules.display().to_string();
        }
        if let Some(dir) = &self.remediations {
            config.executor.remediations_dir = dir.display().to_string();
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let cli = DaemonCli::try_parse_from(["remedy-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/remedy/remedy.toml"));
        assert!(!cli.validate);
        assert!(cli.rules.is_none());
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = DaemonCli::try_parse_from([
            "remedy-daemon",
            "--config",
            "/tmp/remedy.toml",
            "--rules",
            "/srv/rules.yaml",
            "--remediations",
            "/srv/fix",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--pid-file",
            "/run/remedy.pid",
            "--validate",
        ])
        .unwrap();

        let mut config = RemedyConfig::default();
        cli.apply_overrides(&mut config);

        assert!(cli.validate);
        assert_eq!(config.classifier.rules_file, "/srv/rules.yaml");
        assert_eq!(config.executor.remediations_dir, "/srv/fix");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.general.pid_file, "/run/remedy.pid");
    }

    #[test]
    fn absent_overrides_keep_config_values() {
        let cli = DaemonCli::try_parse_from(["remedy-daemon"]).unwrap();
        let mut config = RemedyConfig::default();
        let before = config.executor.remediations_dir.clone();
        cli.apply_overrides(&mut config);
        assert_eq!(config.executor.remediations_dir, before);
    }
}
