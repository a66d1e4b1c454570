//! Configuration file schema for sourcelint.
//!
//! Every section is optional; a missing file behaves like an empty one.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::duplication::DuplicationConfig;
use crate::rules::PatternRuleConfig;

/// File names searched for, in order, when no config path is given.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["sourcelint.yaml", ".sourcelint.yaml", "sourcelint.yml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: Option<String>,
    /// Glob patterns for paths to exclude from analysis (e.g., "**/generated/**")
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Analyze units on the rayon pool instead of streaming them.
    #[serde(default)]
    pub parallel: bool,
    /// Rule ids to skip, built-in or pattern.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    #[serde(default)]
    pub duplication: DuplicationSettings,
    #[serde(default)]
    pub rules: RuleSettings,
    #[serde(default)]
    pub patterns: Vec<PatternRuleConfig>,
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse a configuration from YAML text.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Look for a config file in `dir` using [`DEFAULT_CONFIG_NAMES`].
    pub fn discover<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.as_ref().join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Reject thresholds of zero and unnamed pattern rules.
    pub fn validate(&self) -> anyhow::Result<()> {
        let d = &self.duplication;
        for (name, value) in [
            ("duplication.min_unit_lines", d.min_unit_lines),
            ("duplication.min_block_tokens", d.min_block_tokens),
            ("duplication.min_block_statements", d.min_block_statements),
            ("rules.long_routine.max_lines", self.rules.long_routine.max_lines),
            (
                "rules.too_many_parameters.max_parameters",
                self.rules.too_many_parameters.max_parameters,
            ),
        ] {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }

        if let Some(index) = self.patterns.iter().position(|p| p.id.trim().is_empty()) {
            anyhow::bail!("patterns[{}] has an empty id", index);
        }

        Ok(())
    }

    /// Returns whether a rule id is not listed in `disabled_rules`.
    pub fn is_rule_enabled(&self, id: &str) -> bool {
        !self.disabled_rules.iter().any(|d| d == id)
    }

    /// Duplication thresholds, or `None` when the pass is disabled.
    pub fn duplication_config(&self) -> Option<DuplicationConfig> {
        if !self.duplication.enabled || !self.is_rule_enabled(crate::duplication::DUPLICATION_RULE_ID)
        {
            return None;
        }
        Some(DuplicationConfig {
            min_unit_lines: self.duplication.min_unit_lines,
            min_block_tokens: self.duplication.min_block_tokens,
            min_block_statements: self.duplication.min_block_statements,
        })
    }
}

/// Duplication pass settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DuplicationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_unit_lines")]
    pub min_unit_lines: usize,
    #[serde(default = "default_min_block_tokens")]
    pub min_block_tokens: usize,
    #[serde(default = "default_min_block_statements")]
    pub min_block_statements: usize,
}

impl Default for DuplicationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_unit_lines: default_min_unit_lines(),
            min_block_tokens: default_min_block_tokens(),
            min_block_statements: default_min_block_statements(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_min_unit_lines() -> usize {
    DuplicationConfig::default().min_unit_lines
}

fn default_min_block_tokens() -> usize {
    DuplicationConfig::default().min_block_tokens
}

fn default_min_block_statements() -> usize {
    DuplicationConfig::default().min_block_statements
}

/// Thresholds for the built-in rules.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RuleSettings {
    #[serde(default)]
    pub long_routine: LongRoutineSettings,
    #[serde(default)]
    pub too_many_parameters: TooManyParametersSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LongRoutineSettings {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

impl Default for LongRoutineSettings {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
        }
    }
}

fn default_max_lines() -> usize {
    crate::rules::DEFAULT_MAX_LINES
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TooManyParametersSettings {
    #[serde(default = "default_max_parameters")]
    pub max_parameters: usize,
}

impl Default for TooManyParametersSettings {
    fn default() -> Self {
        Self {
            max_parameters: default_max_parameters(),
        }
    }
}

fn default_max_parameters() -> usize {
    crate::rules::DEFAULT_MAX_PARAMETERS
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_str("").unwrap();
        assert!(config.duplication.enabled);
        assert_eq!(config.duplication.min_unit_lines, 5);
        assert_eq!(config.duplication.min_block_tokens, 50);
        assert_eq!(config.duplication.min_block_statements, 2);
        assert_eq!(config.rules.long_routine.max_lines, 60);
        assert_eq!(config.rules.too_many_parameters.max_parameters, 5);
        assert!(config.patterns.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
exclude: ["**/generated/**"]
parallel: true
disabled_rules: [too-many-parameters]
duplication:
  min_block_tokens: 30
rules:
  long_routine: { max_lines: 40 }
patterns:
  - id: no-dbg
    description: leftover dbg! call
    severity: warning
    category: Style
    pattern: "dbg!\\("
"#;
        let config = Config::parse_str(yaml).unwrap();

        assert_eq!(config.exclude, vec!["**/generated/**"]);
        assert!(config.parallel);
        assert!(!config.is_rule_enabled("too-many-parameters"));
        assert!(config.is_rule_enabled("long-routine"));
        assert_eq!(config.duplication.min_block_tokens, 30);
        assert_eq!(config.duplication.min_unit_lines, 5);
        assert_eq!(config.rules.long_routine.max_lines, 40);
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.patterns[0].pattern, r"dbg!\(");
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let err = Config::parse_str("duplication:\n  min_unit_lines: 0\n").unwrap_err();
        assert!(err.to_string().contains("min_unit_lines"));
    }

    #[test]
    fn test_validate_rejects_empty_pattern_id() {
        let yaml = "patterns:\n  - id: ''\n    pattern: x\n";
        assert!(Config::parse_str(yaml).is_err());
    }

    #[test]
    fn test_duplication_config_disabled() {
        let config = Config::parse_str("duplication:\n  enabled: false\n").unwrap();
        assert!(config.duplication_config().is_none());

        let config = Config::parse_str("disabled_rules: [duplicate-code]\n").unwrap();
        assert!(config.duplication_config().is_none());

        let enabled = Config::default().duplication_config().unwrap();
        assert_eq!(enabled, DuplicationConfig::default());
    }

    #[test]
    fn test_discover() {
        let dir = TempDir::new().unwrap();
        assert!(Config::discover(dir.path()).is_none());

        std::fs::write(dir.path().join(".sourcelint.yaml"), "parallel: true\n").unwrap();
        let found = Config::discover(dir.path()).unwrap();
        assert!(found.ends_with(".sourcelint.yaml"));
        assert!(Config::parse_file(found).unwrap().parallel);
    }
}
