//! Declarative regex rules defined in configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::source::SourceUnit;

use super::{Finding, RegistrationError, Rule, RuleMetadata, Severity};

/// A pattern rule as written in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternRuleConfig {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// One of "error", "warning" or "info" (case-insensitive).
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub pattern: String,
}

fn default_severity() -> String {
    "warning".to_string()
}

fn default_category() -> String {
    "Pattern".to_string()
}

/// Matches a regex against every line of a unit.
pub struct PatternRule {
    meta: RuleMetadata,
    regex: Regex,
}

impl PatternRule {
    /// Compile a pattern rule, validating its severity and regex.
    pub fn from_config(def: &PatternRuleConfig) -> Result<Self, RegistrationError> {
        let severity: Severity =
            def.severity
                .parse()
                .map_err(|_| RegistrationError::InvalidSeverity {
                    id: def.id.clone(),
                    severity: def.severity.clone(),
                })?;

        let regex = Regex::new(&def.pattern).map_err(|source| RegistrationError::InvalidPattern {
            id: def.id.clone(),
            source,
        })?;

        let description = def
            .description
            .clone()
            .unwrap_or_else(|| format!("Forbidden pattern {:?}", def.pattern));

        Ok(Self {
            meta: RuleMetadata::new(def.id.clone(), description, severity, def.category.clone()),
            regex,
        })
    }
}

impl Rule for PatternRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.meta
    }

    fn analyze(&self, unit: &SourceUnit) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for (line_num, line) in unit.source().lines().enumerate() {
            for mat in self.regex.find_iter(line) {
                // Skip if match is inside a string literal
                if is_inside_string_literal(line, mat.start()) {
                    continue;
                }
                findings.push(
                    self.meta
                        .finding(
                            unit.path(),
                            line_num + 1,
                            format!("pattern {:?} found: {}", mat.as_str(), self.meta.description),
                        )
                        .with_property("column", (mat.start() + 1).to_string()),
                );
            }
        }

        Ok(findings)
    }
}

/// Check if a byte position in a line falls within a string literal.
/// Supports double-quoted, single-quoted, and backtick strings with escape handling.
fn is_inside_string_literal(line: &str, pos: usize) -> bool {
    let mut in_string = false;
    let mut string_char = None;
    let mut escaped = false;

    for (i, ch) in line.char_indices() {
        if i >= pos {
            return in_string;
        }

        if escaped {
            escaped = false;
            continue;
        }

        if ch == '\\' && in_string {
            escaped = true;
            continue;
        }

        if matches!(ch, '"' | '\'' | '`') {
            match string_char {
                None => {
                    in_string = true;
                    string_char = Some(ch);
                }
                Some(open) if open == ch => {
                    in_string = false;
                    string_char = None;
                }
                Some(_) => {}
            }
        }
    }

    in_string
}
