//! Core types for rule output: severities, findings and execution faults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Severity levels for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Identity and classification of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMetadata {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    pub category: String,
}

impl RuleMetadata {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            severity,
            category: category.into(),
        }
    }

    /// Build a finding attributed to this rule.
    pub fn finding(
        &self,
        source_path: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Finding {
        Finding::new(
            source_path,
            self.id.clone(),
            message,
            line,
            self.severity,
            self.category.clone(),
        )
    }

    /// Whether a finding carries exactly this rule's identity.
    pub fn owns(&self, finding: &Finding) -> bool {
        finding.rule_id == self.id
            && finding.severity == self.severity
            && finding.category == self.category
    }
}

/// A single diagnostic emitted by a rule at a specific location.
///
/// Findings are immutable once built: fields are only readable through
/// accessors, and the property bag can only be filled while constructing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    source_path: String,
    rule_id: String,
    message: String,
    line: usize,
    severity: Severity,
    category: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

impl Finding {
    /// Create a finding. Line numbers are 1-indexed; 0 is clamped to 1.
    pub fn new(
        source_path: impl Into<String>,
        rule_id: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        severity: Severity,
        category: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            rule_id: rule_id.into(),
            message: message.into(),
            line: line.max(1),
            severity,
            category: category.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Attach a structured property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// How a rule failed on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    /// The rule returned an error.
    Error,
    /// The rule panicked.
    Panic,
    /// The rule emitted a finding that does not carry its own identity.
    Contract,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Error => write!(f, "error"),
            FaultKind::Panic => write!(f, "panic"),
            FaultKind::Contract => write!(f, "contract"),
        }
    }
}

/// A recovered failure of one rule on one source unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionFault {
    rule_id: String,
    source_path: String,
    kind: FaultKind,
    message: String,
}

impl ExecutionFault {
    pub fn new(
        rule_id: impl Into<String>,
        source_path: impl Into<String>,
        kind: FaultKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            source_path: source_path.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rule {} failed on {} ({}): {}",
            self.rule_id, self.source_path, self.kind, self.message
        )
    }
}
