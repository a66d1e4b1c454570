//! Rule registry with eager validation.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use super::{PatternRule, PatternRuleConfig, Rule};

/// Errors raised when a rule cannot be registered.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("rule id must not be empty")]
    EmptyId,
    #[error("rule `{id}` has an empty category")]
    EmptyCategory { id: String },
    #[error("rule `{id}` declares unknown severity `{severity}` (expected error, warning or info)")]
    InvalidSeverity { id: String, severity: String },
    #[error("rule `{id}` is already registered")]
    DuplicateId { id: String },
    #[error("rule `{id}` has an invalid pattern: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// Holds validated rules in registration order.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
    ids: HashSet<String>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a rule.
    pub fn register<R: Rule + 'static>(&mut self, rule: R) -> Result<(), RegistrationError> {
        self.register_arc(Arc::new(rule))
    }

    /// Validate and add a shared rule.
    ///
    /// Fails without adding the rule if its id is empty or already taken, or
    /// its category is empty.
    pub fn register_arc(&mut self, rule: Arc<dyn Rule>) -> Result<(), RegistrationError> {
        let meta = rule.metadata();
        if meta.id.trim().is_empty() {
            return Err(RegistrationError::EmptyId);
        }
        if meta.category.trim().is_empty() {
            return Err(RegistrationError::EmptyCategory {
                id: meta.id.clone(),
            });
        }
        if self.ids.contains(&meta.id) {
            return Err(RegistrationError::DuplicateId {
                id: meta.id.clone(),
            });
        }

        tracing::debug!(rule = %meta.id, "registered rule");
        self.ids.insert(meta.id.clone());
        self.rules.push(rule);
        Ok(())
    }

    /// Build a pattern rule from its declarative definition and register it.
    ///
    /// The definition's severity string is validated here.
    pub fn register_pattern(&mut self, def: &PatternRuleConfig) -> Result<(), RegistrationError> {
        let rule = PatternRule::from_config(def)?;
        self.register(rule)
    }

    /// All rules in registration order.
    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Rule>> {
        self.rules.iter().find(|r| r.metadata().id == id).cloned()
    }

    /// Rule ids in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.metadata().id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Finding, RuleMetadata, Severity};
    use crate::source::SourceUnit;

    struct Fixed(RuleMetadata);

    impl Rule for Fixed {
        fn metadata(&self) -> &RuleMetadata {
            &self.0
        }

        fn analyze(&self, _unit: &SourceUnit) -> anyhow::Result<Vec<Finding>> {
            Ok(Vec::new())
        }
    }

    fn rule(id: &str, category: &str) -> Fixed {
        Fixed(RuleMetadata::new(id, "test rule", Severity::Warning, category))
    }

    fn pattern(id: &str, severity: &str, regex: &str) -> PatternRuleConfig {
        PatternRuleConfig {
            id: id.to_string(),
            description: None,
            severity: severity.to_string(),
            category: "Style".to_string(),
            pattern: regex.to_string(),
        }
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = RuleRegistry::new();
        registry.register(rule("zeta", "Style")).unwrap();
        registry.register(rule("alpha", "Style")).unwrap();
        registry.register(rule("mid", "Design")).unwrap();

        assert_eq!(registry.ids(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_rejects_empty_id() {
        let mut registry = RuleRegistry::new();
        let err = registry.register(rule("", "Style")).unwrap_err();
        assert!(matches!(err, RegistrationError::EmptyId));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_empty_category() {
        let mut registry = RuleRegistry::new();
        let err = registry.register(rule("naming", " ")).unwrap_err();
        assert!(matches!(err, RegistrationError::EmptyCategory { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let mut registry = RuleRegistry::new();
        registry.register(rule("naming", "Style")).unwrap();
        let err = registry.register(rule("naming", "Design")).unwrap_err();

        assert!(matches!(err, RegistrationError::DuplicateId { ref id } if id == "naming"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.rules()[0].metadata().category, "Style");
    }

    #[test]
    fn test_rejects_unknown_severity() {
        let mut registry = RuleRegistry::new();
        let err = registry
            .register_pattern(&pattern("no-dbg", "critical", r"dbg!\("))
            .unwrap_err();

        assert!(matches!(err, RegistrationError::InvalidSeverity { ref severity, .. } if severity == "critical"));
        assert!(err.to_string().contains("critical"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_invalid_pattern() {
        let mut registry = RuleRegistry::new();
        let err = registry
            .register_pattern(&pattern("broken", "info", "(unclosed"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    }

    #[test]
    fn test_accepts_valid_pattern() {
        let mut registry = RuleRegistry::new();
        registry
            .register_pattern(&pattern("no-dbg", "Warning", r"dbg!\("))
            .unwrap();
        let rule = registry.get("no-dbg").unwrap();
        assert_eq!(rule.metadata().severity, Severity::Warning);
    }
}
