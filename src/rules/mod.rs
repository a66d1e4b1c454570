//! Analysis rules and the registry that holds them.
//!
//! A rule is a stateless, deterministic function from one [`SourceUnit`] to
//! zero or more findings, plus fixed metadata. "No finding" is an empty
//! vector. Rules report failures by returning an error; the engine turns
//! those into execution faults instead of aborting the run.
//!
//! # Adding a New Rule
//!
//! Implement [`Rule`], build findings with [`RuleMetadata::finding`] so they
//! carry the rule's identity, and register it in [`build_registry`].

mod long_routine;
mod parameters;
mod pattern;
mod registry;
mod types;

pub use long_routine::{LongRoutineRule, DEFAULT_MAX_LINES};
pub use parameters::{TooManyParametersRule, DEFAULT_MAX_PARAMETERS};
pub use pattern::{PatternRule, PatternRuleConfig};
pub use registry::{RegistrationError, RuleRegistry};
pub use types::{ExecutionFault, FaultKind, Finding, RuleMetadata, Severity};

use crate::config::Config;
use crate::source::SourceUnit;

/// A single analysis rule.
///
/// Implementations must be side-effect free: the same unit always yields the
/// same findings. Rules may run concurrently against different units.
pub trait Rule: Send + Sync {
    /// Identity, severity and category of this rule.
    fn metadata(&self) -> &RuleMetadata;

    /// Analyze one unit.
    fn analyze(&self, unit: &SourceUnit) -> anyhow::Result<Vec<Finding>>;
}

/// Assemble the registry for a run from configuration.
///
/// Built-in rules come first, then pattern rules in declaration order. Rules
/// listed in `disabled_rules` are skipped.
pub fn build_registry(config: &Config) -> Result<RuleRegistry, RegistrationError> {
    let mut registry = RuleRegistry::new();

    let long_routine = LongRoutineRule::new(config.rules.long_routine.max_lines);
    if config.is_rule_enabled(&long_routine.metadata().id) {
        registry.register(long_routine)?;
    }

    let parameters = TooManyParametersRule::new(config.rules.too_many_parameters.max_parameters);
    if config.is_rule_enabled(&parameters.metadata().id) {
        registry.register(parameters)?;
    }

    for def in &config.patterns {
        if config.is_rule_enabled(&def.id) {
            registry.register_pattern(def)?;
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_registry_defaults() {
        let registry = build_registry(&Config::default()).unwrap();
        assert_eq!(registry.ids(), vec!["long-routine", "too-many-parameters"]);
    }

    #[test]
    fn test_build_registry_disabled_and_patterns() {
        let config = Config {
            disabled_rules: vec!["long-routine".to_string()],
            patterns: vec![PatternRuleConfig {
                id: "no-print".to_string(),
                description: Some("stray print".to_string()),
                severity: "info".to_string(),
                category: "Style".to_string(),
                pattern: r"println!".to_string(),
            }],
            ..Default::default()
        };

        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.ids(), vec!["too-many-parameters", "no-print"]);
    }

    #[test]
    fn test_build_registry_rejects_pattern_colliding_with_builtin() {
        let config = Config {
            patterns: vec![PatternRuleConfig {
                id: "long-routine".to_string(),
                description: None,
                severity: "info".to_string(),
                category: "Style".to_string(),
                pattern: "x".to_string(),
            }],
            ..Default::default()
        };

        let err = build_registry(&config).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateId { .. }));
    }
}
