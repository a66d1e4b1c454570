//! Flags routines declaring too many parameters.

use crate::source::syntax;
use crate::source::SourceUnit;

use super::{Finding, Rule, RuleMetadata, Severity};

/// Default maximum parameter count.
pub const DEFAULT_MAX_PARAMETERS: usize = 5;

pub struct TooManyParametersRule {
    meta: RuleMetadata,
    max_parameters: usize,
}

impl TooManyParametersRule {
    pub fn new(max_parameters: usize) -> Self {
        Self {
            meta: RuleMetadata::new(
                "too-many-parameters",
                "Routine declares more parameters than the configured maximum",
                Severity::Warning,
                "Design",
            ),
            max_parameters,
        }
    }
}

impl Default for TooManyParametersRule {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARAMETERS)
    }
}

impl Rule for TooManyParametersRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.meta
    }

    fn analyze(&self, unit: &SourceUnit) -> anyhow::Result<Vec<Finding>> {
        let findings = syntax::routines(unit)?
            .into_iter()
            .filter_map(|routine| {
                let count = routine.parameter_count()?;
                if count <= self.max_parameters {
                    return None;
                }
                Some(self.meta.finding(
                    unit.path(),
                    routine.span.start_line,
                    format!(
                        "routine '{}' has {} parameters, exceeds maximum of {}",
                        routine.label(unit),
                        count,
                        self.max_parameters
                    ),
                ))
            })
            .collect();

        Ok(findings)
    }
}
