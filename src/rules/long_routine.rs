//! Flags routines that span too many lines.

use crate::source::syntax;
use crate::source::SourceUnit;

use super::{Finding, Rule, RuleMetadata, Severity};

/// Default maximum routine length in lines.
pub const DEFAULT_MAX_LINES: usize = 60;

pub struct LongRoutineRule {
    meta: RuleMetadata,
    max_lines: usize,
}

impl LongRoutineRule {
    pub fn new(max_lines: usize) -> Self {
        Self {
            meta: RuleMetadata::new(
                "long-routine",
                "Routine body is longer than the configured maximum",
                Severity::Warning,
                "Size",
            ),
            max_lines,
        }
    }
}

impl Default for LongRoutineRule {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl Rule for LongRoutineRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.meta
    }

    fn analyze(&self, unit: &SourceUnit) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for routine in syntax::routines(unit)? {
            let lines = routine.span.line_count();
            if lines > self.max_lines {
                findings.push(
                    self.meta
                        .finding(
                            unit.path(),
                            routine.span.start_line,
                            format!(
                                "routine '{}' has {} lines, exceeds maximum of {}",
                                routine.label(unit),
                                lines,
                                self.max_lines
                            ),
                        )
                        .with_property("lines", lines.to_string()),
                );
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_long_routine() {
        let body: String = (0..8).map(|i| format!("    let v{} = {};\n", i, i)).collect();
        let source = format!("fn short() {{}}\n\nfn long() {{\n{}}}\n", body);
        let unit = SourceUnit::parse("lib.rs", source).unwrap();

        let findings = LongRoutineRule::new(5).analyze(&unit).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line(), 3);
        assert!(findings[0].message().contains("'long'"));
        assert_eq!(findings[0].property("lines"), Some("10"));
    }

    #[test]
    fn test_no_findings_under_limit() {
        let unit = SourceUnit::parse("lib.rs", "fn f() {\n    1;\n}\n").unwrap();
        assert!(LongRoutineRule::default().analyze(&unit).unwrap().is_empty());
    }
}
