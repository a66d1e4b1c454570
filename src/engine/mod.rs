//! Rule execution with per-rule fault isolation.
//!
//! The engine pulls source units one at a time and runs every registered rule
//! against each, in registration order. A rule that errors, panics, or emits a
//! finding that does not carry its own identity is recorded as an
//! [`ExecutionFault`]; every other (rule, unit) pair still runs.
//!
//! Findings are yielded lazily: only the output of the current (unit, rule)
//! call is ever buffered.

mod scan;

pub use scan::{ScanSummary, Scanner};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use rayon::prelude::*;

use crate::rules::{ExecutionFault, FaultKind, Finding, Rule, RuleRegistry};
use crate::source::SourceUnit;

/// Runs registered rules over source units.
pub struct Engine {
    registry: RuleRegistry,
}

impl Engine {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Analyze a sequence of units lazily.
    ///
    /// The returned iterator yields findings as they are produced; faults are
    /// collected on it as a side effect and can be read at any point through
    /// [`Analysis::faults`].
    pub fn analyze<I>(&self, units: I) -> Analysis<'_, I::IntoIter>
    where
        I: IntoIterator<Item = SourceUnit>,
    {
        Analysis {
            rules: self.registry.rules(),
            units: units.into_iter(),
            current: None,
            next_rule: 0,
            pending: VecDeque::new(),
            faults: Vec::new(),
            units_analyzed: 0,
            done: false,
        }
    }

    /// Run every rule against a single unit.
    pub fn analyze_unit(&self, unit: &SourceUnit) -> UnitOutcome {
        let mut outcome = UnitOutcome::default();
        for rule in self.registry.rules() {
            match run_rule(rule.as_ref(), unit) {
                Ok(findings) => outcome.findings.extend(findings),
                Err(fault) => outcome.faults.push(fault),
            }
        }
        outcome
    }

    /// Analyze units in parallel.
    ///
    /// Uses rayon over units. Results are merged in input order, so the output
    /// is identical to draining [`Engine::analyze`] over the same units.
    pub fn analyze_parallel(&self, units: &[SourceUnit]) -> UnitOutcome {
        let per_unit: Vec<UnitOutcome> = units
            .par_iter()
            .map(|unit| self.analyze_unit(unit))
            .collect();

        let mut merged = UnitOutcome::default();
        for outcome in per_unit {
            merged.findings.extend(outcome.findings);
            merged.faults.extend(outcome.faults);
        }
        merged
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Findings and faults from an eager (non-streaming) analysis.
#[derive(Debug, Default, Clone)]
pub struct UnitOutcome {
    pub findings: Vec<Finding>,
    pub faults: Vec<ExecutionFault>,
}

/// A lazy, single-pass analysis over a sequence of units.
pub struct Analysis<'e, I> {
    rules: &'e [Arc<dyn Rule>],
    units: I,
    current: Option<SourceUnit>,
    next_rule: usize,
    pending: VecDeque<Finding>,
    faults: Vec<ExecutionFault>,
    units_analyzed: usize,
    done: bool,
}

impl<I> Analysis<'_, I> {
    /// Faults recorded so far.
    pub fn faults(&self) -> &[ExecutionFault] {
        &self.faults
    }

    /// Consume the analysis, returning the faults recorded so far.
    pub fn into_faults(self) -> Vec<ExecutionFault> {
        self.faults
    }

    /// Number of units pulled from the input so far.
    pub fn units_analyzed(&self) -> usize {
        self.units_analyzed
    }
}

impl<I> Iterator for Analysis<'_, I>
where
    I: Iterator<Item = SourceUnit>,
{
    type Item = Finding;

    fn next(&mut self) -> Option<Finding> {
        loop {
            if let Some(finding) = self.pending.pop_front() {
                return Some(finding);
            }
            if self.done {
                return None;
            }

            match &self.current {
                Some(unit) if self.next_rule < self.rules.len() => {
                    let rule = &self.rules[self.next_rule];
                    self.next_rule += 1;
                    match run_rule(rule.as_ref(), unit) {
                        Ok(findings) => self.pending.extend(findings),
                        Err(fault) => self.faults.push(fault),
                    }
                }
                _ => match self.units.next() {
                    Some(unit) => {
                        tracing::debug!(path = %unit.path(), "analyzing unit");
                        self.current = Some(unit);
                        self.next_rule = 0;
                        self.units_analyzed += 1;
                    }
                    None => {
                        self.current = None;
                        self.done = true;
                    }
                },
            }
        }
    }
}

impl<I> std::iter::FusedIterator for Analysis<'_, I> where I: Iterator<Item = SourceUnit> {}

/// Run one rule against one unit, converting every failure mode into a fault.
fn run_rule(rule: &dyn Rule, unit: &SourceUnit) -> Result<Vec<Finding>, ExecutionFault> {
    let meta = rule.metadata();

    install_rule_panic_hook();
    let was_in_rule = IN_RULE.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.analyze(unit)));
    IN_RULE.with(|flag| flag.set(was_in_rule));

    let findings = match outcome {
        Ok(Ok(findings)) => findings,
        Ok(Err(e)) => {
            tracing::warn!(rule = %meta.id, path = %unit.path(), error = %e, "rule failed");
            return Err(ExecutionFault::new(
                &meta.id,
                unit.path(),
                FaultKind::Error,
                format!("{:#}", e),
            ));
        }
        Err(payload) => {
            let mut message = panic_message(payload.as_ref());
            if let Some(location) = LAST_PANIC_LOCATION.with(|slot| slot.borrow_mut().take()) {
                message = format!("{} (at {})", message, location);
            }
            tracing::warn!(rule = %meta.id, path = %unit.path(), panic = %message, "rule panicked");
            return Err(ExecutionFault::new(
                &meta.id,
                unit.path(),
                FaultKind::Panic,
                message,
            ));
        }
    };

    if let Some(foreign) = findings.iter().find(|f| !meta.owns(f)) {
        tracing::warn!(rule = %meta.id, path = %unit.path(), "rule emitted a foreign finding");
        return Err(ExecutionFault::new(
            &meta.id,
            unit.path(),
            FaultKind::Contract,
            format!(
                "finding attributed to {} ({}/{}) does not match rule metadata ({}/{})",
                foreign.rule_id(),
                foreign.severity(),
                foreign.category(),
                meta.severity,
                meta.category
            ),
        ));
    }

    Ok(findings)
}

static RULE_PANIC_HOOK: Once = Once::new();

thread_local! {
    static IN_RULE: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Keep rule panics off stderr; they are reported as faults instead.
///
/// Panics outside a rule call still reach the previously installed hook.
fn install_rule_panic_hook() {
    RULE_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_RULE.with(Cell::get) {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
                LAST_PANIC_LOCATION.with(|slot| *slot.borrow_mut() = location);
            } else {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "rule panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleMetadata, Severity};

    /// Emits one finding per unit, on line 1.
    struct Marker(RuleMetadata);

    impl Marker {
        fn new(id: &str, severity: Severity, category: &str) -> Self {
            Self(RuleMetadata::new(id, "marks every unit", severity, category))
        }
    }

    impl Rule for Marker {
        fn metadata(&self) -> &RuleMetadata {
            &self.0
        }

        fn analyze(&self, unit: &SourceUnit) -> anyhow::Result<Vec<Finding>> {
            Ok(vec![self.0.finding(unit.path(), 1, format!("{} saw unit", self.0.id))])
        }
    }

    /// Fails on units whose path contains `needle`.
    struct FailsOn {
        meta: RuleMetadata,
        needle: &'static str,
        panics: bool,
    }

    impl Rule for FailsOn {
        fn metadata(&self) -> &RuleMetadata {
            &self.meta
        }

        fn analyze(&self, unit: &SourceUnit) -> anyhow::Result<Vec<Finding>> {
            if unit.path().contains(self.needle) {
                if self.panics {
                    panic!("cannot handle {}", unit.path());
                }
                anyhow::bail!("cannot handle {}", unit.path());
            }
            Ok(vec![self.meta.finding(unit.path(), 2, "ok")])
        }
    }

    /// Emits a finding claiming a different severity.
    struct Impostor(RuleMetadata);

    impl Rule for Impostor {
        fn metadata(&self) -> &RuleMetadata {
            &self.0
        }

        fn analyze(&self, unit: &SourceUnit) -> anyhow::Result<Vec<Finding>> {
            Ok(vec![Finding::new(
                unit.path(),
                &self.0.id,
                "wrong severity",
                1,
                Severity::Error,
                &self.0.category,
            )])
        }
    }

    fn units(paths: &[&str]) -> Vec<SourceUnit> {
        paths
            .iter()
            .map(|p| SourceUnit::parse(*p, "fn main() {}\n").unwrap())
            .collect()
    }

    fn engine_with(rules: Vec<Arc<dyn Rule>>) -> Engine {
        let mut registry = RuleRegistry::new();
        for rule in rules {
            registry.register_arc(rule).unwrap();
        }
        Engine::new(registry)
    }

    #[test]
    fn test_empty_input() {
        let engine = engine_with(vec![Arc::new(Marker::new("a", Severity::Info, "Style"))]);
        let mut analysis = engine.analyze(Vec::new());

        assert!(analysis.next().is_none());
        assert!(analysis.faults().is_empty());
        assert_eq!(analysis.units_analyzed(), 0);
    }

    #[test]
    fn test_order_is_unit_then_rule() {
        let engine = engine_with(vec![
            Arc::new(Marker::new("a", Severity::Info, "Style")),
            Arc::new(Marker::new("b", Severity::Info, "Style")),
        ]);

        let order: Vec<_> = engine
            .analyze(units(&["u1.rs", "u2.rs"]))
            .map(|f| format!("{}:{}", f.rule_id(), f.source_path()))
            .collect();

        assert_eq!(order, vec!["a:u1.rs", "b:u1.rs", "a:u2.rs", "b:u2.rs"]);
    }

    #[test]
    fn test_error_becomes_fault() {
        let engine = engine_with(vec![
            Arc::new(FailsOn {
                meta: RuleMetadata::new("fragile", "d", Severity::Error, "Correctness"),
                needle: "bad",
                panics: false,
            }),
            Arc::new(Marker::new("steady", Severity::Info, "Style")),
        ]);

        let mut analysis = engine.analyze(units(&["bad.rs", "good.rs"]));
        let findings: Vec<_> = analysis.by_ref().collect();

        assert_eq!(findings.len(), 3);
        assert_eq!(analysis.faults().len(), 1);
        let fault = &analysis.faults()[0];
        assert_eq!(fault.rule_id(), "fragile");
        assert_eq!(fault.source_path(), "bad.rs");
        assert_eq!(fault.kind(), FaultKind::Error);
        assert!(fault.message().contains("cannot handle bad.rs"));
    }

    #[test]
    fn test_panic_becomes_fault() {
        let engine = engine_with(vec![
            Arc::new(FailsOn {
                meta: RuleMetadata::new("explosive", "d", Severity::Error, "Correctness"),
                needle: "bad",
                panics: true,
            }),
            Arc::new(Marker::new("steady", Severity::Info, "Style")),
        ]);

        let outcome = engine.analyze_unit(&units(&["bad.rs"])[0]);

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].rule_id(), "steady");
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].kind(), FaultKind::Panic);
        assert!(outcome.faults[0].message().contains("cannot handle bad.rs"));
        assert!(outcome.faults[0].message().contains("src/engine/mod.rs:"));
    }

    #[test]
    fn test_panic_outside_rule_still_unwinds() {
        let engine = engine_with(vec![Arc::new(FailsOn {
            meta: RuleMetadata::new("explosive", "d", Severity::Error, "Correctness"),
            needle: "bad",
            panics: true,
        })]);
        let _ = engine.analyze_unit(&units(&["bad.rs"])[0]);

        assert!(!IN_RULE.with(Cell::get));
        let caught = panic::catch_unwind(|| panic!("outside any rule"));
        assert!(caught.is_err());
        assert!(LAST_PANIC_LOCATION.with(|slot| slot.borrow().is_none()));
    }

    #[test]
    fn test_foreign_finding_becomes_fault() {
        let engine = engine_with(vec![Arc::new(Impostor(RuleMetadata::new(
            "impostor",
            "d",
            Severity::Info,
            "Style",
        )))]);

        let mut analysis = engine.analyze(units(&["a.rs"]));
        assert!(analysis.next().is_none());
        assert_eq!(analysis.faults().len(), 1);
        assert_eq!(analysis.faults()[0].kind(), FaultKind::Contract);
    }

    #[test]
    fn test_lazy_pulls_units_on_demand() {
        let engine = engine_with(vec![Arc::new(Marker::new("a", Severity::Info, "Style"))]);
        let mut analysis = engine.analyze(units(&["u1.rs", "u2.rs", "u3.rs"]));

        let first = analysis.next().unwrap();
        assert_eq!(first.source_path(), "u1.rs");
        assert_eq!(analysis.units_analyzed(), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let engine = engine_with(vec![
            Arc::new(FailsOn {
                meta: RuleMetadata::new("fragile", "d", Severity::Error, "Correctness"),
                needle: "3",
                panics: false,
            }),
            Arc::new(Marker::new("steady", Severity::Info, "Style")),
        ]);
        let paths: Vec<String> = (0..16).map(|i| format!("u{}.rs", i)).collect();
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();

        let mut sequential = engine.analyze(units(&path_refs));
        let seq_findings: Vec<_> = sequential.by_ref().collect();
        let seq_faults = sequential.into_faults();

        let parallel = engine.analyze_parallel(&units(&path_refs));

        assert_eq!(seq_findings, parallel.findings);
        assert_eq!(seq_faults, parallel.faults);
    }
}
