//! Sourcelint - rule-based static analysis with duplicate code detection.
//!
//! Sources are parsed with tree-sitter into immutable [`SourceUnit`]s. A
//! registry of independent rules runs against every unit; a failing rule is
//! recorded as an [`ExecutionFault`] and never aborts the run. After the
//! per-unit pass, a duplication detector groups identical units and repeated
//! statement runs across the whole input.
//!
//! # Architecture
//!
//! - `source`: source providers, language table and syntax helpers
//! - `rules`: the rule contract, built-in rules and the registry
//! - `engine`: fault-isolated rule execution and the scan session
//! - `duplication`: whole-unit and sub-block clone detection
//! - `config`: YAML configuration schema
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! Add a grammar crate and an entry to the table in `source/languages.rs`
//! with a query capturing routine nodes as `@routine`.

pub mod cli;
pub mod config;
pub mod duplication;
pub mod engine;
pub mod report;
pub mod rules;
pub mod source;

pub use config::Config;
pub use duplication::{
    DuplicateGroup, DuplicationConfig, DuplicationDetector, DuplicationReport, Granularity,
    Location,
};
pub use engine::{Analysis, Engine, ScanSummary, Scanner, UnitOutcome};
pub use rules::{
    build_registry, ExecutionFault, FaultKind, Finding, RegistrationError, Rule, RuleMetadata,
    RuleRegistry, Severity,
};
pub use source::{FsProvider, MemoryProvider, SourceProvider, SourceUnit};
