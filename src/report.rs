//! Output formatting for scan results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output, streamed finding by finding
//! - JSON: one structured document written after the scan completes

use std::collections::BTreeMap;
use std::io::Write;

use colored::*;
use serde::Serialize;

use crate::engine::ScanSummary;
use crate::rules::{ExecutionFault, Finding, RuleRegistry, Severity};

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON document.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub path: &'a str,
    pub units_analyzed: usize,
    pub findings: Vec<JsonFinding<'a>>,
    pub faults: Vec<JsonFault<'a>>,
    pub summary: JsonSummary,
}

#[derive(Serialize)]
pub struct JsonFinding<'a> {
    pub rule: &'a str,
    pub severity: Severity,
    pub category: &'a str,
    pub file: &'a str,
    pub line: usize,
    pub message: &'a str,
    #[serde(skip_serializing_if = "no_properties")]
    pub properties: &'a BTreeMap<String, String>,
}

fn no_properties(properties: &&BTreeMap<String, String>) -> bool {
    properties.is_empty()
}

#[derive(Serialize)]
pub struct JsonFault<'a> {
    pub rule: &'a str,
    pub file: &'a str,
    pub kind: String,
    pub message: &'a str,
}

#[derive(Serialize)]
pub struct JsonSummary {
    pub findings: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub duplicate_groups: usize,
    pub faults: usize,
}

/// Render a finished scan as pretty-printed JSON.
pub fn render_json(path: &str, findings: &[Finding], summary: &ScanSummary) -> anyhow::Result<String> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        path,
        units_analyzed: summary.units_analyzed,
        findings: findings.iter().map(finding_to_json).collect(),
        faults: summary.faults.iter().map(fault_to_json).collect(),
        summary: JsonSummary {
            findings: summary.findings,
            errors: summary.errors,
            warnings: summary.warnings,
            infos: summary.infos,
            duplicate_groups: summary.duplicate_groups,
            faults: summary.faults.len(),
        },
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

/// Write a finished scan as JSON to stdout.
pub fn write_json(path: &str, findings: &[Finding], summary: &ScanSummary) -> anyhow::Result<()> {
    let json = render_json(path, findings, summary)?;
    println!("{}", json);
    Ok(())
}

fn finding_to_json(f: &Finding) -> JsonFinding<'_> {
    JsonFinding {
        rule: f.rule_id(),
        severity: f.severity(),
        category: f.category(),
        file: f.source_path(),
        line: f.line(),
        message: f.message(),
        properties: f.properties(),
    }
}

fn fault_to_json(f: &ExecutionFault) -> JsonFault<'_> {
    JsonFault {
        rule: f.rule_id(),
        file: f.source_path(),
        kind: f.kind().to_string(),
        message: f.message(),
    }
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Header printed before any finding.
pub fn write_pretty_header<W: Write>(out: &mut W, path: &str) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "  {} v{}",
        "sourcelint".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(out)?;
    writeln!(out, "  {}{}", "Scanning: ".dimmed(), path)?;
    writeln!(out)
}

/// One finding, as soon as it is produced.
pub fn write_pretty_finding<W: Write>(out: &mut W, f: &Finding) -> std::io::Result<()> {
    writeln!(
        out,
        "    {}   {:<22}{}{}",
        severity_tag(f.severity()),
        f.rule_id().dimmed(),
        f.source_path().blue(),
        format!(":{}", f.line()).dimmed()
    )?;
    writeln!(out, "            {}", f.message())?;
    writeln!(out)
}

/// Faults and totals, after the scan.
pub fn write_pretty_summary<W: Write>(out: &mut W, summary: &ScanSummary) -> std::io::Result<()> {
    if !summary.faults.is_empty() {
        writeln!(out, "  {} ({}):", "Rule faults".red().bold(), summary.faults.len())?;
        writeln!(out)?;
        for fault in &summary.faults {
            writeln!(
                out,
                "    {:<22}{} {}",
                fault.rule_id().dimmed(),
                fault.source_path().blue(),
                format!("[{}]", fault.kind()).dimmed()
            )?;
            writeln!(out, "            {}", fault.message())?;
        }
        writeln!(out)?;
    }

    let status = if summary.findings == 0 {
        "✓ CLEAN".green()
    } else if summary.errors > 0 {
        "✗ ERRORS".red()
    } else {
        "! FINDINGS".yellow()
    };

    writeln!(
        out,
        "  {}  {} units  {} findings ({} errors, {} warnings, {} info)  {} duplicate groups",
        status,
        summary.units_analyzed,
        summary.findings,
        summary.errors,
        summary.warnings,
        summary.infos,
        summary.duplicate_groups
    )?;
    writeln!(out)
}

/// Table of registered rules for the `rules` subcommand.
pub fn write_rules<W: Write>(
    out: &mut W,
    registry: &RuleRegistry,
    duplication_enabled: bool,
) -> std::io::Result<()> {
    writeln!(out, "  {}", "Registered rules:".bold())?;
    for rule in registry.rules() {
        let meta = rule.metadata();
        writeln!(
            out,
            "    {} {:<24}{:<14}{}",
            severity_tag(meta.severity),
            meta.id,
            meta.category.dimmed(),
            meta.description
        )?;
    }
    if duplication_enabled {
        writeln!(
            out,
            "    {} {:<24}{:<14}{}",
            severity_tag(Severity::Warning),
            crate::duplication::DUPLICATION_RULE_ID,
            crate::duplication::DUPLICATION_CATEGORY.dimmed(),
            "Identical units or repeated statement runs"
        )?;
    }
    Ok(())
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "ERROR".red(),
        Severity::Warning => "WARN ".yellow(),
        Severity::Info => "INFO ".blue(),
    }
}
