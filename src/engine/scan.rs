//! A complete scan: the per-unit rule pass followed by the duplication pass.

use serde::Serialize;

use crate::duplication::{DuplicationConfig, DuplicationDetector};
use crate::rules::{ExecutionFault, Finding, Severity};
use crate::source::{SourceProvider, SourceUnit};

use super::Engine;

/// Totals for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub units_analyzed: usize,
    pub findings: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub duplicate_groups: usize,
    pub faults: Vec<ExecutionFault>,
}

impl ScanSummary {
    fn record(&mut self, finding: &Finding) {
        self.findings += 1;
        match finding.severity() {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
    }
}

/// Drives the engine and the duplication detector over one provider.
#[derive(Debug)]
pub struct Scanner {
    engine: Engine,
    duplication: Option<DuplicationConfig>,
    parallel: bool,
}

impl Scanner {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            duplication: Some(DuplicationConfig::default()),
            parallel: false,
        }
    }

    /// Set duplication thresholds, or `None` to skip the pass.
    pub fn with_duplication(mut self, config: Option<DuplicationConfig>) -> Self {
        self.duplication = config;
        self
    }

    /// Analyze units on the rayon pool. Output is unchanged; memory grows
    /// with the input since every unit is loaded up front.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run the scan, handing every finding to `sink` as it is produced.
    ///
    /// Rule findings come first, in unit then rule order; duplication
    /// findings follow once every unit has been seen.
    pub fn run<P>(&self, provider: &P, sink: &mut dyn FnMut(Finding)) -> ScanSummary
    where
        P: SourceProvider + ?Sized,
    {
        let mut summary = ScanSummary::default();
        let mut emit = |finding: Finding, summary: &mut ScanSummary| {
            summary.record(&finding);
            sink(finding);
        };

        if self.parallel {
            let units: Vec<SourceUnit> = provider.source_units().collect();
            tracing::info!(units = units.len(), "analyzing units in parallel");

            let outcome = self.engine.analyze_parallel(&units);
            for finding in outcome.findings {
                emit(finding, &mut summary);
            }
            summary.units_analyzed = units.len();
            summary.faults = outcome.faults;

            if let Some(config) = self.duplication {
                let mut detector = DuplicationDetector::new(config);
                detector.ingest_parallel(&units);
                let report = detector.finish();
                summary.duplicate_groups = report.len();
                for finding in report.into_findings() {
                    emit(finding, &mut summary);
                }
            }
        } else {
            let mut analysis = self.engine.analyze(provider.source_units());
            for finding in analysis.by_ref() {
                emit(finding, &mut summary);
            }
            summary.units_analyzed = analysis.units_analyzed();
            summary.faults = analysis.into_faults();

            if let Some(config) = self.duplication {
                let mut detector = DuplicationDetector::new(config);
                for unit in provider.source_units() {
                    detector.ingest(&unit);
                }
                let report = detector.finish();
                summary.duplicate_groups = report.len();
                for finding in report.into_findings() {
                    emit(finding, &mut summary);
                }
            }
        }

        tracing::info!(
            units = summary.units_analyzed,
            findings = summary.findings,
            faults = summary.faults.len(),
            "scan complete"
        );

        summary
    }

    /// Run the scan and collect every finding.
    pub fn collect<P>(&self, provider: &P) -> (Vec<Finding>, ScanSummary)
    where
        P: SourceProvider + ?Sized,
    {
        let mut findings = Vec::new();
        let summary = self.run(provider, &mut |f| findings.push(f));
        (findings, summary)
    }
}
