//! Cross-unit duplicate code detection.
//!
//! Runs once per scan over every unit a provider yields, at two granularities:
//!
//! - **Whole unit**: units whose whitespace-normalized content is identical.
//! - **Sub-block**: runs of consecutive statements inside routine bodies that
//!   repeat, within a unit or across units. Matching is exact on tokens; a
//!   renamed identifier breaks the match.
//!
//! [`DuplicationDetector`] collects digests; [`DuplicationDetector::finish`]
//! consumes it and produces the immutable [`DuplicationReport`].

mod blocks;
mod fingerprint;

pub use fingerprint::{normalize_source, Fingerprint};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;

use crate::rules::{Finding, Severity};
use crate::source::{SourceProvider, SourceUnit};

use blocks::Span;
use fingerprint::UnitDigest;

/// Rule id carried by every duplication finding.
pub const DUPLICATION_RULE_ID: &str = "duplicate-code";
/// Category carried by every duplication finding.
pub const DUPLICATION_CATEGORY: &str = "Duplication";

/// Detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicationConfig {
    /// Minimum normalized line count for a whole-unit group.
    pub min_unit_lines: usize,
    /// Minimum token count of a duplicated statement run.
    pub min_block_tokens: usize,
    /// Minimum statement count of a duplicated statement run.
    pub min_block_statements: usize,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            min_unit_lines: 5,
            min_block_tokens: 50,
            min_block_statements: 2,
        }
    }
}

/// Scope of a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Granularity {
    WholeUnit,
    SubBlock,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::WholeUnit => write!(f, "WholeUnit"),
            Granularity::SubBlock => write!(f, "SubBlock"),
        }
    }
}

/// A line range in one unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Location {
    /// True when `other` lies within this location's line range.
    pub fn contains(&self, other: &Location) -> bool {
        self.path == other.path
            && self.start_line <= other.start_line
            && other.end_line <= self.end_line
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.path, self.start_line, self.end_line)
    }
}

/// Two or more locations sharing a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    granularity: Granularity,
    #[serde(serialize_with = "serialize_fingerprint")]
    fingerprint: Fingerprint,
    /// Statement count of the duplicated run; `None` for whole units.
    statements: Option<usize>,
    locations: Vec<Location>,
}

fn serialize_fingerprint<S: serde::Serializer>(fp: &Fingerprint, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(fp)
}

impl DuplicateGroup {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Short stable identifier derived from the fingerprint.
    pub fn group_id(&self) -> String {
        self.fingerprint.short()
    }

    pub fn statements(&self) -> Option<usize> {
        self.statements
    }

    /// Locations in path order, first occurrence first.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// The finding reported for this group.
    pub fn to_finding(&self) -> Finding {
        let listed = self
            .locations
            .iter()
            .map(Location::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let message = match (self.granularity, self.statements) {
            (Granularity::SubBlock, Some(n)) => format!(
                "duplicated block of {} statements found in {} locations: {}",
                n,
                self.locations.len(),
                listed
            ),
            _ => format!(
                "identical file content found in {} locations: {}",
                self.locations.len(),
                listed
            ),
        };

        let (path, line) = self
            .locations
            .first()
            .map(|l| (l.path.as_str(), l.start_line))
            .unwrap_or(("", 1));

        Finding::new(
            path,
            DUPLICATION_RULE_ID,
            message,
            line,
            Severity::Warning,
            DUPLICATION_CATEGORY,
        )
        .with_property("fingerprint", self.fingerprint.to_hex())
        .with_property("group_id", self.group_id())
        .with_property("granularity", self.granularity.to_string())
        .with_property("locations", self.locations.len().to_string())
    }

    fn covered_lines(&self) -> usize {
        self.locations
            .iter()
            .map(|l| l.end_line + 1 - l.start_line)
            .sum()
    }

    fn nested_in(&self, outer: &DuplicateGroup) -> bool {
        if self.locations.len() > outer.locations.len() {
            return false;
        }
        let mut used = vec![false; outer.locations.len()];
        self.locations.iter().all(|inner| {
            let slot = outer
                .locations
                .iter()
                .zip(&used)
                .position(|(l, &taken)| !taken && l.contains(inner));
            match slot {
                Some(i) => {
                    used[i] = true;
                    true
                }
                None => false,
            }
        })
    }

    fn sort_key(&self) -> (Granularity, &str, usize) {
        let first = &self.locations[0];
        (self.granularity, first.path.as_str(), first.start_line)
    }
}

/// Collecting phase: accepts units, keeps only their digests.
#[derive(Debug)]
pub struct DuplicationDetector {
    config: DuplicationConfig,
    digests: Vec<UnitDigest>,
}

impl DuplicationDetector {
    pub fn new(config: DuplicationConfig) -> Self {
        Self {
            config,
            digests: Vec::new(),
        }
    }

    pub fn config(&self) -> &DuplicationConfig {
        &self.config
    }

    /// Add one unit.
    pub fn ingest(&mut self, unit: &SourceUnit) {
        self.digests.push(UnitDigest::from_unit(unit));
    }

    /// Add a batch of units, digesting them on the rayon pool.
    pub fn ingest_parallel(&mut self, units: &[SourceUnit]) {
        let digests: Vec<UnitDigest> = units.par_iter().map(UnitDigest::from_unit).collect();
        self.digests.extend(digests);
    }

    pub fn units_ingested(&self) -> usize {
        self.digests.len()
    }

    /// Close collection and compute every duplicate group.
    pub fn finish(self) -> DuplicationReport {
        let Self {
            config,
            mut digests,
        } = self;

        // Fingerprint tables depend on visiting order; fix it by path.
        digests.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });

        let whole = whole_unit_members(&digests, &config);
        let mut unit_group: HashMap<usize, usize> = HashMap::new();
        for (index, members) in whole.iter().enumerate() {
            for &unit in members {
                unit_group.insert(unit, index);
            }
        }
        let mut groups = whole_unit_groups(&digests, &whole);

        let mut block_groups = Vec::new();
        for clone in blocks::find_clones(&digests, &config) {
            let spans: Vec<&Span> = std::iter::once(&clone.first)
                .chain(clone.repeats.iter())
                .collect();
            if mirrors_whole_group(&spans, &unit_group) {
                continue;
            }
            block_groups.push(DuplicateGroup {
                granularity: Granularity::SubBlock,
                fingerprint: clone.fingerprint,
                statements: Some(clone.first.end - clone.first.start),
                locations: spans
                    .iter()
                    .map(|span| span_location(&digests, span))
                    .collect(),
            });
        }
        groups.extend(drop_nested(block_groups));

        groups.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        tracing::debug!(
            units = digests.len(),
            groups = groups.len(),
            "duplication detection finished"
        );

        DuplicationReport { groups }
    }
}

fn span_location(digests: &[UnitDigest], span: &Span) -> Location {
    let (start_line, end_line) = blocks::line_range(digests, span);
    Location {
        path: digests[span.unit].path.clone(),
        start_line,
        end_line,
    }
}

/// True when every span sits in a different member of one whole-unit group.
///
/// Such a match restates the whole-unit group. Repeats inside one member, or
/// copies in units outside the group, keep the block reportable.
fn mirrors_whole_group(spans: &[&Span], unit_group: &HashMap<usize, usize>) -> bool {
    let mut units = HashSet::new();
    let mut group = None;
    for span in spans {
        let Some(&g) = unit_group.get(&span.unit) else {
            return false;
        };
        if *group.get_or_insert(g) != g || !units.insert(span.unit) {
            return false;
        }
    }
    true
}

/// Drop groups whose every location lies inside a distinct location of a
/// larger group, such as a nested routine inside a duplicated region.
fn drop_nested(mut blocks: Vec<DuplicateGroup>) -> Vec<DuplicateGroup> {
    blocks.sort_by(|a, b| {
        b.covered_lines()
            .cmp(&a.covered_lines())
            .then_with(|| a.sort_key().cmp(&b.sort_key()))
    });

    let mut kept: Vec<DuplicateGroup> = Vec::with_capacity(blocks.len());
    for group in blocks {
        if kept.iter().any(|outer| group.nested_in(outer)) {
            tracing::trace!(group = %group.group_id(), "dropping nested duplicate block");
            continue;
        }
        kept.push(group);
    }
    kept
}

/// Indices of units in each reportable whole-unit group, in path order.
fn whole_unit_members(digests: &[UnitDigest], config: &DuplicationConfig) -> Vec<Vec<usize>> {
    let mut by_fingerprint: BTreeMap<Fingerprint, Vec<usize>> = BTreeMap::new();
    for (index, digest) in digests.iter().enumerate() {
        if digest.significant_lines >= config.min_unit_lines.max(1) {
            by_fingerprint.entry(digest.fingerprint).or_default().push(index);
        }
    }

    by_fingerprint
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect()
}

fn whole_unit_groups(digests: &[UnitDigest], whole: &[Vec<usize>]) -> Vec<DuplicateGroup> {
    whole
        .iter()
        .map(|members| DuplicateGroup {
            granularity: Granularity::WholeUnit,
            fingerprint: digests[members[0]].fingerprint,
            statements: None,
            locations: members
                .iter()
                .map(|&i| Location {
                    path: digests[i].path.clone(),
                    start_line: 1,
                    end_line: digests[i].end_line,
                })
                .collect(),
        })
        .collect()
}

/// Reporting phase: immutable result of a detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicationReport {
    groups: Vec<DuplicateGroup>,
}

impl DuplicationReport {
    /// Groups ordered whole-unit first, then by first location.
    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// One finding per group, in group order.
    pub fn findings(&self) -> Vec<Finding> {
        self.groups.iter().map(DuplicateGroup::to_finding).collect()
    }

    pub fn into_findings(self) -> impl Iterator<Item = Finding> {
        self.groups.into_iter().map(|g| g.to_finding())
    }
}

/// Run a full detection pass over everything a provider yields.
pub fn detect<P: SourceProvider + ?Sized>(provider: &P, config: DuplicationConfig) -> DuplicationReport {
    let mut detector = DuplicationDetector::new(config);
    for unit in provider.source_units() {
        detector.ingest(&unit);
    }
    detector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryProvider;

    const FIVE_LINES: &str = "fn one() {\n    let a = 1;\n    let b = 2;\n    let c = a + b;\n}\n";

    /// Three statements of about twenty tokens each.
    const REPEATED: &str = "\
    let total = values.iter().map(|v| v * factor).filter(|v| *v > limit).sum::<i64>();
    let scaled = total.checked_mul(weight).unwrap_or_default().saturating_add(offset);
    result.push(format!(\"{}:{}:{}\", label, scaled, total).to_uppercase());
";

    fn repeated_routine() -> String {
        format!(
            "fn process(values: &[i64], factor: i64, limit: i64, weight: i64, offset: i64, label: &str, result: &mut Vec<String>) {{\n{}    let marker = 0;\n{}}}\n",
            REPEATED, REPEATED
        )
    }

    #[test]
    fn test_identical_units_form_one_whole_group() {
        let provider = MemoryProvider::new()
            .with_file("b.rs", FIVE_LINES)
            .with_file("a.rs", FIVE_LINES)
            .with_file("c.rs", "fn other() {}\n");

        let report = detect(&provider, DuplicationConfig::default());

        assert_eq!(report.len(), 1);
        let group = &report.groups()[0];
        assert_eq!(group.granularity(), Granularity::WholeUnit);
        let paths: Vec<_> = group.locations().iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs"]);

        let finding = group.to_finding();
        assert_eq!(finding.source_path(), "a.rs");
        assert_eq!(finding.line(), 1);
        assert_eq!(finding.rule_id(), DUPLICATION_RULE_ID);
        assert_eq!(finding.severity(), Severity::Warning);
        assert_eq!(finding.category(), DUPLICATION_CATEGORY);
        assert_eq!(finding.property("locations"), Some("2"));
        assert_eq!(finding.property("granularity"), Some("WholeUnit"));
        assert!(finding.message().contains("a.rs:1-5, b.rs:1-5"));
    }

    #[test]
    fn test_short_units_not_grouped() {
        let provider = MemoryProvider::new()
            .with_file("a.rs", "fn f() {}\n")
            .with_file("b.rs", "fn f() {}\n");

        assert!(detect(&provider, DuplicationConfig::default()).is_empty());
    }

    #[test]
    fn test_renamed_identifier_breaks_whole_match() {
        let renamed = FIVE_LINES.replace("let c", "let d");
        let provider = MemoryProvider::new()
            .with_file("a.rs", FIVE_LINES)
            .with_file("b.rs", renamed);

        let report = detect(&provider, DuplicationConfig::default());
        assert!(report
            .groups()
            .iter()
            .all(|g| g.granularity() != Granularity::WholeUnit));
    }

    #[test]
    fn test_repeated_block_in_one_routine() {
        let provider = MemoryProvider::new().with_file("proc.rs", repeated_routine());

        let report = detect(&provider, DuplicationConfig::default());

        assert_eq!(report.len(), 1);
        let group = &report.groups()[0];
        assert_eq!(group.granularity(), Granularity::SubBlock);
        assert_eq!(group.statements(), Some(3));
        assert_eq!(group.locations().len(), 2);
        assert_eq!(group.locations()[0].start_line, 2);
        assert_eq!(group.locations()[1].start_line, 6);

        let finding = group.to_finding();
        assert!(finding
            .message()
            .starts_with("duplicated block of 3 statements found in 2 locations"));
        assert_eq!(finding.property("group_id").map(str::len), Some(12));
    }

    #[test]
    fn test_block_matches_inside_whole_group_suppressed() {
        let source = repeated_routine();
        let provider = MemoryProvider::new()
            .with_file("a.rs", source.clone())
            .with_file("b.rs", source);

        let report = detect(&provider, DuplicationConfig::default());
        let kinds: Vec<_> = report.groups().iter().map(|g| g.granularity()).collect();

        // The routine-wide match restates the whole group; the in-routine
        // repeat is still reported, in both copies.
        assert_eq!(kinds, vec![Granularity::WholeUnit, Granularity::SubBlock]);
        let locations: Vec<String> = report.groups()[1]
            .locations()
            .iter()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(locations, vec!["a.rs:2-4", "a.rs:6-8", "b.rs:2-4", "b.rs:6-8"]);
    }

    #[test]
    fn test_block_shared_with_whole_group_names_every_copy() {
        let copied = format!(
            "fn process(values: &[i64], factor: i64, limit: i64) {{\n    let marker = 0;\n{}}}\n",
            REPEATED
        );
        let partial = format!(
            "fn other(values: &[i64]) {{\n{}    let tail = 1;\n}}\n",
            REPEATED
        );
        let provider = MemoryProvider::new()
            .with_file("a.rs", copied.clone())
            .with_file("b.rs", copied)
            .with_file("c.rs", partial);

        let report = detect(&provider, DuplicationConfig::default());

        assert_eq!(report.len(), 2);
        assert_eq!(report.groups()[0].granularity(), Granularity::WholeUnit);
        let block = &report.groups()[1];
        assert_eq!(block.granularity(), Granularity::SubBlock);
        let locations: Vec<String> = block.locations().iter().map(|l| l.to_string()).collect();
        assert_eq!(locations, vec!["a.rs:3-5", "b.rs:3-5", "c.rs:2-4"]);
        assert!(block
            .to_finding()
            .message()
            .starts_with("duplicated block of 3 statements found in 3 locations"));
    }

    #[test]
    fn test_nested_routine_reported_with_enclosing_block() {
        let body = "\
  const threshold = limit * totals.length + computeOffset(items, totals, limit);
  items.forEach((item) => {
    const weighted = item.value * item.weight + threshold - item.discount;
    totals.push({ id: item.id, weighted: weighted, label: item.name.trim() });
    console.log(\"processed\", item.id, weighted, threshold, totals.length);
  });
";
        let provider = MemoryProvider::new()
            .with_file(
                "a.js",
                format!("function first(items, totals, limit) {{\n{}}}\n", body),
            )
            .with_file(
                "b.js",
                format!(
                    "function second(items, totals, limit) {{\n  let unrelated = 1;\n{}  return unrelated;\n}}\n",
                    body
                ),
            );

        let report = detect(&provider, DuplicationConfig::default());

        assert_eq!(report.len(), 1);
        let group = &report.groups()[0];
        assert_eq!(group.statements(), Some(2));
        let locations: Vec<String> = group.locations().iter().map(|l| l.to_string()).collect();
        assert_eq!(locations, vec!["a.js:2-7", "b.js:3-8"]);
    }

    #[test]
    fn test_location_contains() {
        let outer = Location {
            path: "a.js".to_string(),
            start_line: 2,
            end_line: 7,
        };
        let inner = Location {
            path: "a.js".to_string(),
            start_line: 4,
            end_line: 6,
        };
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(!outer.contains(&Location {
            path: "b.js".to_string(),
            ..inner
        }));
    }

    #[test]
    fn test_ingest_parallel_matches_sequential() {
        let units: Vec<SourceUnit> = [
            ("a.rs", FIVE_LINES.to_string()),
            ("b.rs", repeated_routine()),
            ("c.rs", FIVE_LINES.to_string()),
        ]
        .into_iter()
        .map(|(p, s)| SourceUnit::parse(p, s).unwrap())
        .collect();

        let mut sequential = DuplicationDetector::new(DuplicationConfig::default());
        for unit in &units {
            sequential.ingest(unit);
        }
        let mut parallel = DuplicationDetector::new(DuplicationConfig::default());
        parallel.ingest_parallel(&units);

        assert_eq!(parallel.units_ingested(), 3);
        assert_eq!(sequential.finish(), parallel.finish());
    }

    #[test]
    fn test_empty_input() {
        let report = DuplicationDetector::new(DuplicationConfig::default()).finish();
        assert!(report.is_empty());
        assert!(report.findings().is_empty());
    }
}
