//! Sub-block clone search over routine statement sequences.
//!
//! Every window of consecutive statements that is large enough gets a
//! fingerprint built from its statement hashes. The first window seen with a
//! given fingerprint is its first occurrence; later windows link back to it.
//! Links that share a diagonal (first routine, repeat routine, statement
//! offset) are merged into maximal spans. Each maximal span then collects
//! every non-overlapping place its content occurs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::fingerprint::{Fingerprint, StatementDigest, UnitDigest};
use super::DuplicationConfig;

/// A run of statements `[start, end)` inside one routine of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Span {
    pub unit: usize,
    pub routine: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn same_routine(&self, other: &Span) -> bool {
        self.unit == other.unit && self.routine == other.routine
    }

    fn overlaps(&self, other: &Span) -> bool {
        self.same_routine(other) && self.start < other.end && other.start < self.end
    }
}

/// A duplicated span and every place it repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockClone {
    pub fingerprint: Fingerprint,
    pub first: Span,
    pub repeats: Vec<Span>,
}

/// Key for one diagonal: the two routines plus the statement offset.
type Diagonal = (usize, usize, usize, usize, isize);

/// Find duplicated statement runs across `digests`.
///
/// `digests` must already be in their final order.
pub(crate) fn find_clones(digests: &[UnitDigest], config: &DuplicationConfig) -> Vec<BlockClone> {
    let min_statements = config.min_block_statements.max(1);
    let mut first_seen: HashMap<Fingerprint, Span> = HashMap::new();
    let mut diagonals: BTreeMap<Diagonal, Vec<(usize, usize)>> = BTreeMap::new();

    for (unit, digest) in digests.iter().enumerate() {
        for (routine, body) in digest.routines.iter().enumerate() {
            let stmts = &body.statements;
            for start in 0..stmts.len() {
                let mut hasher = blake3::Hasher::new();
                let mut tokens = 0;

                for end in start + 1..=stmts.len() {
                    let stmt = &stmts[end - 1];
                    hasher.update(stmt.hash.as_bytes());
                    tokens += stmt.tokens;

                    if end - start < min_statements || tokens < config.min_block_tokens {
                        continue;
                    }

                    let fingerprint = Fingerprint::from(hasher.clone().finalize());
                    let here = Span {
                        unit,
                        routine,
                        start,
                        end,
                    };

                    let Some(first) = first_seen.get(&fingerprint).copied() else {
                        first_seen.insert(fingerprint, here);
                        continue;
                    };

                    if first.overlaps(&here) {
                        continue;
                    }

                    let delta = start as isize - first.start as isize;
                    diagonals
                        .entry((first.unit, first.routine, unit, routine, delta))
                        .or_default()
                        .push((first.start, first.end));
                }
            }
        }
    }

    let mut firsts: BTreeSet<Span> = BTreeSet::new();
    for (&(a_unit, a_routine, b_unit, b_routine, delta), intervals) in &diagonals {
        for (start, end) in merge_intervals(intervals) {
            let mut first = Span {
                unit: a_unit,
                routine: a_routine,
                start,
                end,
            };
            let repeat = Span {
                unit: b_unit,
                routine: b_routine,
                start: (start as isize + delta) as usize,
                end: (end as isize + delta) as usize,
            };

            if first.overlaps(&repeat) {
                // Same routine: trim back to the offset.
                first.end = first.start + delta.unsigned_abs();
            }

            if is_large_enough(digests, &first, config) {
                firsts.insert(first);
            }
        }
    }

    let wanted: HashSet<(Fingerprint, usize)> = firsts
        .iter()
        .map(|first| (span_fingerprint(digests, first), first.len()))
        .collect();
    let mut occurrences = find_occurrences(digests, &wanted);

    let mut emitted: HashSet<Fingerprint> = HashSet::new();
    let mut clones = Vec::new();
    for first in &firsts {
        let fingerprint = span_fingerprint(digests, first);
        if !emitted.insert(fingerprint) {
            continue;
        }
        let spans = occurrences.remove(&fingerprint).unwrap_or_default();
        let (first, repeats) = match spans.split_first() {
            Some((first, rest)) if !rest.is_empty() => (*first, rest.to_vec()),
            _ => continue,
        };
        clones.push(BlockClone {
            fingerprint,
            first,
            repeats,
        });
    }
    clones
}

/// Every non-overlapping window whose (fingerprint, length) is in `wanted`,
/// in visiting order.
fn find_occurrences(
    digests: &[UnitDigest],
    wanted: &HashSet<(Fingerprint, usize)>,
) -> HashMap<Fingerprint, Vec<Span>> {
    let lengths: BTreeSet<usize> = wanted.iter().map(|&(_, len)| len).collect();
    let Some(&longest) = lengths.iter().next_back() else {
        return HashMap::new();
    };

    let mut found: HashMap<Fingerprint, Vec<Span>> = HashMap::new();
    for (unit, digest) in digests.iter().enumerate() {
        for (routine, body) in digest.routines.iter().enumerate() {
            let stmts = &body.statements;
            for start in 0..stmts.len() {
                let mut hasher = blake3::Hasher::new();
                for end in start + 1..=stmts.len().min(start + longest) {
                    hasher.update(stmts[end - 1].hash.as_bytes());
                    if !lengths.contains(&(end - start)) {
                        continue;
                    }

                    let fingerprint = Fingerprint::from(hasher.clone().finalize());
                    if !wanted.contains(&(fingerprint, end - start)) {
                        continue;
                    }

                    let here = Span {
                        unit,
                        routine,
                        start,
                        end,
                    };
                    let spans = found.entry(fingerprint).or_default();
                    if spans.last().map_or(true, |last| !last.overlaps(&here)) {
                        spans.push(here);
                    }
                }
            }
        }
    }
    found
}

/// Merge intervals that overlap or touch.
fn merge_intervals(intervals: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut sorted = intervals.to_vec();
    sorted.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn is_large_enough(digests: &[UnitDigest], span: &Span, config: &DuplicationConfig) -> bool {
    if span.len() < config.min_block_statements.max(1) {
        return false;
    }
    let tokens: usize = statements(digests, span).iter().map(|s| s.tokens).sum();
    tokens >= config.min_block_tokens
}

fn statements<'d>(digests: &'d [UnitDigest], span: &Span) -> &'d [StatementDigest] {
    &digests[span.unit].routines[span.routine].statements[span.start..span.end]
}

/// Fingerprint of a span, computed the same way windows are.
pub(crate) fn span_fingerprint(digests: &[UnitDigest], span: &Span) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    for stmt in statements(digests, span) {
        hasher.update(stmt.hash.as_bytes());
    }
    hasher.finalize().into()
}

/// First and last source line covered by a span.
pub(crate) fn line_range(digests: &[UnitDigest], span: &Span) -> (usize, usize) {
    let stmts = statements(digests, span);
    let start = stmts.first().map_or(1, |s| s.start_line);
    let end = stmts.last().map_or(start, |s| s.end_line);
    (start, end)
}
