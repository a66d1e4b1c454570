//! Content fingerprints and per-unit digests.
//!
//! A unit is reduced to a [`UnitDigest`] as soon as it is ingested, so the
//! detector never holds on to trees or source text.

use std::fmt;

use crate::source::{syntax, SourceUnit};

/// Separator between tokens when hashing a statement.
const TOKEN_SEPARATOR: &[u8] = b"\x1f";

/// A blake3 content hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self::from(blake3::hash(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex form.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// Leading 12 hex digits, used as a stable group id.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Collapse whitespace runs to one space, trim lines and drop blank ones.
pub fn normalize_source(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            continue;
        };
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(first);
        for word in words {
            out.push(' ');
            out.push_str(word);
        }
    }
    out
}

/// Hash of one statement's token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementDigest {
    pub hash: Fingerprint,
    pub tokens: usize,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutineDigest {
    pub statements: Vec<StatementDigest>,
}

/// Everything the detector keeps about one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDigest {
    pub path: String,
    /// Hash of the whitespace-normalized source.
    pub fingerprint: Fingerprint,
    /// Line count of the normalized source.
    pub significant_lines: usize,
    /// Last line of the original source.
    pub end_line: usize,
    pub routines: Vec<RoutineDigest>,
}

impl UnitDigest {
    pub fn from_unit(unit: &SourceUnit) -> Self {
        let normalized = normalize_source(unit.source());
        let significant_lines = if normalized.is_empty() {
            0
        } else {
            normalized.lines().count()
        };

        let routines = match syntax::routines(unit) {
            Ok(routines) => routines
                .iter()
                .map(|routine| RoutineDigest {
                    statements: routine
                        .statements()
                        .into_iter()
                        .filter_map(|node| digest_statement(unit, node))
                        .collect(),
                })
                .filter(|r| !r.statements.is_empty())
                .collect(),
            Err(e) => {
                tracing::warn!(path = %unit.path(), error = %e, "could not extract routines");
                Vec::new()
            }
        };

        Self {
            path: unit.path().to_string(),
            fingerprint: Fingerprint::of(normalized.as_bytes()),
            significant_lines,
            end_line: unit.line_count().max(1),
            routines,
        }
    }
}

fn digest_statement(unit: &SourceUnit, node: tree_sitter::Node<'_>) -> Option<StatementDigest> {
    let tokens = syntax::tokens(unit, node);
    if tokens.is_empty() {
        return None;
    }

    let mut hasher = blake3::Hasher::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            hasher.update(TOKEN_SEPARATOR);
        }
        hasher.update(token.as_bytes());
    }

    Some(StatementDigest {
        hash: hasher.finalize().into(),
        tokens: tokens.len(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
    })
}
