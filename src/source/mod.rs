//! Source units and the providers that supply them.
//!
//! A [`SourceUnit`] is one parsed input: a logical path used for attribution,
//! the source text, and its tree-sitter tree. Providers hand out units lazily
//! and swallow per-item failures, so everything downstream can assume each
//! unit it receives is analyzable.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ FsProvider   │────▶│ SourceUnit   │────▶│ Engine /     │
//! │ MemoryProv.  │     │ (path, tree) │     │ Duplication  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

mod fs;
pub mod languages;
mod memory;
pub mod syntax;

pub use fs::FsProvider;
pub use languages::LanguageDef;
pub use memory::MemoryProvider;

use std::fmt;

use tree_sitter::Tree;

/// One parsed input file or buffer.
///
/// Units are immutable once built; providers own them until they are yielded.
pub struct SourceUnit {
    path: String,
    language: &'static LanguageDef,
    source: String,
    tree: Tree,
}

impl SourceUnit {
    /// Parse `source` with the grammar selected by the extension of `path`.
    ///
    /// Fails if the path is empty, the extension is unsupported, or the
    /// grammar cannot produce a tree at all.
    pub fn parse(path: impl Into<String>, source: impl Into<String>) -> anyhow::Result<Self> {
        let path = path.into();
        let language = languages::for_path(&path)
            .ok_or_else(|| anyhow::anyhow!("unsupported source file: {}", path))?;
        Self::parse_with(path, source, language)
    }

    /// Parse `source` with an explicit language.
    pub fn parse_with(
        path: impl Into<String>,
        source: impl Into<String>,
        language: &'static LanguageDef,
    ) -> anyhow::Result<Self> {
        let path = path.into();
        if path.is_empty() {
            anyhow::bail!("source unit path must not be empty");
        }
        let source = source.into();
        let tree = language.parse(&source)?;
        Ok(Self {
            path,
            language,
            source,
            tree,
        })
    }

    /// Logical path used for attribution.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The language this unit was parsed with.
    pub fn language(&self) -> &'static LanguageDef {
        self.language
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parse tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Whether the tree contains syntax error nodes.
    pub fn has_syntax_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Number of lines in the source text.
    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }
}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnit")
            .field("path", &self.path)
            .field("language", &self.language.id)
            .field("bytes", &self.source.len())
            .finish()
    }
}

/// Supplies parsed source units.
///
/// Implementations must:
/// - yield only units with a non-empty path,
/// - log and skip unreadable or unparseable items instead of failing,
/// - return a fresh, equivalent sequence on every call,
/// - produce units lazily rather than materializing the whole input.
pub trait SourceProvider {
    /// Lazily produce every source unit.
    fn source_units(&self) -> Box<dyn Iterator<Item = SourceUnit> + '_>;
}

impl<P: SourceProvider + ?Sized> SourceProvider for &P {
    fn source_units(&self) -> Box<dyn Iterator<Item = SourceUnit> + '_> {
        (**self).source_units()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selects_language_from_extension() {
        let unit = SourceUnit::parse("lib/util.py", "def f():\n    return 1\n").unwrap();
        assert_eq!(unit.language().id, "python");
        assert_eq!(unit.path(), "lib/util.py");
        assert_eq!(unit.line_count(), 2);
        assert!(!unit.has_syntax_errors());
    }

    #[test]
    fn test_parse_rejects_unsupported_extension() {
        assert!(SourceUnit::parse("notes.txt", "hello").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_path() {
        let rust = languages::by_id("rust").unwrap();
        assert!(SourceUnit::parse_with("", "fn main() {}", rust).is_err());
    }

    #[test]
    fn test_syntax_errors_still_produce_unit() {
        let unit = SourceUnit::parse("broken.rs", "fn main( {").unwrap();
        assert!(unit.has_syntax_errors());
    }
}
