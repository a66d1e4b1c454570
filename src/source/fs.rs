//! Filesystem-backed source provider.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use super::{languages, SourceProvider, SourceUnit};

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "vendor", "__pycache__"];

/// Walks a file or directory and yields every supported source file.
///
/// The walk is sorted by file name, so repeated calls yield the same units in
/// the same order. Files are read and parsed one at a time as the iterator is
/// pulled.
#[derive(Debug, Clone)]
pub struct FsProvider {
    root: PathBuf,
    excludes: GlobSet,
}

impl FsProvider {
    /// Create a provider rooted at a file or directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            excludes: GlobSet::empty(),
        }
    }

    /// Exclude paths matching any of the given glob patterns.
    ///
    /// Patterns are matched against the path relative to the root.
    pub fn with_excludes<S: AsRef<str>>(mut self, patterns: &[S]) -> anyhow::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid exclude pattern {:?}: {}", pattern, e))?;
            builder.add(glob);
        }
        self.excludes = builder.build()?;
        Ok(self)
    }

    /// The root this provider walks.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Logical path for a file: relative to the root, `/`-separated.
    fn logical_path(&self, path: &Path) -> String {
        let relative = if self.root.is_file() {
            path.file_name().map(Path::new).unwrap_or(path)
        } else {
            path.strip_prefix(&self.root).unwrap_or(path)
        };
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn load(&self, entry: DirEntry) -> Option<SourceUnit> {
        let path = entry.path();
        let logical = self.logical_path(path);

        if self.excludes.is_match(&logical) {
            tracing::debug!(path = %logical, "excluded by pattern");
            return None;
        }

        let Some(language) = languages::for_path(&logical) else {
            tracing::debug!(path = %logical, "unsupported file type");
            return None;
        };

        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %logical, error = %e, "skipping unreadable file");
                return None;
            }
        };

        match SourceUnit::parse_with(logical.clone(), source, language) {
            Ok(unit) => {
                if unit.has_syntax_errors() {
                    tracing::debug!(path = %logical, "source contains syntax errors");
                }
                Some(unit)
            }
            Err(e) => {
                tracing::warn!(path = %logical, error = %e, "skipping unparseable file");
                None
            }
        }
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

impl SourceProvider for FsProvider {
    fn source_units(&self) -> Box<dyn Iterator<Item = SourceUnit> + '_> {
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e));

        Box::new(
            walker
                .filter_map(|entry| match entry {
                    Ok(e) => Some(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable directory entry");
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
                .filter_map(move |e| self.load(e)),
        )
    }
}
