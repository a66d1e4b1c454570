//! In-memory source provider for editor buffers and tests.

use super::{SourceProvider, SourceUnit};

/// Holds raw `(path, source)` pairs and parses them on demand.
///
/// Each call to [`SourceProvider::source_units`] parses the buffers again, so
/// units are never shared between iterations.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    files: Vec<(String, String)>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a buffer. The language is chosen from the path's extension.
    pub fn with_file(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.add_file(path, source);
        self
    }

    pub fn add_file(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.push((path.into(), source.into()));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceProvider for MemoryProvider {
    fn source_units(&self) -> Box<dyn Iterator<Item = SourceUnit> + '_> {
        Box::new(self.files.iter().filter_map(|(path, source)| {
            match SourceUnit::parse(path.as_str(), source.as_str()) {
                Ok(unit) => Some(unit),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping unparseable buffer");
                    None
                }
            }
        }))
    }
}

impl<P: Into<String>, S: Into<String>> FromIterator<(P, S)> for MemoryProvider {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let mut provider = MemoryProvider::new();
        for (path, source) in iter {
            provider.add_file(path, source);
        }
        provider
    }
}
