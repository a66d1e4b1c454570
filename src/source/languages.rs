//! Tree-sitter grammars and per-language routine queries.
//!
//! Every supported language is one static [`LanguageDef`]. Lookups go through
//! a lazily built extension index, and compiled routine queries are cached on
//! the entry, so each query is compiled once per process.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Language, Parser, Query, Tree};

/// A supported source language.
pub struct LanguageDef {
    /// Language identifier (e.g., "rust", "go").
    pub id: &'static str,
    /// File extensions handled by this language (without dot).
    pub extensions: &'static [&'static str],
    /// Tree-sitter query capturing every routine node as `@routine`.
    pub routine_query: &'static str,
    grammar: fn() -> Language,
    compiled_routines: OnceCell<Query>,
}

impl LanguageDef {
    const fn new(
        id: &'static str,
        extensions: &'static [&'static str],
        routine_query: &'static str,
        grammar: fn() -> Language,
    ) -> Self {
        Self {
            id,
            extensions,
            routine_query,
            grammar,
            compiled_routines: OnceCell::new(),
        }
    }

    /// The tree-sitter language for this grammar.
    pub fn language(&self) -> Language {
        (self.grammar)()
    }

    /// Parse source text into a tree.
    ///
    /// Partial parse errors still produce a tree with ERROR nodes; only a
    /// total failure is reported as an error.
    pub fn parse(&self, source: &str) -> anyhow::Result<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&self.language())?;
        parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse {} source", self.id))
    }

    /// The compiled routine query, compiled on first use.
    pub fn routines(&self) -> anyhow::Result<&Query> {
        self.compiled_routines.get_or_try_init(|| {
            Query::new(&self.language(), self.routine_query)
                .map_err(|e| anyhow::anyhow!("compiling {} routine query: {}", self.id, e))
        })
    }
}

impl std::fmt::Debug for LanguageDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageDef")
            .field("id", &self.id)
            .field("extensions", &self.extensions)
            .finish()
    }
}

fn c_grammar() -> Language {
    tree_sitter_c::LANGUAGE.into()
}

fn cpp_grammar() -> Language {
    tree_sitter_cpp::LANGUAGE.into()
}

fn go_grammar() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

fn java_grammar() -> Language {
    tree_sitter_java::LANGUAGE.into()
}

fn javascript_grammar() -> Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn python_grammar() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

fn rust_grammar() -> Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn scala_grammar() -> Language {
    tree_sitter_scala::LANGUAGE.into()
}

fn swift_grammar() -> Language {
    tree_sitter_swift::LANGUAGE.into()
}

fn typescript_grammar() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx_grammar() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

const JS_ROUTINES: &str = r#"
[
  (function_declaration)
  (generator_function_declaration)
  (function_expression)
  (arrow_function)
  (method_definition)
] @routine
"#;

static LANGUAGES: [LanguageDef; 11] = [
    LanguageDef::new("c", &["c", "h"], "(function_definition) @routine", c_grammar),
    LanguageDef::new(
        "cpp",
        &["cpp", "cc", "cxx", "hpp", "hh"],
        "[(function_definition) (lambda_expression)] @routine",
        cpp_grammar,
    ),
    LanguageDef::new(
        "go",
        &["go"],
        "[(function_declaration) (method_declaration) (func_literal)] @routine",
        go_grammar,
    ),
    LanguageDef::new(
        "java",
        &["java"],
        "[(method_declaration) (constructor_declaration)] @routine",
        java_grammar,
    ),
    LanguageDef::new("javascript", &["js", "jsx", "mjs", "cjs"], JS_ROUTINES, javascript_grammar),
    LanguageDef::new("python", &["py"], "(function_definition) @routine", python_grammar),
    LanguageDef::new("rust", &["rs"], "(function_item) @routine", rust_grammar),
    LanguageDef::new("scala", &["scala", "sc"], "(function_definition) @routine", scala_grammar),
    LanguageDef::new("swift", &["swift"], "(function_declaration) @routine", swift_grammar),
    LanguageDef::new("typescript", &["ts", "mts", "cts"], JS_ROUTINES, typescript_grammar),
    LanguageDef::new("tsx", &["tsx"], JS_ROUTINES, tsx_grammar),
];

static EXTENSION_INDEX: Lazy<HashMap<&'static str, &'static LanguageDef>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for spec in LANGUAGES.iter() {
        for ext in spec.extensions {
            index.insert(*ext, spec);
        }
    }
    index
});

/// All supported languages.
pub fn all() -> &'static [LanguageDef] {
    &LANGUAGES
}

/// Get the language handling the given file extension (without dot).
pub fn for_extension(ext: &str) -> Option<&'static LanguageDef> {
    EXTENSION_INDEX.get(ext).copied()
}

/// Get the language for a path, based on its extension.
pub fn for_path(path: &str) -> Option<&'static LanguageDef> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(for_extension)
}

/// Get a language by its identifier.
pub fn by_id(id: &str) -> Option<&'static LanguageDef> {
    LANGUAGES.iter().find(|spec| spec.id == id)
}
