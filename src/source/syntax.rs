//! Language-agnostic syntax helpers over tree-sitter trees.
//!
//! Rules and the duplication detector need the same few facts from a unit:
//! where the routines are, which statements make up a routine body, how many
//! parameters a routine declares, and the token text of a subtree.

use std::fmt;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCursor};

use super::SourceUnit;

/// Source location span with byte offsets and 1-indexed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// End line (1-indexed).
    pub end_line: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: Node) -> Self {
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1, // tree-sitter is 0-indexed
            end_line: node.end_position().row + 1,
        }
    }

    /// Number of lines covered by the span.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// A function, method or closure-like node.
#[derive(Debug, Clone, Copy)]
pub struct Routine<'t> {
    /// The routine node itself.
    pub node: Node<'t>,
    /// The body node, if the routine has one.
    pub body: Option<Node<'t>>,
    /// Span of the whole routine.
    pub span: Span,
}

impl<'t> Routine<'t> {
    /// The routine name, if it declares one.
    ///
    /// Follows `declarator` fields for C-family grammars where the name sits
    /// inside a function declarator.
    pub fn name<'u>(&self, unit: &'u SourceUnit) -> Option<&'u str> {
        let mut node = self.node;
        loop {
            if let Some(name) = node.child_by_field_name("name") {
                return Some(unit.node_text(name));
            }
            let declarator = node.child_by_field_name("declarator")?;
            if is_identifier(declarator.kind()) {
                return Some(unit.node_text(declarator));
            }
            node = declarator;
        }
    }

    /// Human-readable label used in messages.
    pub fn label(&self, unit: &SourceUnit) -> String {
        match self.name(unit) {
            Some(name) => name.to_string(),
            None => format!("<anonymous@{}>", self.span.start_line),
        }
    }

    /// Ordered statements of the routine body.
    pub fn statements(&self) -> Vec<Node<'t>> {
        match self.body {
            Some(body) => statements(body),
            None => Vec::new(),
        }
    }

    /// Number of declared parameters.
    ///
    /// Returns None when the grammar exposes no parameter list for this node.
    pub fn parameter_count(&self) -> Option<usize> {
        let mut node = self.node;
        loop {
            if let Some(params) = node.child_by_field_name("parameters") {
                return Some(named_children(params).filter(|n| !is_comment(n.kind())).count());
            }
            if node.child_by_field_name("parameter").is_some() {
                // Single bare parameter, e.g. `x => x + 1`
                return Some(1);
            }
            node = node.child_by_field_name("declarator")?;
        }
    }
}

/// Find every routine in a unit, ordered by position.
pub fn routines(unit: &SourceUnit) -> anyhow::Result<Vec<Routine<'_>>> {
    let query = unit.language().routines()?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, unit.tree().root_node(), unit.source().as_bytes());

    let mut found = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let node = capture.node;
            found.push(Routine {
                node,
                body: node.child_by_field_name("body"),
                span: Span::from_node(node),
            });
        }
    }

    // Sort by position for deterministic output
    found.sort_by_key(|r| (r.span.start_byte, r.span.end_byte));
    found.dedup_by_key(|r| (r.span.start_byte, r.span.end_byte));

    Ok(found)
}

/// Ordered statements inside a body node.
///
/// Block-like bodies contribute their named non-comment children; wrapper
/// nodes such as Go's `statement_list` are unwrapped. An expression body
/// counts as a single statement.
pub fn statements(body: Node<'_>) -> Vec<Node<'_>> {
    if !is_block(body.kind()) {
        return vec![body];
    }

    let mut children: Vec<Node> = named_children(body)
        .filter(|n| !is_comment(n.kind()))
        .collect();

    while children.len() == 1 && is_statement_list(children[0].kind()) {
        let wrapper = children[0];
        children = named_children(wrapper)
            .filter(|n| !is_comment(n.kind()))
            .collect();
    }

    children
}

/// Token texts of a subtree: every non-empty, non-comment leaf in order.
pub fn tokens<'u>(unit: &'u SourceUnit, node: Node<'_>) -> Vec<&'u str> {
    let mut out = Vec::new();
    let mut stack = vec![node];

    while let Some(current) = stack.pop() {
        if is_comment(current.kind()) {
            continue;
        }
        if current.child_count() == 0 {
            if current.end_byte() > current.start_byte() {
                out.push(unit.node_text(current));
            }
            continue;
        }
        let mut walker = current.walk();
        let children: Vec<Node> = current.children(&mut walker).collect();
        stack.extend(children.into_iter().rev());
    }

    out
}

fn named_children(node: Node<'_>) -> impl Iterator<Item = Node<'_>> {
    (0..node.named_child_count()).filter_map(move |i| node.named_child(i))
}

fn is_comment(kind: &str) -> bool {
    kind.contains("comment")
}

fn is_identifier(kind: &str) -> bool {
    matches!(
        kind,
        "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name" | "operator_name"
    )
}

fn is_block(kind: &str) -> bool {
    kind.contains("block")
        || kind.ends_with("body")
        || matches!(kind, "compound_statement" | "statements")
}

fn is_statement_list(kind: &str) -> bool {
    matches!(kind, "statement_list" | "statements")
}
