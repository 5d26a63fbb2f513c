//! Declaration store for Go source files
//!
//! Uses tree-sitter to parse a file once and expose its top-level
//! function and method declarations. Declarations borrow from the
//! [`SourceFile`] that parsed them and print back out verbatim: the
//! emitted text is an exact slice of the file contents, so comments
//! and formatting survive unchanged.

pub mod deps;
pub mod parser;

use crate::error::{Result, TriageError};
use deps::DependencySet;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Tree};

pub use parser::SyntaxDiagnostic;

/// Default name prefix of Go test functions
pub const DEFAULT_TEST_PREFIX: &str = "Test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeclarationKind {
    Function,
    Method,
}

impl DeclarationKind {
    fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "function_declaration" => Some(DeclarationKind::Function),
            "method_declaration" => Some(DeclarationKind::Method),
            _ => None,
        }
    }
}

/// Naming convention that separates test declarations from ordinary ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConvention {
    prefix: String,
}

impl Default for TestConvention {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_PREFIX)
    }
}

impl TestConvention {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_test_name(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }

    pub fn is_test_declaration(&self, decl: &Declaration<'_>) -> bool {
        self.is_test_name(decl.name())
    }
}

/// A named function or method with its exact source span.
///
/// The span starts at the declaration's doc comment, when one sits
/// directly above it, and ends at the closing brace.
#[derive(Debug, Clone, Copy)]
pub struct Declaration<'a> {
    name: &'a str,
    kind: DeclarationKind,
    node: Node<'a>,
    doc_start: usize,
    source: &'a str,
}

impl<'a> Declaration<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    /// Syntax node of the declaration itself (without its doc comment)
    pub fn node(&self) -> Node<'a> {
        self.node
    }

    pub fn body(&self) -> Option<Node<'a>> {
        self.node.child_by_field_name("body")
    }

    /// Verbatim source text, doc comment included
    pub fn text(&self) -> &'a str {
        &self.source[self.doc_start..self.node.end_byte()]
    }

    pub fn doc_comment(&self) -> Option<&'a str> {
        let start = self.node.start_byte();
        (self.doc_start < start).then(|| self.source[self.doc_start..start].trim_end())
    }

    /// 1-based line of the `func` keyword
    pub fn line(&self) -> usize {
        self.node.start_position().row + 1
    }

    pub fn end_line(&self) -> usize {
        self.node.end_position().row + 1
    }
}

/// A parsed Go source file
pub struct SourceFile {
    path: PathBuf,
    content: String,
    tree: Tree,
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("bytes", &self.content.len())
            .finish()
    }
}

impl SourceFile {
    /// Read and parse a file from disk
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| TriageError::ReadSource {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, content)
    }

    /// Parse in-memory source. Any syntax error fails the whole file.
    pub fn parse(path: impl Into<PathBuf>, content: String) -> Result<Self> {
        let path = path.into();
        let tree = parser::parse_go(&content).ok_or_else(|| TriageError::Parse {
            path: path.clone(),
            line: 1,
            column: 1,
            message: "parser produced no tree".to_string(),
        })?;

        if let Some(diagnostic) = parser::first_syntax_error(&tree, &content) {
            return Err(TriageError::Parse {
                path,
                line: diagnostic.line,
                column: diagnostic.column,
                message: diagnostic.message,
            });
        }

        Ok(Self {
            path,
            content,
            tree,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Top-level function and method declarations in file order
    pub fn declarations(&self) -> Vec<Declaration<'_>> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        let mut declarations = Vec::new();

        // Open comment block: (start byte, last row)
        let mut doc: Option<(usize, usize)> = None;
        let mut prev_end_row: Option<usize> = None;

        for child in root.children(&mut cursor) {
            let start_row = child.start_position().row;
            let end_row = child.end_position().row;

            if child.kind() == "comment" {
                doc = match doc {
                    Some((start, last_row)) if start_row <= last_row + 1 => Some((start, end_row)),
                    // trailing comment on the same line as code
                    _ if prev_end_row == Some(start_row) => None,
                    _ => Some((child.start_byte(), end_row)),
                };
                continue;
            }

            if let Some(kind) = DeclarationKind::from_node_kind(child.kind()) {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let doc_start = match doc {
                        Some((start, last_row)) if last_row + 1 == start_row => start,
                        _ => child.start_byte(),
                    };
                    declarations.push(Declaration {
                        name: parser::get_node_text(&name_node, &self.content),
                        kind,
                        node: child,
                        doc_start,
                        source: &self.content,
                    });
                }
            }

            doc = None;
            prev_end_row = Some(end_row);
        }

        declarations
    }

    /// Test declarations named exactly `name`. Every match is returned,
    /// although names are unique within a well-formed file.
    pub fn test_declarations(
        &self,
        convention: &TestConvention,
        name: &str,
    ) -> Vec<Declaration<'_>> {
        self.declarations()
            .into_iter()
            .filter(|d| convention.is_test_declaration(d) && d.name() == name)
            .collect()
    }

    /// Declarations whose name is in `names`, in file order
    pub fn declarations_named(&self, names: &DependencySet) -> Vec<Declaration<'_>> {
        self.declarations()
            .into_iter()
            .filter(|d| names.contains(d.name()))
            .collect()
    }
}
