//! Tree-sitter based parsing of Go sources

use std::cell::RefCell;
use tree_sitter::{Node, Parser, Tree};

// ═══════════════════════════════════════════════════════════════════════════
//  THREAD-LOCAL PARSER
// ═══════════════════════════════════════════════════════════════════════════
//
// Tree-sitter parsers are expensive to create but can be reused across
// files. Each rayon worker thread gets its own pre-configured parser.

thread_local! {
    static GO_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignore error here - will be caught at parse time if language fails
        let _ = p.set_language(&tree_sitter_go::LANGUAGE.into());
        p
    });
}

/// Parse Go source with the thread-local parser
pub fn parse_go(content: &str) -> Option<Tree> {
    GO_PARSER.with(|p| p.borrow_mut().parse(content, None))
}

/// First syntax problem found in a tree, with a 1-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Locate the first error or missing node in pre-order, if any
pub fn first_syntax_error(tree: &Tree, content: &str) -> Option<SyntaxDiagnostic> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let mut cursor = root.walk();
    loop {
        let node = cursor.node();

        if node.is_missing() || node.is_error() {
            return Some(diagnostic_for(&node, content));
        }

        // Only descend into subtrees that contain the error
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }

        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                // has_error() was set but no node claimed it
                return Some(diagnostic_for(&root, content));
            }
        }
    }
}

fn diagnostic_for(node: &Node, content: &str) -> SyntaxDiagnostic {
    let position = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let snippet = get_node_text(node, content);
        let snippet = snippet.lines().next().unwrap_or("").trim();
        if snippet.is_empty() {
            "syntax error".to_string()
        } else {
            format!("syntax error near `{}`", truncate(snippet, 40))
        }
    };

    SyntaxDiagnostic {
        line: position.row + 1,
        column: position.column + 1,
        message,
    }
}

pub(crate) fn get_node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    &content[node.start_byte()..node.end_byte()]
}

fn truncate(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", truncated)
}
