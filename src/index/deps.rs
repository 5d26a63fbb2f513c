//! Syntactic call-dependency extraction
//!
//! Collects every bare identifier in the callee position of a call
//! expression. There is no scope or type analysis: builtins, conversions
//! written as calls, recursive calls and local closures all count.
//! Selector calls like `t.Run(...)` are not bare identifiers and are skipped.

use super::Declaration;
use super::parser::get_node_text;
use serde::Serialize;
use std::collections::BTreeSet;
use tree_sitter::Node;

/// Distinct callee names referenced by a set of declarations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencySet {
    names: BTreeSet<String>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the name was not present yet
    pub fn insert(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }
        self.names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn union_with(&mut self, other: &DependencySet) {
        for name in other.iter() {
            self.insert(name);
        }
    }
}

impl<'a> FromIterator<&'a str> for DependencySet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = DependencySet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl FromIterator<String> for DependencySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Callee identifiers of one declaration in pre-order, duplicates kept
pub fn call_targets<'a>(decl: &Declaration<'a>) -> Vec<&'a str> {
    let mut targets = Vec::new();
    collect_call_targets(decl.node(), decl.source, &mut targets);
    targets
}

fn collect_call_targets<'a>(root: Node<'a>, content: &'a str, targets: &mut Vec<&'a str>) {
    let mut cursor = root.walk();

    loop {
        let node = cursor.node();

        if node.kind() == "call_expression" {
            if let Some(function) = node.child_by_field_name("function") {
                if function.kind() == "identifier" {
                    targets.push(get_node_text(&function, content));
                }
            }
        }

        if cursor.goto_first_child() {
            continue;
        }

        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Union of the call targets of every given declaration
pub fn extract_dependencies<'d, 'a: 'd, I>(decls: I) -> DependencySet
where
    I: IntoIterator<Item = &'d Declaration<'a>>,
{
    let mut set = DependencySet::new();
    for decl in decls {
        for name in call_targets(decl) {
            set.insert(name);
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{SourceFile, TestConvention};

    const TESTS: &str = r#"package example

import "testing"

func Test_subtract(t *testing.T) {
	if got := subtract(1, 2); got != -1 {
		t.Errorf("subtract() = %v, want %v", got, -1)
	}
}

func Test_divide(t *testing.T) {
	tests := []struct {
		name string
		want int
	}{
		{name: "1 / 2 = 0", want: 0},
	}
	for _, tt := range tests {
		t.Run(tt.name, func(t *testing.T) {
			if got := divide(1, 2); got != tt.want {
				t.Errorf("divide() = %v, want %v", got, tt.want)
			}
		})
	}
}

func Test_mixed(t *testing.T) {
	check := func(v int) bool { return v > 0 }
	buf := make([]int, 0, len("abc"))
	_ = check(add(1, 2))
	_ = Test_mixed
	Test_mixed(t)
	_ = buf
}
"#;

    fn tests_file() -> SourceFile {
        SourceFile::parse("example_test.go", TESTS.to_string()).unwrap()
    }

    fn deps_of(file: &SourceFile, name: &str) -> Vec<String> {
        let decls = file.test_declarations(&TestConvention::default(), name);
        extract_dependencies(&decls).iter().map(str::to_string).collect()
    }

    #[test]
    fn test_only_subtract() {
        let file = tests_file();
        assert_eq!(deps_of(&file, "Test_subtract"), vec!["subtract"]);
    }

    #[test]
    fn test_nested_closures_are_walked() {
        let file = tests_file();
        assert_eq!(deps_of(&file, "Test_divide"), vec!["divide"]);
    }

    #[test]
    fn test_builtins_locals_and_recursion() {
        let file = tests_file();
        assert_eq!(
            deps_of(&file, "Test_mixed"),
            vec!["Test_mixed", "add", "check", "len", "make"]
        );
    }

    #[test]
    fn test_call_targets_are_pre_order() {
        let file = tests_file();
        let decls = file.test_declarations(&TestConvention::default(), "Test_mixed");
        let targets = call_targets(&decls[0]);
        assert_eq!(
            targets,
            vec!["make", "len", "check", "add", "Test_mixed"]
        );
    }

    #[test]
    fn test_union_across_declarations() {
        let file = tests_file();
        let convention = TestConvention::default();
        let decls: Vec<_> = file
            .declarations()
            .into_iter()
            .filter(|d| convention.is_test_declaration(d))
            .filter(|d| d.name() != "Test_mixed")
            .collect();

        let set = extract_dependencies(&decls);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["divide", "subtract"]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let file = tests_file();
        let decls = file.declarations();
        assert_eq!(extract_dependencies(&decls), extract_dependencies(&decls));
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let mut set: DependencySet = ["a", "b", "a"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(!set.insert("b"));
        let other: DependencySet = vec!["c".to_string()].into_iter().collect();
        set.union_with(&other);
        assert!(set.contains("c"));
        assert_eq!(set.len(), 3);
    }
}
