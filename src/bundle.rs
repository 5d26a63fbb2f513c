//! Packaging of a failing test's source context
//!
//! A [`Bundle`] is what crosses over to the repair side: the failing test's
//! source, the source of the declarations it calls, and the error text.
//! Source texts are carried exactly as the declaration store emitted them.

use crate::correlate::FailingTest;
use crate::index::Declaration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Top-level test function name
    #[serde(default)]
    pub test_name: String,
    /// Test identity including any subtest suffix
    #[serde(default)]
    pub full_test_name: String,
    /// File the failing test lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file: Option<PathBuf>,
    /// File the dependency declarations were read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_file: Option<PathBuf>,
    /// Test declaration sources, in file order
    pub test_sources: Vec<String>,
    /// Dependency declaration sources, in implementation-file order
    pub dependency_sources: Vec<String>,
    pub test_error: String,
}

impl Bundle {
    pub fn new(test_sources: Vec<String>, dependency_sources: Vec<String>, test_error: &str) -> Self {
        Self {
            test_sources,
            dependency_sources,
            test_error: test_error.to_string(),
            ..Default::default()
        }
    }

    pub fn with_test(mut self, test: &FailingTest) -> Self {
        self.test_name = test.test_name.clone();
        self.full_test_name = test.full_test_name.clone();
        self
    }

    pub fn with_files(mut self, test_file: &Path, implementation_file: &Path) -> Self {
        self.test_file = Some(test_file.to_path_buf());
        self.implementation_file = Some(implementation_file.to_path_buf());
        self
    }

    /// True when no test declaration matched the failing test's name
    pub fn is_missing_test_source(&self) -> bool {
        self.test_sources.is_empty()
    }
}

/// Bundle the verbatim text of the given declarations with the test's error
pub fn assemble(
    test: &FailingTest,
    test_decls: &[Declaration<'_>],
    dependency_decls: &[Declaration<'_>],
) -> Bundle {
    let test_sources = test_decls.iter().map(|d| d.text().to_string()).collect();
    let dependency_sources = dependency_decls
        .iter()
        .map(|d| d.text().to_string())
        .collect();

    Bundle::new(test_sources, dependency_sources, &test.test_error).with_test(test)
}
