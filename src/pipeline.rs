//! Per-file triage driver
//!
//! Every file name in a [`FailureIndex`] is first resolved to a real path,
//! merging names that point at the same file. Each resolved file and its
//! implementation file are then parsed once, and one [`Bundle`] is built
//! per failing test. Files are independent, so the loop can run on the
//! rayon pool.

use crate::bundle::{assemble, Bundle};
use crate::config::Config;
use crate::correlate::{FailingTest, FailureIndex, ResolvedSlot};
use crate::error::Result;
use crate::index::deps::{extract_dependencies, DependencySet};
use crate::index::{SourceFile, TestConvention};
use crate::locate::SourceLocator;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TEST_FILE_SUFFIX: &str = "_test.go";
const SOURCE_FILE_SUFFIX: &str = ".go";

/// Outcome of processing one file slot of the failure index
#[derive(Debug)]
pub struct FileOutcome {
    /// File name as reported by the feed
    pub file: PathBuf,
    /// Real path under the root, when the name could be located
    pub path: Option<PathBuf>,
    pub result: Result<Vec<Bundle>>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Implementation file paired with a test file: `foo_test.go` -> `foo.go`.
/// Anything else pairs with itself.
pub fn implementation_path(test_file: &Path) -> PathBuf {
    let Some(name) = test_file.file_name().and_then(|n| n.to_str()) else {
        return test_file.to_path_buf();
    };
    match name.strip_suffix(TEST_FILE_SUFFIX) {
        Some(stem) if !stem.is_empty() => {
            test_file.with_file_name(format!("{stem}{SOURCE_FILE_SUFFIX}"))
        }
        _ => test_file.to_path_buf(),
    }
}

/// Grow `deps` with the calls made by the declarations it names in
/// `file`, until nothing new is found
pub fn expand_dependencies(file: &SourceFile, deps: &DependencySet) -> DependencySet {
    let mut expanded = deps.clone();
    loop {
        let decls = file.declarations_named(&expanded);
        let reached = extract_dependencies(&decls);
        let before = expanded.len();
        expanded.union_with(&reached);
        if expanded.len() == before {
            return expanded;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Triage {
    locator: SourceLocator,
    convention: TestConvention,
    transitive: bool,
    keep_going: bool,
    parallel: bool,
}

impl Triage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            locator: SourceLocator::new(root),
            convention: TestConvention::default(),
            transitive: false,
            keep_going: false,
            parallel: false,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            locator: SourceLocator::new(root).with_ignore_dirs(config.ignore_dirs.clone()),
            convention: TestConvention::new(&config.test_prefix),
            transitive: config.transitive,
            keep_going: config.keep_going,
            parallel: config.parallel,
        }
    }

    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_transitive(mut self, transitive: bool) -> Self {
        self.transitive = transitive;
        self
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    /// Resolve the index's file names against this run's locator
    pub fn resolve(&self, index: &FailureIndex) -> Vec<ResolvedSlot> {
        index.resolve_each(&self.locator)
    }

    /// Resolve and process every file in the index.
    ///
    /// Outcomes come back in index order. Unless `keep_going` is set, the
    /// list ends at the first failed file.
    pub fn run(&self, index: &FailureIndex) -> Vec<FileOutcome> {
        self.run_resolved(self.resolve(index))
    }

    /// Process already-resolved slots. A slot that failed to resolve
    /// becomes a failed outcome in its position.
    pub fn run_resolved(&self, slots: Vec<ResolvedSlot>) -> Vec<FileOutcome> {
        let process = |slot: ResolvedSlot| match slot.located {
            Ok(located) => FileOutcome {
                file: slot.reported,
                result: self.process_file(&located.path, &located.tests),
                path: Some(located.path),
            },
            Err(err) => FileOutcome {
                file: slot.reported,
                path: None,
                result: Err(err),
            },
        };

        let mut outcomes = Vec::with_capacity(slots.len());
        if self.parallel {
            outcomes = slots.into_par_iter().map(process).collect();
        } else {
            for slot in slots {
                let outcome = process(slot);
                let failed = !outcome.is_ok();
                outcomes.push(outcome);
                if failed && !self.keep_going {
                    break;
                }
            }
        }

        if !self.keep_going {
            if let Some(first_err) = outcomes.iter().position(|o| !o.is_ok()) {
                outcomes.truncate(first_err + 1);
            }
        }
        outcomes
    }

    /// Build bundles for the failing tests of one resolved test file
    pub fn process_file(&self, test_path: &Path, tests: &[FailingTest]) -> Result<Vec<Bundle>> {
        let test_file = SourceFile::open(test_path)?;
        debug!(
            path = %test_path.display(),
            declarations = test_file.declarations().len(),
            "parsed test file"
        );

        let impl_path = implementation_path(test_path);
        let separate_impl = if impl_path != test_path {
            Some(SourceFile::open(&impl_path)?)
        } else {
            None
        };
        let impl_file = separate_impl.as_ref().unwrap_or(&test_file);

        let bundles = tests
            .iter()
            .map(|test| self.bundle_for(test, &test_file, impl_file))
            .collect();
        Ok(bundles)
    }

    fn bundle_for(&self, test: &FailingTest, test_file: &SourceFile, impl_file: &SourceFile) -> Bundle {
        let test_decls = test_file.test_declarations(&self.convention, &test.test_name);
        if test_decls.is_empty() {
            warn!(
                test = %test.full_test_name,
                path = %test_file.path().display(),
                "no test declaration found for failing test"
            );
        }

        let mut deps = extract_dependencies(&test_decls);
        if self.transitive {
            deps = expand_dependencies(impl_file, &deps);
        }
        debug!(test = %test.test_name, dependencies = deps.len(), "extracted dependencies");

        let dep_decls = impl_file.declarations_named(&deps);
        assemble(test, &test_decls, &dep_decls).with_files(test_file.path(), impl_file.path())
    }
}
