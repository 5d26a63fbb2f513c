//! Failure correlation over the event stream
//!
//! `go test -json` reports a failure as a `fail` event that carries the test
//! identity but no location. The file and message live in earlier `output`
//! events for the same test, e.g.
//!
//! ```text
//! {"Action":"output","Test":"Test_divide/1_/_2_=_0","Output":"    example_test.go:55: divide() = -2, want 0\n"}
//! {"Action":"fail","Test":"Test_divide/1_/_2_=_0","Elapsed":0}
//! ```
//!
//! Both lookups are first-match-wins in feed order. They are built in a
//! single pass keyed by test identity before the fail markers are visited.

use crate::error::Result;
use crate::events::TestEvent;
use crate::locate::SourceLocator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of the source language the feed reports locations in
pub const GO_EXTENSION: &str = "go";

/// Identity of one failing test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingTest {
    /// Top-level test function name (identity up to the first `/`)
    pub test_name: String,
    /// Full identity including any subtest suffix
    pub full_test_name: String,
    /// First diagnostic message for this test, or empty
    pub test_error: String,
}

impl FailingTest {
    pub fn new(full_test_name: &str, test_error: &str) -> Self {
        Self {
            test_name: top_level_name(full_test_name).to_string(),
            full_test_name: full_test_name.to_string(),
            test_error: test_error.to_string(),
        }
    }

    pub fn is_subtest(&self) -> bool {
        self.test_name.len() != self.full_test_name.len()
    }
}

/// Name of the top-level test function for a (possibly nested) test identity
pub fn top_level_name(full_test_name: &str) -> &str {
    full_test_name.split('/').next().unwrap_or(full_test_name)
}

/// Failing tests attributed to one source file, in feed order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailures {
    pub path: PathBuf,
    pub tests: Vec<FailingTest>,
}

/// Mapping from source file to its failing tests.
///
/// Files keep first-occurrence order. Tests within a file keep the order
/// their fail markers appeared, duplicates included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureIndex {
    slots: Vec<FileFailures>,
    #[serde(skip)]
    positions: HashMap<PathBuf, usize>,
}

impl FailureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failing test under `path`, creating the slot if absent
    pub fn push(&mut self, path: impl Into<PathBuf>, test: FailingTest) {
        let path = path.into();
        match self.positions.get(&path) {
            Some(&slot) => self.slots[slot].tests.push(test),
            None => {
                self.positions.insert(path.clone(), self.slots.len());
                self.slots.push(FileFailures {
                    path,
                    tests: vec![test],
                });
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<&[FailingTest]> {
        self.positions
            .get(path)
            .map(|&slot| self.slots[slot].tests.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of files with at least one failing test
    pub fn file_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of failing tests across all files
    pub fn test_count(&self) -> usize {
        self.slots.iter().map(|s| s.tests.len()).sum()
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.slots.iter().map(|s| s.path.as_path())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileFailures> {
        self.slots.iter()
    }

    pub fn as_slice(&self) -> &[FileFailures] {
        &self.slots
    }

    /// Resolve every slot's reported file name under the locator's root.
    ///
    /// Slots whose names land on the same real path are merged: the later
    /// slot's tests are appended to the first. A name that cannot be located stays
    /// in place as an error, so callers can decide whether to halt.
    pub fn resolve_each(&self, locator: &SourceLocator) -> Vec<ResolvedSlot> {
        let mut resolved: Vec<ResolvedSlot> = Vec::with_capacity(self.slots.len());
        let mut merged: HashMap<PathBuf, usize> = HashMap::new();

        for slot in &self.slots {
            let path = match locator.locate(&slot.path.to_string_lossy()) {
                Ok(path) => path,
                Err(err) => {
                    resolved.push(ResolvedSlot {
                        reported: slot.path.clone(),
                        located: Err(err),
                    });
                    continue;
                }
            };

            if let Some(&at) = merged.get(&path) {
                debug!(
                    reported = %slot.path.display(),
                    path = %path.display(),
                    "merging failures that resolve to the same file"
                );
                if let Ok(existing) = &mut resolved[at].located {
                    existing.tests.extend(slot.tests.iter().cloned());
                }
                continue;
            }

            merged.insert(path.clone(), resolved.len());
            resolved.push(ResolvedSlot {
                reported: slot.path.clone(),
                located: Ok(FileFailures {
                    path,
                    tests: slot.tests.clone(),
                }),
            });
        }
        resolved
    }

    /// Replace every reported file name with its real path under the
    /// locator's root. Names resolving to the same path are merged.
    pub fn resolve(&self, locator: &SourceLocator) -> Result<FailureIndex> {
        let mut resolved = FailureIndex::new();
        for slot in self.resolve_each(locator) {
            let located = slot.located?;
            for test in located.tests {
                resolved.push(located.path.clone(), test);
            }
        }
        Ok(resolved)
    }
}

/// A slot of the failure index after its file name has been looked up
#[derive(Debug)]
pub struct ResolvedSlot {
    /// File name as reported by the feed (the first one, when merged)
    pub reported: PathBuf,
    pub located: Result<FileFailures>,
}

impl IntoIterator for FailureIndex {
    type Item = FileFailures;
    type IntoIter = std::vec::IntoIter<FileFailures>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a FailureIndex {
    type Item = &'a FileFailures;
    type IntoIter = std::slice::Iter<'a, FileFailures>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

/// Groups fail markers by test identity and attributes them to files
#[derive(Debug, Clone)]
pub struct Correlator {
    marker: String,
    extension: String,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(GO_EXTENSION)
    }
}

impl Correlator {
    pub fn new(extension: &str) -> Self {
        Self {
            marker: format!(".{extension}:"),
            extension: extension.to_string(),
        }
    }

    /// File name from an output line containing `<name>.<ext>:`
    pub fn location_file_name(&self, output: &str) -> Option<String> {
        let end = output.find(&self.marker)?;
        let stem = output[..end].trim();
        Some(format!("{stem}.{}", self.extension))
    }

    /// Build the failure index for an ordered event sequence.
    ///
    /// A fail marker with no location-bearing output for its test cannot be
    /// attributed to a file and is dropped.
    pub fn correlate(&self, events: &[TestEvent]) -> FailureIndex {
        let mut locations: HashMap<&str, String> = HashMap::new();
        let mut errors: HashMap<&str, &str> = HashMap::new();

        for event in events {
            if event.test.is_empty() {
                continue;
            }
            if !locations.contains_key(event.test.as_str()) {
                if let Some(file_name) = self.location_file_name(&event.output) {
                    locations.insert(&event.test, file_name);
                }
            }
            if !errors.contains_key(event.test.as_str()) {
                if let Some(message) = error_message(&event.output) {
                    errors.insert(&event.test, message);
                }
            }
        }

        let mut index = FailureIndex::new();
        let mut fail_markers = 0usize;
        for event in events.iter().filter(|e| e.is_fail_marker()) {
            fail_markers += 1;
            let Some(file_name) = locations.get(event.test.as_str()) else {
                debug!(test = %event.test, "dropping failure with no source location");
                continue;
            };
            let test_error = errors.get(event.test.as_str()).copied().unwrap_or("");
            index.push(file_name.as_str(), FailingTest::new(&event.test, test_error));
        }

        info!(
            events = events.len(),
            fail_markers,
            failing_tests = index.test_count(),
            files = index.file_count(),
            "correlated test failures"
        );
        index
    }
}

/// Correlate a Go event stream with the default `.go:` location marker
pub fn correlate(events: &[TestEvent]) -> FailureIndex {
    Correlator::default().correlate(events)
}

/// Text after the first `": "` of an output line, without its line terminator
fn error_message(output: &str) -> Option<&str> {
    let start = output.find(": ")? + 2;
    Some(output[start..].trim_end_matches(['\n', '\r']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::parse_events_str;

    fn event(action: &str, test: &str, output: &str) -> TestEvent {
        TestEvent {
            action: action.to_string(),
            test: test.to_string(),
            output: output.to_string(),
            package: "github.com/acme/example".to_string(),
        }
    }

    #[test]
    fn test_divide_subtest_failure_is_attributed() {
        let feed = concat!(
            r#"{"Action":"run","Package":"example","Test":"Test_divide"}"#, "\n",
            r#"{"Action":"output","Package":"example","Test":"Test_divide","Output":"=== RUN   Test_divide\n"}"#, "\n",
            r#"{"Action":"run","Package":"example","Test":"Test_divide/1_/_2_=_0"}"#, "\n",
            r#"{"Action":"output","Package":"example","Test":"Test_divide/1_/_2_=_0","Output":"=== RUN   Test_divide/1_/_2_=_0\n"}"#, "\n",
            r#"{"Action":"output","Package":"example","Test":"Test_divide/1_/_2_=_0","Output":"    example_test.go:55: divide() = -2, want 0\n"}"#, "\n",
            r#"{"Action":"output","Package":"example","Test":"Test_divide/1_/_2_=_0","Output":"    --- FAIL: Test_divide/1_/_2_=_0 (0.00s)\n"}"#, "\n",
            r#"{"Action":"fail","Package":"example","Test":"Test_divide/1_/_2_=_0","Elapsed":0}"#, "\n",
            r#"{"Action":"output","Package":"example","Test":"Test_divide","Output":"--- FAIL: Test_divide (0.00s)\n"}"#, "\n",
            r#"{"Action":"fail","Package":"example","Test":"Test_divide","Elapsed":0}"#, "\n",
            r#"{"Action":"output","Package":"example","Output":"FAIL\n"}"#, "\n",
            r#"{"Action":"fail","Package":"example","Elapsed":0.202}"#, "\n",
        );
        let events = parse_events_str(feed).unwrap();

        let index = correlate(&events);

        assert_eq!(index.file_count(), 1);
        let tests = index.get(Path::new("example_test.go")).unwrap();
        assert_eq!(
            tests,
            &[FailingTest {
                test_name: "Test_divide".to_string(),
                full_test_name: "Test_divide/1_/_2_=_0".to_string(),
                test_error: "divide() = -2, want 0".to_string(),
            }]
        );
    }

    #[test]
    fn test_failure_without_location_is_dropped() {
        let events = vec![
            event("output", "Test_panics", "panic: runtime error\n"),
            event("fail", "Test_panics", ""),
        ];

        let index = correlate(&events);
        assert!(index.is_empty());
        assert_eq!(index.test_count(), 0);
    }

    #[test]
    fn test_duplicate_fail_markers_are_preserved() {
        let events = vec![
            event("output", "Test_add", "    example_test.go:12: add() = 4, want 3\n"),
            event("fail", "Test_add", ""),
            event("fail", "Test_add", ""),
        ];

        let index = correlate(&events);
        let tests = index.get(Path::new("example_test.go")).unwrap();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0], tests[1]);
    }

    #[test]
    fn test_location_may_follow_fail_marker() {
        let events = vec![
            event("fail", "Test_late", ""),
            event("output", "Test_late", "\tlate_test.go:3: boom\n"),
        ];

        let index = correlate(&events);
        let tests = index.get(Path::new("late_test.go")).unwrap();
        assert_eq!(tests[0].test_error, "boom");
    }

    #[test]
    fn test_first_location_and_first_error_win() {
        let events = vec![
            event("output", "Test_x", "=== RUN   Test_x\n"),
            event("output", "Test_x", "    a_test.go:1: first: detail\n"),
            event("output", "Test_x", "    b_test.go:2: second\n"),
            event("fail", "Test_x", ""),
        ];

        let index = correlate(&events);
        assert_eq!(index.files().collect::<Vec<_>>(), vec![Path::new("a_test.go")]);
        assert_eq!(
            index.get(Path::new("a_test.go")).unwrap()[0].test_error,
            "first: detail"
        );
    }

    #[test]
    fn test_error_is_empty_without_separator() {
        let events = vec![
            event("output", "Test_y", "y_test.go:9:\n"),
            event("fail", "Test_y", ""),
        ];

        let index = correlate(&events);
        assert_eq!(index.get(Path::new("y_test.go")).unwrap()[0].test_error, "");
    }

    #[test]
    fn test_outputs_of_other_tests_are_not_borrowed() {
        let events = vec![
            event("output", "Test_other", "    other_test.go:4: nope\n"),
            event("fail", "Test_mine", ""),
        ];

        assert!(correlate(&events).is_empty());
    }

    #[test]
    fn test_files_keep_first_occurrence_order() {
        let events = vec![
            event("output", "Test_b", "b_test.go:1: b\n"),
            event("output", "Test_a", "a_test.go:1: a\n"),
            event("output", "Test_a2", "a_test.go:7: a2\n"),
            event("fail", "Test_b", ""),
            event("fail", "Test_a", ""),
            event("fail", "Test_a2", ""),
        ];

        let index = correlate(&events);
        let files: Vec<_> = index.files().collect();
        assert_eq!(files, vec![Path::new("b_test.go"), Path::new("a_test.go")]);
        assert_eq!(index.get(Path::new("a_test.go")).unwrap().len(), 2);
    }

    #[test]
    fn test_indexed_count_matches_locatable_fail_markers() {
        let events = vec![
            event("output", "Test_a", "a_test.go:1: a\n"),
            event("output", "Test_b/sub", "b_test.go:2: b\n"),
            event("fail", "Test_a", ""),
            event("fail", "Test_b/sub", ""),
            event("fail", "Test_b", ""),
            event("fail", "Test_c", ""),
            event("fail", "", ""),
        ];

        let index = correlate(&events);
        let locatable = events
            .iter()
            .filter(|e| e.is_fail_marker())
            .filter(|e| {
                events
                    .iter()
                    .any(|o| o.test == e.test && o.output.contains(".go:"))
            })
            .count();
        assert_eq!(index.test_count(), locatable);
        assert_eq!(locatable, 2);
    }

    #[test]
    fn test_top_level_name_is_prefix_of_full_name() {
        for full in ["Test_a", "Test_a/sub", "Test_a/sub/deeper", "Test_a/"] {
            let test = FailingTest::new(full, "");
            assert!(full.starts_with(&test.test_name));
            assert!(!test.test_name.contains('/'));
            let rest = &full[test.test_name.len()..];
            assert!(rest.is_empty() || rest.starts_with('/'));
        }
        assert!(FailingTest::new("Test_a/sub", "").is_subtest());
        assert!(!FailingTest::new("Test_a", "").is_subtest());
    }

    #[test]
    fn test_custom_extension_marker() {
        let correlator = Correlator::new("rs");
        assert_eq!(
            correlator.location_file_name("  lib.rs:10: boom"),
            Some("lib.rs".to_string())
        );
        assert_eq!(correlator.location_file_name("lib.go:10: boom"), None);
    }

    fn failure_at(test: &str, location: &str) -> [TestEvent; 2] {
        [
            event("output", test, &format!("    {location}: boom\n")),
            event("fail", test, ""),
        ]
    }

    #[test]
    fn test_resolve_merges_names_for_the_same_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("calc")).unwrap();
        std::fs::write(dir.path().join("calc/calc_test.go"), "package calc\n").unwrap();

        let mut events = Vec::new();
        events.extend(failure_at("Test_a", "calc_test.go:3"));
        events.extend(failure_at("Test_b", "calc/calc_test.go:5"));
        events.extend(failure_at("Test_c", "ghost_test.go:1"));
        let index = correlate(&events);
        assert_eq!(index.file_count(), 3);

        let locator = SourceLocator::new(dir.path());
        let slots = index.resolve_each(&locator);
        assert_eq!(slots.len(), 2);

        assert_eq!(slots[0].reported, PathBuf::from("calc_test.go"));
        let merged = slots[0].located.as_ref().unwrap();
        assert_eq!(merged.path, dir.path().join("calc/calc_test.go"));
        let names: Vec<_> = merged.tests.iter().map(|t| t.test_name.as_str()).collect();
        assert_eq!(names, vec!["Test_a", "Test_b"]);

        assert_eq!(slots[1].reported, PathBuf::from("ghost_test.go"));
        assert!(matches!(
            slots[1].located,
            Err(crate::error::TriageError::SourceNotFound { .. })
        ));

        assert!(index.resolve(&locator).is_err());
    }

    #[test]
    fn test_resolve_keys_index_by_real_path() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("calc")).unwrap();
        std::fs::write(dir.path().join("calc/calc_test.go"), "package calc\n").unwrap();

        let mut events = Vec::new();
        events.extend(failure_at("Test_a", "calc_test.go:3"));
        events.extend(failure_at("Test_b", "calc/calc_test.go:5"));
        events.extend(failure_at("Test_a", "calc_test.go:3"));
        let resolved = correlate(&events).resolve(&SourceLocator::new(dir.path())).unwrap();

        assert_eq!(resolved.file_count(), 1);
        assert_eq!(resolved.test_count(), 3);
        let real = dir.path().join("calc/calc_test.go");
        let names: Vec<_> = resolved.get(&real).unwrap().iter().map(|t| t.test_name.as_str()).collect();
        assert_eq!(names, vec!["Test_a", "Test_a", "Test_b"]);
    }
}
