//! Source file lookup within the project tree
//!
//! `go test` reports locations as bare file names relative to the package
//! directory, so the real path has to be recovered by walking the tree.

use crate::error::{Result, TriageError};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into unless configured otherwise
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[".git", "node_modules", ".idea", ".vscode"];

/// Recursive, deterministic file lookup under a root directory
#[derive(Debug, Clone)]
pub struct SourceLocator {
    root: PathBuf,
    ignore_dirs: Vec<String>,
}

impl SourceLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_dirs: DEFAULT_IGNORED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn with_ignore_dirs(mut self, ignore_dirs: Vec<String>) -> Self {
        self.ignore_dirs = ignore_dirs;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.ignore_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    /// Return the first file whose trailing path components equal
    /// `file_name`, walking the tree in lexicographic order.
    ///
    /// A bare name matches on base name exactly; there is no fuzzy fallback.
    pub fn locate(&self, file_name: &str) -> Result<PathBuf> {
        let wanted = Path::new(file_name);
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(TriageError::Walk {
                        root: self.root.clone(),
                        source: err,
                    });
                }
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_file() && entry.path().ends_with(wanted) {
                debug!(file_name, path = %entry.path().display(), "located source file");
                return Ok(entry.into_path());
            }
        }

        Err(TriageError::SourceNotFound {
            file_name: file_name.to_string(),
            root: self.root.clone(),
        })
    }
}

/// Locate `file_name` under `root` with the default ignore list
pub fn locate_source(file_name: &str, root: &Path) -> Result<PathBuf> {
    SourceLocator::new(root).locate(file_name)
}
