//! Configuration management for gofix
//!
//! Settings are layered: built-in defaults, then the user config at
//! `~/.config/gofix/config.toml`, then the project's `.gofix.toml` (or an
//! explicit `--config` file). Command-line flags are applied last by the
//! binary.

use crate::error::{Result, TriageError};
use crate::index::DEFAULT_TEST_PREFIX;
use crate::locate::DEFAULT_IGNORED_DIRS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the per-project config file, looked up in the project root
pub const PROJECT_CONFIG_FILE: &str = ".gofix.toml";

/// How bundles are rendered on stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per bundle
    #[default]
    Json,
    /// The repair prompt for each bundle
    Prompt,
    /// One line per bundle
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Name prefix that marks a function as a test
    pub test_prefix: String,
    /// Directory names skipped while locating source files
    pub ignore_dirs: Vec<String>,
    /// Keep processing remaining files after a fatal per-file error
    pub keep_going: bool,
    /// Process failing files on the rayon thread pool
    pub parallel: bool,
    /// Follow calls made by dependencies within the implementation file
    pub transitive: bool,
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test_prefix: DEFAULT_TEST_PREFIX.to_string(),
            ignore_dirs: DEFAULT_IGNORED_DIRS.iter().map(|d| d.to_string()).collect(),
            keep_going: false,
            parallel: false,
            transitive: false,
            format: OutputFormat::default(),
        }
    }
}

/// On-disk config layer; absent keys leave the lower layer untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    test_prefix: Option<String>,
    ignore_dirs: Option<Vec<String>>,
    keep_going: Option<bool>,
    parallel: Option<bool>,
    transitive: Option<bool>,
    format: Option<OutputFormat>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| TriageError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| TriageError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn apply(self, config: &mut Config) {
        if let Some(prefix) = self.test_prefix {
            config.test_prefix = prefix;
        }
        if let Some(dirs) = self.ignore_dirs {
            config.ignore_dirs = dirs;
        }
        if let Some(keep_going) = self.keep_going {
            config.keep_going = keep_going;
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if let Some(transitive) = self.transitive {
            config.transitive = transitive;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
    }
}

impl Config {
    /// Get the user config file path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gofix").join("config.toml"))
    }

    /// Load layered config for a project root.
    ///
    /// An explicit path must exist. Implicit layers are skipped when absent.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();
        if let Some(user) = Self::user_config_path() {
            layers.push(user);
        }
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(TriageError::Config {
                        path: path.to_path_buf(),
                        message: "config file does not exist".to_string(),
                    });
                }
                layers.push(path.to_path_buf());
            }
            None => layers.push(root.join(PROJECT_CONFIG_FILE)),
        }
        Self::from_layers(&layers)
    }

    /// Apply every existing file in `paths` over the defaults, in order
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Config::default();
        for path in paths.iter().filter(|p| p.is_file()) {
            debug!(path = %path.display(), "applying config layer");
            ConfigFile::read(path)?.apply(&mut config);
        }
        Ok(config)
    }
}
