use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{SearchError, SearchResult};

/// How lines are matched against the search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    CaseSensitive,
    CaseInsensitive,
    Regex,
}

/// Where candidate files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Recursive directory walk below the root.
    AllFiles(PathBuf),
    /// The files `git ls-files` reports, resolved against the root.
    GitFiles(PathBuf),
}

impl FileSource {
    pub fn root(&self) -> &Path {
        match self {
            FileSource::AllFiles(root) | FileSource::GitFiles(root) => root,
        }
    }
}

/// How match blocks are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Piped,
    Html,
}

/// Immutable configuration for one search invocation, shared read-only with
/// the workers.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// The search needle.
    pub term: String,
    pub mode: SearchMode,
    pub source: FileSource,
    pub output: OutputFormat,
    /// Worker count, defaulting to `min(hardware_parallelism, 8)`.
    pub threads: NonZeroUsize,
    /// Whether the Pretty printer may emit color escapes.
    pub colors_enabled: bool,
}

impl SearchOptions {
    pub fn new(term: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        SearchOptions {
            term: term.into(),
            mode: SearchMode::CaseSensitive,
            source: FileSource::AllFiles(root.into()),
            output: OutputFormat::Pretty,
            threads: default_thread_count(),
            colors_enabled: false,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_source(mut self, source: FileSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn with_threads(mut self, threads: NonZeroUsize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.colors_enabled = enabled;
        self
    }
}

pub fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get().clamp(1, 8)).unwrap_or(NonZeroUsize::MIN)
}

/// Defaults read from an optional YAML config file, applied beneath CLI
/// flags.
///
/// Locations in order of precedence:
/// 1. A file passed explicitly via `--config`
/// 2. Local `.srcgrep.yaml` in the current directory
/// 3. Global `$CONFIG_DIR/srcgrep/config.yaml`
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub threads: Option<NonZeroUsize>,

    #[serde(default)]
    pub no_color: bool,

    #[serde(default)]
    pub git: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            threads: None,
            no_color: false,
            git: false,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl ConfigFile {
    /// Loads and merges the config file locations; absent files are fine.
    pub fn load(explicit: Option<&Path>) -> SearchResult<Self> {
        let mut builder = config::Config::builder();

        let candidates = [
            dirs::config_dir().map(|dir| dir.join("srcgrep/config.yaml")),
            Some(PathBuf::from(".srcgrep.yaml")),
            explicit.map(PathBuf::from),
        ];

        let mut found_any = false;
        for path in candidates.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(config::File::from(path.as_path()));
                found_any = true;
            } else if explicit == Some(path.as_path()) {
                return Err(SearchError::config_error(format!(
                    "config file '{}' does not exist",
                    path.display()
                )));
            }
        }

        if !found_any {
            return Ok(ConfigFile::default());
        }

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|err| SearchError::config_error(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_thread_count_bounds() {
        let threads = default_thread_count().get();
        assert!((1..=8).contains(&threads));
    }

    #[test]
    fn test_options_builders() {
        let options = SearchOptions::new("needle", ".")
            .with_mode(SearchMode::Regex)
            .with_output(OutputFormat::Piped)
            .with_colors(true);
        assert_eq!(options.mode, SearchMode::Regex);
        assert_eq!(options.output, OutputFormat::Piped);
        assert!(options.colors_enabled);
        assert_eq!(options.source.root(), Path::new("."));
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"threads: 4\nno_color: true\nlog_level: debug\n")
            .unwrap();

        let cfg = ConfigFile::load(Some(&path)).unwrap();
        assert_eq!(cfg.threads, NonZeroUsize::new(4));
        assert!(cfg.no_color);
        assert!(!cfg.git);
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn test_load_missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let result = ConfigFile::load(Some(&dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "threads: \"not a number\"\n").unwrap();
        assert!(ConfigFile::load(Some(&path)).is_err());
    }
}
