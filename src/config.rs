//! Run settings and file exclusion rules.
//!
//! Settings are read from an optional TOML file. Everything in it can be
//! overridden on the command line; anything left unset falls back to the
//! built-in defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! source_dir = "~/Downloads"
//! target_dir = "~/download-sorting"
//! rules_file = "extensions.json"
//! log_file = "file_sorting.log"
//! workers = 4
//!
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "desktop.ini"]
//! patterns = ["*.part", "*.crdownload"]
//! extensions = ["tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the settings file looked up in the working directory.
pub const LOCAL_SETTINGS_FILE: &str = ".dropsortrc.toml";

/// Errors raised while loading settings, rules, or filters.
///
/// All of them are fatal: the run stops before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A file exists but its content is not valid.
    #[error("invalid configuration in {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    /// Content is malformed; not yet tied to a file.
    #[error("invalid configuration: {0}")]
    Syntax(String),

    /// IO error while reading configuration.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Category label that cannot be used as a directory name.
    #[error("invalid category label '{0}'")]
    InvalidLabel(String),

    /// Same category label listed twice.
    #[error("duplicate category label '{0}'")]
    DuplicateLabel(String),

    /// Empty or dot-only extension in a category.
    #[error("invalid extension '{extension}' in category '{label}'")]
    InvalidExtension { label: String, extension: String },

    /// Invalid glob pattern provided.
    #[error("invalid glob pattern '{0}': expected something like *.part")]
    InvalidGlobPattern(String),

    /// Invalid regex pattern provided with the actual error reason.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
}

/// Settings for a sorting run, deserialized from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory whose files are sorted.
    pub source_dir: Option<PathBuf>,
    /// Root under which category folders are created.
    pub target_dir: Option<PathBuf>,
    /// JSON rules file; `extensions.json` when unset.
    pub rules_file: Option<PathBuf>,
    /// Append-only run log; `file_sorting.log` when unset.
    pub log_file: Option<PathBuf>,
    /// Worker threads; 0 or unset uses available parallelism.
    pub workers: Option<usize>,
    pub filters: FilterRules,
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether files starting with "." are sorted. Defaults to true.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_enable_hidden_files() -> bool {
    true
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for leaving files where they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "desktop.ini").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.part").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude, without the dot (e.g., "tmp").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude (for advanced users).
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Settings {
    /// Load settings from a file, with fallback to defaults.
    ///
    /// Attempts to load settings in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.dropsortrc.toml` in the current directory
    /// 3. Look for `dropsort/config.toml` in the user config directory
    /// 4. Fall back to default settings
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly provided file is missing, or if any
    /// file found cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local = PathBuf::from(LOCAL_SETTINGS_FILE);
        if local.exists() {
            return Self::load_from_file(&local);
        }

        if let Some(user) = dirs::config_dir().map(|dir| dir.join("dropsort").join("config.toml"))
            && user.exists()
        {
            return Self::load_from_file(&user);
        }

        Ok(Self::default())
    }

    /// Load settings from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if file does not exist.
    /// Returns `ConfigError::Invalid` if TOML parsing fails.
    /// Returns `ConfigError::Io` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut settings: Self = toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.expand_home_dirs();

        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    fn expand_home_dirs(&mut self) {
        for slot in [
            &mut self.source_dir,
            &mut self.target_dir,
            &mut self.rules_file,
            &mut self.log_file,
        ] {
            if let Some(path) = slot.take() {
                *slot = Some(expand_home(path));
            }
        }
    }
}

/// Replaces a leading `~` with the user's home directory.
pub fn expand_home(path: PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path,
    }
}

impl FilterRules {
    /// Compile rules into optimized filter structures for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

/// Compiled filter structures, built once per run.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file in the source directory should be sorted.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_name: &str) -> bool {
        if self.include_patterns.iter().any(|p| p.matches(file_name)) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name) {
            return false;
        }

        if let Some(ext) = Path::new(file_name).extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.exclude_patterns.iter().any(|p| p.matches(file_name)) {
            return false;
        }

        !self.exclude_regexes.iter().any(|re| re.is_match(file_name))
    }
}

impl Default for CompiledFilters {
    /// Filters that let every file through.
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules_with(exclude: ExcludeRules) -> FilterRules {
        FilterRules {
            enable_hidden_files: true,
            exclude,
            include: IncludeRules::default(),
        }
    }

    #[test]
    fn test_default_filters_include_everything() {
        let compiled = FilterRules::default().compile().unwrap();

        assert!(compiled.should_include(".DS_Store"));
        assert!(compiled.should_include("image.jpg"));
        assert!(compiled.should_include("no_extension"));
    }

    #[test]
    fn test_hidden_file_excluded_when_disabled() {
        let rules = FilterRules {
            enable_hidden_files: false,
            ..FilterRules::default()
        };
        let compiled = rules.compile().unwrap();

        assert!(!compiled.should_include(".DS_Store"));
        assert!(compiled.should_include("visible.txt"));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let compiled = rules_with(ExcludeRules {
            filenames: vec!["desktop.ini".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include("desktop.ini"));
        assert!(compiled.should_include("image.jpg"));
    }

    #[test]
    fn test_exclude_extensions() {
        let compiled = rules_with(ExcludeRules {
            extensions: vec!["part".to_string(), ".tmp".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include("movie.mkv.part"));
        assert!(!compiled.should_include("file.TMP")); // Case-insensitive
        assert!(compiled.should_include("file.txt"));
    }

    #[test]
    fn test_exclude_glob_patterns() {
        let compiled = rules_with(ExcludeRules {
            patterns: vec!["*.crdownload".to_string(), "file?.txt".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include("setup.exe.crdownload"));
        assert!(!compiled.should_include("file1.txt"));
        assert!(compiled.should_include("file12.txt"));
    }

    #[test]
    fn test_exclude_regex() {
        let compiled = rules_with(ExcludeRules {
            regex: vec![r"^~\$.*".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include("~$report.docx"));
        assert!(compiled.should_include("report.docx"));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let rules = FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                extensions: vec!["tmp".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec!["keep*".to_string(), ".important".to_string()],
            },
        };
        let compiled = rules.compile().unwrap();

        assert!(compiled.should_include("keep.tmp"));
        assert!(compiled.should_include(".important"));
        assert!(!compiled.should_include("drop.tmp"));
        assert!(!compiled.should_include(".other"));
    }

    #[test]
    fn test_invalid_patterns_return_error() {
        let bad_regex = rules_with(ExcludeRules {
            regex: vec!["[invalid(".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = rules_with(ExcludeRules {
            patterns: vec!["[invalid".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }

    #[test]
    fn test_load_settings_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
source_dir = "/data/inbox"
workers = 3

[filters.exclude]
patterns = ["*.part"]
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.source_dir, Some(PathBuf::from("/data/inbox")));
        assert_eq!(settings.target_dir, None);
        assert_eq!(settings.workers, Some(3));
        assert!(settings.filters.enable_hidden_files);
        assert_eq!(settings.filters.exclude.patterns, vec!["*.part"]);
    }

    #[test]
    fn test_explicit_settings_file_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");

        assert!(matches!(
            Settings::load(Some(missing.as_path())),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_malformed_settings_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "workers = \"many\"").unwrap();

        assert!(matches!(
            Settings::load(Some(path.as_path())),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_expand_home() {
        let plain = PathBuf::from("/tmp/inbox");
        assert_eq!(expand_home(plain.clone()), plain);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(PathBuf::from("~/Downloads")), home.join("Downloads"));
        }
    }
}
