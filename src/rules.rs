//! Category rules and extension-based classification.
//!
//! A [`RuleSet`] is an ordered list of category labels, each owning a list of
//! extension suffixes such as `".jpg"`. Classification walks the labels in
//! order and returns the first one whose suffix list matches the file name,
//! falling back to the catch-all category.
//!
//! # Examples
//!
//! ```
//! use dropsort::rules::RuleSet;
//!
//! let rules = RuleSet::default();
//! assert_eq!(rules.classify("holiday.JPG"), "Images");
//! assert_eq!(rules.classify("setup.exe"), "Installers");
//! assert_eq!(rules.classify("notes.xyz"), "Other");
//! ```
//!
//! # Rules File Format
//!
//! ```json
//! {
//!   "Images": [".jpg", ".png"],
//!   "Documents": [".pdf"],
//!   "Other": []
//! }
//! ```

use crate::config::ConfigError;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Default name of the rules file, resolved against the working directory.
pub const DEFAULT_RULES_FILE: &str = "extensions.json";

/// Label used for the catch-all category when the rules file names none.
pub const DEFAULT_CATCH_ALL: &str = "Other";

/// One category label and the extension suffixes that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    /// Directory name the category's files are moved into.
    pub label: String,
    /// Lowercase suffixes, each starting with `.`.
    pub extensions: Vec<String>,
}

/// Ordered, immutable mapping from category label to extension suffixes.
///
/// Built once at startup and shared by reference with every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<CategoryRule>,
    catch_all: usize,
}

impl RuleSet {
    /// Builds a rule set from `(label, extensions)` pairs, keeping their order.
    ///
    /// Extensions are lowercased and given a leading dot when it is missing,
    /// so matching is case-insensitive on both sides. The first category with
    /// no extensions becomes the catch-all; if there is none, the category
    /// labelled `Other` is used, and if that is absent too an empty `Other`
    /// category is appended.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate or unusable labels and for empty
    /// extension strings.
    pub fn new<I, L, E>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (L, Vec<E>)>,
        L: Into<String>,
        E: AsRef<str>,
    {
        let mut rules = Vec::new();
        let mut seen = HashSet::new();

        for (label, extensions) in entries {
            let label = label.into();
            validate_label(&label)?;
            if !seen.insert(label.clone()) {
                return Err(ConfigError::DuplicateLabel(label));
            }

            let extensions = extensions
                .iter()
                .map(|ext| normalize_extension(&label, ext.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;

            rules.push(CategoryRule { label, extensions });
        }

        let catch_all = match rules.iter().position(|rule| rule.extensions.is_empty()) {
            Some(index) => index,
            None => match rules.iter().position(|rule| rule.label == DEFAULT_CATCH_ALL) {
                Some(index) => index,
                None => {
                    rules.push(CategoryRule {
                        label: DEFAULT_CATCH_ALL.to_string(),
                        extensions: Vec::new(),
                    });
                    rules.len() - 1
                }
            },
        };

        Ok(Self { rules, catch_all })
    }

    /// Loads the rule set from a JSON rules file, or the built-in default
    /// when no file exists at `path`.
    ///
    /// A file that exists but cannot be read or parsed is an error; there is
    /// no silent fallback to the defaults in that case.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Invalid` if it is not an object of string arrays.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no rules file, using built-in categories");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content).map_err(|e| match e {
            ConfigError::Syntax(reason) => ConfigError::Invalid {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parses a rules document; label order in the document is preserved.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Syntax` for malformed JSON or a wrong shape.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let document: Map<String, Value> =
            serde_json::from_str(content).map_err(|e| ConfigError::Syntax(e.to_string()))?;

        let mut entries = Vec::with_capacity(document.len());
        for (label, value) in document {
            let extensions: Vec<String> = serde_json::from_value(value).map_err(|e| {
                ConfigError::Syntax(format!("category '{}' must list extensions: {}", label, e))
            })?;
            entries.push((label, extensions));
        }

        Self::new(entries)
    }

    /// Returns the category label for a file name.
    ///
    /// Never fails: names matching no category get the catch-all label.
    pub fn classify(&self, file_name: &str) -> &str {
        let lowered = file_name.to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.extensions.iter().any(|ext| lowered.ends_with(ext.as_str())))
            .map(|rule| rule.label.as_str())
            .unwrap_or_else(|| self.catch_all())
    }

    /// Label of the catch-all category.
    pub fn catch_all(&self) -> &str {
        &self.rules[self.catch_all].label
    }

    /// Iterates over the rules in classification order.
    pub fn iter(&self) -> impl Iterator<Item = &CategoryRule> {
        self.rules.iter()
    }

    /// Extensions registered for `label`, if the category exists.
    pub fn extensions(&self, label: &str) -> Option<&[String]> {
        self.rules
            .iter()
            .find(|rule| rule.label == label)
            .map(|rule| rule.extensions.as_slice())
    }

    /// Renders the rule set in the rules file format.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let document: Map<String, Value> = self
            .rules
            .iter()
            .map(|rule| {
                let extensions = rule.extensions.iter().cloned().map(Value::String).collect();
                (rule.label.clone(), Value::Array(extensions))
            })
            .collect();

        serde_json::to_string_pretty(&document)
    }
}

impl Default for RuleSet {
    /// The nine built-in categories.
    fn default() -> Self {
        let entries: [(&str, Vec<&str>); 9] = [
            ("Images", vec![".jpg", ".png", ".jpeg", ".gif"]),
            ("Video", vec![".mp4", ".mkv"]),
            ("Music", vec![".mp3", ".wav"]),
            ("Archives", vec![".zip", ".tgz", ".rar", ".tar"]),
            (
                "Documents",
                vec![".pdf", ".docx", ".csv", ".xlsx", ".pptx", ".doc", ".ppt", ".xls"],
            ),
            ("Installers", vec![".msi", ".exe"]),
            ("Programs", vec![".py", ".c", ".cpp", ".php"]),
            ("Design", vec![".xd", ".psd"]),
            (DEFAULT_CATCH_ALL, vec![]),
        ];

        let rules = entries
            .into_iter()
            .map(|(label, extensions)| CategoryRule {
                label: label.to_string(),
                extensions: extensions.into_iter().map(str::to_string).collect(),
            })
            .collect::<Vec<_>>();
        let catch_all = rules.len() - 1;

        Self { rules, catch_all }
    }
}

/// Labels become directory names under the target root.
fn validate_label(label: &str) -> Result<(), ConfigError> {
    let unusable = label.trim().is_empty()
        || label == "."
        || label == ".."
        || label.contains(['/', '\\']);

    if unusable {
        return Err(ConfigError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

fn normalize_extension(label: &str, ext: &str) -> Result<String, ConfigError> {
    let trimmed = ext.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Err(ConfigError::InvalidExtension {
            label: label.to_string(),
            extension: ext.to_string(),
        });
    }

    let lowered = trimmed.to_lowercase();
    if lowered.starts_with('.') {
        Ok(lowered)
    } else {
        Ok(format!(".{}", lowered))
    }
}
