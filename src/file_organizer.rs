/// Moving files into their category directories.
///
/// This module resolves collision-free destination names, creates category
/// directories on demand and relocates files, turning every per-file failure
/// into a logged [`MoveOutcome`] instead of an error for the caller.
use crate::output::OutputFormatter;
use crate::rules::RuleSet;
use crate::run_log::RunLog;
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors that can occur while relocating a single file.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// Failed to create a category directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to move a file to its category directory.
    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OrganizeError {
    /// Destination path the failed move was aiming for, once a name was resolved.
    pub fn attempted_destination(&self) -> Option<&Path> {
        match self {
            Self::DirectoryCreationFailed { .. } => None,
            Self::FileMoveFailure { to, .. } => Some(to),
        }
    }
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// What happened to one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Name of the file in the source directory.
    pub file_name: String,
    /// Category the file was classified into.
    pub category: String,
    /// Resolved destination path; also kept on failure once a name was resolved.
    pub destination: Option<PathBuf>,
    /// Error detail when the move failed.
    pub error: Option<String>,
}

impl MoveOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Returns a name that does not exist in `dest_dir`.
///
/// `desired` is returned unchanged when free; otherwise `base_1.ext`,
/// `base_2.ext`, ... are tried in order. Only the extension after the last
/// dot is kept apart, and a leading dot does not start an extension.
///
/// # Examples
///
/// ```
/// use dropsort::file_organizer::resolve_unique_name;
///
/// let dir = tempfile::tempdir().unwrap();
/// assert_eq!(resolve_unique_name(dir.path(), "x.jpg"), "x.jpg");
///
/// std::fs::write(dir.path().join("x.jpg"), b"").unwrap();
/// assert_eq!(resolve_unique_name(dir.path(), "x.jpg"), "x_1.jpg");
/// ```
pub fn resolve_unique_name(dest_dir: &Path, desired: &str) -> String {
    if !entry_exists(&dest_dir.join(desired)) {
        return desired.to_string();
    }

    let desired_path = Path::new(desired);
    let base = desired_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| desired.to_string());
    let extension = desired_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|counter| format!("{}_{}{}", base, counter, extension))
        .find(|candidate| !entry_exists(&dest_dir.join(candidate)))
        .unwrap_or_else(|| desired.to_string())
}

/// True for anything occupying `path`, dangling symlinks included.
fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Renames `from` to `to`, copying across filesystems when a rename cannot.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), "rename crosses devices, copying");
            copy_then_remove(from, to)
        }
        other => other,
    }
}

/// Copies `from` to `to` and removes `from`.
///
/// On any failure `to` is removed again, so no partial copy is left in the
/// category folder and `from` stays the only copy.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let moved = fs::copy(from, to).and_then(|_| fs::remove_file(from));
    if moved.is_err() {
        let _ = fs::remove_file(to);
    }
    moved
}

/// One lock per destination directory.
///
/// Holding a directory's lock while resolving a name and moving into it
/// keeps two workers of the same run from picking the same free name.
#[derive(Debug, Default)]
pub struct DirLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirLocks {
    pub fn for_dir(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(dir.to_path_buf()).or_default())
    }
}

/// Moves files from a source directory into category folders under a
/// target root.
///
/// Shared by reference across the batch's workers.
pub struct FileOrganizer<'a> {
    rules: &'a RuleSet,
    target_root: PathBuf,
    log: &'a RunLog,
    locks: DirLocks,
}

impl<'a> FileOrganizer<'a> {
    pub fn new(rules: &'a RuleSet, target_root: impl Into<PathBuf>, log: &'a RunLog) -> Self {
        Self {
            rules,
            target_root: target_root.into(),
            log,
            locks: DirLocks::default(),
        }
    }

    pub fn rules(&self) -> &'a RuleSet {
        self.rules
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Sorts one file of `source_dir` into its category folder.
    ///
    /// Returns `None` without logging when `file_name` is not a regular file
    /// (a directory, or gone since the listing). Otherwise the outcome has
    /// already been written to the run log and echoed to the console; a
    /// failed move never escapes as an error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dropsort::file_organizer::FileOrganizer;
    /// use dropsort::rules::RuleSet;
    /// use dropsort::run_log::RunLog;
    /// use std::path::Path;
    ///
    /// let rules = RuleSet::default();
    /// let log = RunLog::discard();
    /// let organizer = FileOrganizer::new(&rules, "/data/sorted", &log);
    ///
    /// if let Some(outcome) = organizer.move_one(Path::new("/data/inbox"), "photo.jpg") {
    ///     println!("{} -> {}", outcome.file_name, outcome.category);
    /// }
    /// ```
    pub fn move_one(&self, source_dir: &Path, file_name: &str) -> Option<MoveOutcome> {
        let source = source_dir.join(file_name);
        match fs::metadata(&source) {
            Ok(metadata) if metadata.is_file() => {}
            _ => {
                tracing::debug!(file = file_name, "not a regular file, skipping");
                return None;
            }
        }

        let category = self.rules.classify(file_name);
        tracing::debug!(file = file_name, category, "classified");

        let outcome = match self.relocate(&source, category, file_name) {
            Ok(destination) => {
                self.log.info(&format!("Moved: {} → {}", file_name, category));
                OutputFormatter::success(&format!("{} → {}", file_name, category));
                MoveOutcome {
                    file_name: file_name.to_string(),
                    category: category.to_string(),
                    destination: Some(destination),
                    error: None,
                }
            }
            Err(e) => {
                self.log.error(&format!("Failed to move {}: {}", file_name, e));
                OutputFormatter::error(&format!("Failed: {}", file_name));
                MoveOutcome {
                    file_name: file_name.to_string(),
                    category: category.to_string(),
                    destination: e.attempted_destination().map(Path::to_path_buf),
                    error: Some(e.to_string()),
                }
            }
        };

        Some(outcome)
    }

    fn relocate(&self, source: &Path, category: &str, file_name: &str) -> OrganizeResult<PathBuf> {
        let category_path = self.target_root.join(category);

        fs::create_dir_all(&category_path).map_err(|source| {
            OrganizeError::DirectoryCreationFailed {
                path: category_path.clone(),
                source,
            }
        })?;

        let lock = self.locks.for_dir(&category_path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let unique_name = resolve_unique_name(&category_path, file_name);
        if unique_name != file_name {
            tracing::debug!(file = file_name, renamed = %unique_name, "name taken in destination");
        }
        let destination = category_path.join(unique_name);

        move_file(source, &destination).map_err(|e| OrganizeError::FileMoveFailure {
            from: source.to_path_buf(),
            to: destination.clone(),
            source: e,
        })?;

        Ok(destination)
    }
}
