//! Listing a source directory and sorting its files on a worker pool.

use crate::config::CompiledFilters;
use crate::file_organizer::{FileOrganizer, resolve_unique_name};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A file a dry run would move, and where it would land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub file_name: String,
    pub category: String,
    /// Name the file would get inside its category folder.
    pub destination_name: String,
}

/// Runs one pass over a source directory.
///
/// Each eligible entry is handed to the [`FileOrganizer`] exactly once, in
/// parallel on a fixed-size pool. Outcomes are logged by the organizer as
/// they happen; nothing is collected here.
pub struct BatchRunner<'a> {
    organizer: FileOrganizer<'a>,
    filters: CompiledFilters,
    protected: Vec<PathBuf>,
    pool: ThreadPool,
}

impl<'a> BatchRunner<'a> {
    /// Creates a runner with `workers` threads; 0 means one per available CPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be started.
    pub fn new(organizer: FileOrganizer<'a>, workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("dropsort-worker-{}", index))
            .build()?;

        Ok(Self {
            organizer,
            filters: CompiledFilters::default(),
            protected: Vec::new(),
            pool,
        })
    }

    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Never moves the file at `path`, even if it sits in the source directory.
    pub fn protect(mut self, path: &Path) -> Self {
        self.protected.push(canonical_or_joined(path));
        self
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Names of the immediate entries of `source_dir` that pass the filters.
    ///
    /// Not recursive. Whether an entry is a regular file is left to the
    /// organizer, which checks it right before moving.
    ///
    /// # Errors
    ///
    /// Returns an error if `source_dir` cannot be read.
    pub fn list_entries(&self, source_dir: &Path) -> io::Result<Vec<String>> {
        let canonical_source = fs::canonicalize(source_dir)?;
        let mut names = Vec::new();

        for entry in fs::read_dir(source_dir)?.flatten() {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(name = ?raw, "skipping entry with a non UTF-8 name");
                    continue;
                }
            };

            if self.protected.contains(&canonical_source.join(&name)) {
                tracing::debug!(file = %name, "protected, skipping");
                continue;
            }
            if !self.filters.should_include(&name) {
                tracing::debug!(file = %name, "excluded by filters");
                continue;
            }

            names.push(name);
        }

        Ok(names)
    }

    /// Sorts every eligible entry of `source_dir` and returns how many were
    /// dispatched.
    ///
    /// Per-file failures are logged by the organizer and do not stop the
    /// batch; only a failure to list `source_dir` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if `source_dir` cannot be read.
    pub fn run(&self, source_dir: &Path) -> io::Result<usize> {
        let names = self.list_entries(source_dir)?;
        tracing::debug!(
            entries = names.len(),
            workers = self.workers(),
            "dispatching batch"
        );

        self.pool.install(|| {
            names.par_iter().for_each(|name| {
                self.organizer.move_one(source_dir, name);
            });
        });

        Ok(names.len())
    }

    /// Computes what [`run`](Self::run) would do without touching anything.
    ///
    /// # Errors
    ///
    /// Returns an error if `source_dir` cannot be read.
    pub fn plan(&self, source_dir: &Path) -> io::Result<Vec<PlannedMove>> {
        let mut plan: Vec<PlannedMove> = self
            .list_entries(source_dir)?
            .into_iter()
            .filter(|name| {
                fs::metadata(source_dir.join(name))
                    .map(|metadata| metadata.is_file())
                    .unwrap_or(false)
            })
            .map(|file_name| {
                let category = self.organizer.rules().classify(&file_name).to_string();
                let destination_dir = self.organizer.target_root().join(&category);
                let destination_name = resolve_unique_name(&destination_dir, &file_name);
                PlannedMove {
                    file_name,
                    category,
                    destination_name,
                }
            })
            .collect();

        plan.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(plan)
    }
}

/// Canonical form of `path`, also for files that do not exist yet.
fn canonical_or_joined(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExcludeRules, FilterRules};
    use crate::rules::RuleSet;
    use crate::run_log::RunLog;
    use tempfile::TempDir;

    #[test]
    fn test_list_entries_is_not_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path();
        fs::write(source.join("a.txt"), "").unwrap();
        fs::create_dir(source.join("nested")).unwrap();
        fs::write(source.join("nested").join("b.txt"), "").unwrap();

        let rules = RuleSet::default();
        let log = RunLog::discard();
        let runner = BatchRunner::new(FileOrganizer::new(&rules, "/unused", &log), 1).unwrap();

        let mut names = runner.list_entries(source).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.txt", "nested"]);
    }

    #[test]
    fn test_list_entries_applies_filters_and_protection() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path();
        for name in ["keep.pdf", "movie.mkv.part", "sorting.log"] {
            fs::write(source.join(name), "").unwrap();
        }

        let filters = FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["*.part".to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
        .compile()
        .unwrap();

        let rules = RuleSet::default();
        let log = RunLog::discard();
        let runner = BatchRunner::new(FileOrganizer::new(&rules, "/unused", &log), 2)
            .unwrap()
            .with_filters(filters)
            .protect(&source.join("sorting.log"));

        assert_eq!(runner.list_entries(source).unwrap(), vec!["keep.pdf"]);
    }

    #[test]
    fn test_plan_does_not_touch_the_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in");
        let target = temp_dir.path().join("out");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("b.zip"), "").unwrap();
        fs::write(source.join("a.py"), "").unwrap();
        fs::create_dir(source.join("folder")).unwrap();

        let rules = RuleSet::default();
        let log = RunLog::discard();
        let runner = BatchRunner::new(FileOrganizer::new(&rules, &target, &log), 0).unwrap();

        let plan = runner.plan(&source).unwrap();

        assert_eq!(
            plan,
            vec![
                PlannedMove {
                    file_name: "a.py".to_string(),
                    category: "Programs".to_string(),
                    destination_name: "a.py".to_string(),
                },
                PlannedMove {
                    file_name: "b.zip".to_string(),
                    category: "Archives".to_string(),
                    destination_name: "b.zip".to_string(),
                },
            ]
        );
        assert!(!target.exists());
        assert!(source.join("a.py").exists());
    }

    #[test]
    fn test_zero_workers_uses_available_parallelism() {
        let rules = RuleSet::default();
        let log = RunLog::discard();
        let runner = BatchRunner::new(FileOrganizer::new(&rules, "/unused", &log), 0).unwrap();
        assert!(runner.workers() >= 1);

        let runner = BatchRunner::new(FileOrganizer::new(&rules, "/unused", &log), 3).unwrap();
        assert_eq!(runner.workers(), 3);
    }
}
