//! Command-line interface module for dropsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and merging with the settings file
//! - Loading the category rules and filters
//! - Running a sort, a dry run, or printing the rules

use crate::batch::BatchRunner;
use crate::config::{ConfigError, FilterRules, Settings};
use crate::file_organizer::FileOrganizer;
use crate::output::OutputFormatter;
use crate::rules::{DEFAULT_RULES_FILE, RuleSet};
use crate::run_log::{DEFAULT_LOG_FILE, RunLog};
use clap::{ArgAction, Parser};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Folder created next to the source directory when no target is given.
pub const DEFAULT_TARGET_DIR: &str = "download-sorting";

/// dropsort - sort a downloads folder into category subdirectories
///
/// Every file directly inside SOURCE is moved to TARGET/<category>/, where
/// the category is picked by file extension.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "dropsort")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory whose files are sorted
    ///
    /// Defaults to the settings file, then to the user's download directory.
    pub source: Option<PathBuf>,

    /// Root directory for the category folders
    ///
    /// Defaults to a "download-sorting" folder next to the source directory.
    #[arg(short = 't', long = "target")]
    pub target: Option<PathBuf>,

    /// JSON file mapping categories to extensions [default: extensions.json]
    #[arg(short = 'r', long = "rules")]
    pub rules: Option<PathBuf>,

    /// Append-only log of moves [default: file_sorting.log]
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads (0 = one per CPU)
    #[arg(short = 'j', long = "workers")]
    pub workers: Option<usize>,

    /// TOML settings file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Show where files would go without moving anything
    #[arg(short = 'n', long = "dry-run", action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Print the effective category rules as JSON and exit
    #[arg(long = "print-rules", action = ArgAction::SetTrue)]
    pub print_rules: bool,

    /// Increase diagnostic output on stderr (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// The command these arguments ask for.
    pub fn command(&self) -> OrganizeCommand {
        if self.print_rules {
            OrganizeCommand::PrintRules
        } else {
            OrganizeCommand::Organize {
                dry_run: self.dry_run,
            }
        }
    }
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Sort the source directory.
    Organize {
        /// If true, simulate the operation without making changes.
        dry_run: bool,
    },
    /// Print the rule set in rules file format.
    PrintRules,
}

/// Startup failures. Any of these stops the run before a file is moved.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no source directory given and no download directory found")]
    NoSourceDir,

    #[error("source directory {} does not exist or is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read source directory {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open log file {}: {source}", .path.display())]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("cannot render rules: {0}")]
    RenderRules(#[from] serde_json::Error),
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub rules_file: PathBuf,
    pub log_file: PathBuf,
    pub workers: usize,
    pub filters: FilterRules,
}

impl RunOptions {
    /// Options for sorting `source_dir` with every other setting at its default.
    pub fn for_source(source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        Self {
            target_dir: default_target_dir(&source_dir),
            source_dir,
            rules_file: PathBuf::from(DEFAULT_RULES_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            workers: 0,
            filters: FilterRules::default(),
        }
    }

    /// Merges command-line arguments over the settings file.
    ///
    /// # Errors
    ///
    /// Returns `CliError::NoSourceDir` when neither names a source directory
    /// and the platform has no download directory.
    pub fn resolve(args: &Args, settings: Settings) -> Result<Self, CliError> {
        let source_dir = args
            .source
            .clone()
            .or(settings.source_dir)
            .or_else(dirs::download_dir)
            .ok_or(CliError::NoSourceDir)?;

        let target_dir = args
            .target
            .clone()
            .or(settings.target_dir)
            .unwrap_or_else(|| default_target_dir(&source_dir));

        Ok(Self {
            source_dir,
            target_dir,
            rules_file: args
                .rules
                .clone()
                .or(settings.rules_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_FILE)),
            log_file: args
                .log_file
                .clone()
                .or(settings.log_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            workers: args.workers.or(settings.workers).unwrap_or(0),
            filters: settings.filters,
        })
    }
}

/// `download-sorting` next to `source_dir`.
pub fn default_target_dir(source_dir: &Path) -> PathBuf {
    match fs::canonicalize(source_dir) {
        Ok(canonical) => match canonical.parent() {
            Some(parent) => parent.join(DEFAULT_TARGET_DIR),
            None => canonical.join(DEFAULT_TARGET_DIR),
        },
        Err(_) => source_dir.join("..").join(DEFAULT_TARGET_DIR),
    }
}

/// Runs the CLI application with the given command and options.
///
/// # Examples
///
/// ```no_run
/// use dropsort::cli::{run_cli, OrganizeCommand, RunOptions};
///
/// let options = RunOptions::for_source("/home/me/Downloads");
/// match run_cli(OrganizeCommand::Organize { dry_run: false }, &options) {
///     Ok(()) => println!("Sorting finished"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: OrganizeCommand, options: &RunOptions) -> Result<(), CliError> {
    match command {
        OrganizeCommand::Organize { dry_run: false } => organize_directory(options),
        OrganizeCommand::Organize { dry_run: true } => organize_directory_dry_run(options),
        OrganizeCommand::PrintRules => print_rules(options),
    }
}

/// Sorts every file of the source directory into the target.
///
/// This function:
/// 1. Loads the category rules and compiles the filters
/// 2. Checks the source directory and opens the run log
/// 3. Moves each eligible file on the worker pool, logging each outcome
///
/// Per-file failures are logged and echoed but do not make this fail.
pub fn organize_directory(options: &RunOptions) -> Result<(), CliError> {
    let rules = RuleSet::load(&options.rules_file)?;
    let filters = options.filters.compile()?;
    check_source_dir(&options.source_dir)?;

    let log = RunLog::open(&options.log_file).map_err(|source| CliError::LogOpen {
        path: options.log_file.clone(),
        source,
    })?;

    OutputFormatter::info(&format!(
        "Sorting {} into {}",
        options.source_dir.display(),
        options.target_dir.display()
    ));

    let organizer = FileOrganizer::new(&rules, &options.target_dir, &log);
    let runner = BatchRunner::new(organizer, options.workers)?
        .with_filters(filters)
        .protect(&options.log_file)
        .protect(&options.rules_file);

    let dispatched = runner
        .run(&options.source_dir)
        .map_err(|source| CliError::SourceUnreadable {
            path: options.source_dir.clone(),
            source,
        })?;

    if dispatched == 0 {
        OutputFormatter::info("No files found to sort.");
    }

    Ok(())
}

/// Shows where each file would go, plus a per-category summary, without
/// creating directories, moving files or writing the run log.
pub fn organize_directory_dry_run(options: &RunOptions) -> Result<(), CliError> {
    let rules = RuleSet::load(&options.rules_file)?;
    let filters = options.filters.compile()?;
    check_source_dir(&options.source_dir)?;

    OutputFormatter::dry_run_notice(&format!(
        "Analyzing contents of: {}",
        options.source_dir.display()
    ));

    let log = RunLog::discard();
    let organizer = FileOrganizer::new(&rules, &options.target_dir, &log);
    let runner = BatchRunner::new(organizer, 1)?
        .with_filters(filters)
        .protect(&options.log_file)
        .protect(&options.rules_file);

    let plan = runner
        .plan(&options.source_dir)
        .map_err(|source| CliError::SourceUnreadable {
            path: options.source_dir.clone(),
            source,
        })?;

    if plan.is_empty() {
        OutputFormatter::info("No files found to sort.");
        return Ok(());
    }

    let mut category_counts: HashMap<String, usize> = HashMap::new();
    for planned in &plan {
        if planned.destination_name == planned.file_name {
            println!(" - {} → {}/", planned.file_name, planned.category);
        } else {
            println!(
                " - {} → {}/{}",
                planned.file_name, planned.category, planned.destination_name
            );
        }
        *category_counts.entry(planned.category.clone()).or_insert(0) += 1;
    }

    OutputFormatter::summary_table(&category_counts, plan.len());
    OutputFormatter::dry_run_notice("No files were moved.");

    Ok(())
}

fn print_rules(options: &RunOptions) -> Result<(), CliError> {
    let rules = RuleSet::load(&options.rules_file)?;
    println!("{}", rules.to_json_pretty()?);
    Ok(())
}

fn check_source_dir(source_dir: &Path) -> Result<(), CliError> {
    if source_dir.is_dir() {
        Ok(())
    } else {
        Err(CliError::NotADirectory(source_dir.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_from_flags() {
        let args = Args::parse_from(["dropsort", "/tmp/in"]);
        assert_eq!(args.command(), OrganizeCommand::Organize { dry_run: false });

        let args = Args::parse_from(["dropsort", "--dry-run", "/tmp/in"]);
        assert_eq!(args.command(), OrganizeCommand::Organize { dry_run: true });

        let args = Args::parse_from(["dropsort", "--print-rules"]);
        assert_eq!(args.command(), OrganizeCommand::PrintRules);
    }

    #[test]
    fn test_cli_flags_override_settings() {
        let args = Args::parse_from(["dropsort", "/cli/in", "-j", "2", "--rules", "mine.json"]);
        let settings = Settings {
            source_dir: Some(PathBuf::from("/settings/in")),
            target_dir: Some(PathBuf::from("/settings/out")),
            workers: Some(8),
            log_file: Some(PathBuf::from("/var/log/sort.log")),
            ..Settings::default()
        };

        let options = RunOptions::resolve(&args, settings).unwrap();

        assert_eq!(options.source_dir, PathBuf::from("/cli/in"));
        assert_eq!(options.target_dir, PathBuf::from("/settings/out"));
        assert_eq!(options.rules_file, PathBuf::from("mine.json"));
        assert_eq!(options.log_file, PathBuf::from("/var/log/sort.log"));
        assert_eq!(options.workers, 2);
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let args = Args::parse_from(["dropsort", "/nowhere/in"]);
        let options = RunOptions::resolve(&args, Settings::default()).unwrap();

        assert_eq!(options.rules_file, PathBuf::from("extensions.json"));
        assert_eq!(options.log_file, PathBuf::from("file_sorting.log"));
        assert_eq!(options.workers, 0);
        assert_eq!(
            options.target_dir,
            PathBuf::from("/nowhere/in/../download-sorting")
        );
    }

    #[test]
    fn test_default_target_is_a_sibling() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("downloads");
        fs::create_dir(&source).unwrap();

        let expected = fs::canonicalize(temp_dir.path())
            .unwrap()
            .join("download-sorting");
        assert_eq!(default_target_dir(&source), expected);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut options = RunOptions::for_source(temp_dir.path().join("missing"));
        options.rules_file = temp_dir.path().join("extensions.json");
        options.log_file = temp_dir.path().join("sorting.log");

        let result = run_cli(OrganizeCommand::Organize { dry_run: false }, &options);
        assert!(matches!(result, Err(CliError::NotADirectory(_))));
    }
}
