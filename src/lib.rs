//! dropsort - sort a downloads folder by file extension
//!
//! This library classifies the files of a source directory into categories
//! by extension, moves them into per-category folders under a target root
//! with collision-free names, and records every outcome in an append-only
//! run log.

pub mod batch;
pub mod cli;
pub mod config;
pub mod file_organizer;
pub mod output;
pub mod rules;
pub mod run_log;

pub use batch::{BatchRunner, PlannedMove};
pub use config::{CompiledFilters, ConfigError, FilterRules, Settings};
pub use file_organizer::{FileOrganizer, MoveOutcome, OrganizeError, resolve_unique_name};
pub use rules::RuleSet;
pub use run_log::RunLog;

pub use cli::{CliError, OrganizeCommand, RunOptions, run_cli};
