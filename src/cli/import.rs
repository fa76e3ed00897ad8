//! Import subcommand for onboarding-tracker
//!
//! Loads the onboarding spreadsheet (CSV export) into the database,
//! replacing the checklist, projects, lookups and statuses.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the import subcommand
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the CSV export to import
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Parse the file and report what would be imported without
    /// touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Replace existing data
    ///
    /// Without this flag the import refuses to run against a database
    /// that already holds projects or tasks.
    #[arg(long)]
    pub force: bool,
}

impl ImportArgs {
    /// Describe the import mode for logging
    pub fn import_mode(&self) -> &'static str {
        if self.dry_run {
            "dry-run"
        } else if self.force {
            "replace"
        } else {
            "fresh"
        }
    }
}
