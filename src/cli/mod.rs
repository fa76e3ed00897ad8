//! CLI command definitions for onboarding-tracker
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod import;
pub mod report;

use clap::{Parser, Subcommand};
use import::ImportArgs;
use report::ReportArgs;

/// Onboarding checklist tracker: web dashboard, CSV import and reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web dashboard (default if no subcommand given)
    Serve(ServeArgs),

    /// Import the onboarding spreadsheet from a CSV export
    Import(ImportArgs),

    /// Export a status report as CSV
    Report(ReportArgs),
}

/// Arguments for the serve subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ServeArgs {
    /// Port for the web dashboard (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}
