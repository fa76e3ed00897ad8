//! Report subcommand for onboarding-tracker
//!
//! Writes a long-format status report (one line per project and task)
//! as CSV, optionally gzip-compressed.

use crate::report::ReportFilter;
use crate::types::Status;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the report subcommand
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Restrict the report to one project
    #[arg(long)]
    pub project: Option<String>,

    /// Statuses to include (repeatable). Defaults to PENDENTE.
    #[arg(long = "status", value_name = "STATUS", value_parser = parse_status)]
    pub statuses: Vec<Status>,

    /// Include every status
    #[arg(long, conflicts_with = "statuses")]
    pub all_statuses: bool,

    /// Responsibles to include (repeatable)
    #[arg(long = "responsible", value_name = "NAME")]
    pub responsibles: Vec<String>,

    /// Output file (default: stdout). A `.gz` extension compresses the output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_status(value: &str) -> Result<Status, String> {
    value.parse()
}

impl ReportArgs {
    /// Check if the output should be gzipped based on extension
    pub fn is_gzipped(&self) -> bool {
        self.output
            .as_ref()
            .and_then(|p| p.extension())
            .is_some_and(|ext| ext == "gz")
    }

    /// Build the report filter from the arguments.
    pub fn filter(&self) -> ReportFilter {
        let mut filter = ReportFilter {
            project: self.project.clone(),
            responsibles: self.responsibles.clone(),
            ..ReportFilter::default()
        };
        if self.all_statuses {
            filter.statuses.clear();
        } else if !self.statuses.is_empty() {
            filter.statuses = self.statuses.clone();
        }
        filter
    }
}
