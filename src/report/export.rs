//! Long-format status reports and their CSV export.

use crate::db::status::StatusMatrix;
use crate::types::Status;
use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Column headers of the exported CSV.
pub const REPORT_HEADERS: [&str; 7] = [
    "PROJETO/OBRA",
    "ITENS",
    "ATIVIDADE",
    "STATUS",
    "RESPONSÁVEL",
    "SETOR",
    "DESCRIÇÃO",
];

/// Statuses offered by the report filter.
pub const REPORT_STATUS_OPTIONS: [Status; 3] =
    [Status::Pendente, Status::Andamento, Status::NaoIniciado];

/// One (project, task) line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub project: String,
    pub item_number: String,
    pub activity: String,
    pub status: Status,
    pub responsible: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
}

/// Report filter. Empty lists match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_statuses")]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub responsibles: Vec<String>,
}

fn default_statuses() -> Vec<Status> {
    vec![Status::Pendente]
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            project: None,
            statuses: default_statuses(),
            responsibles: Vec::new(),
        }
    }
}

impl ReportFilter {
    /// A filter that keeps every row.
    pub fn all() -> Self {
        Self {
            project: None,
            statuses: Vec::new(),
            responsibles: Vec::new(),
        }
    }

    pub fn matches(&self, row: &ReportRow) -> bool {
        let project_ok = self
            .project
            .as_deref()
            .is_none_or(|p| row.project == p.trim());
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&row.status);
        let responsible_ok = self.responsibles.is_empty()
            || row.responsible.as_deref().is_some_and(|r| {
                self.responsibles
                    .iter()
                    .any(|wanted| wanted.trim().eq_ignore_ascii_case(r))
            });
        project_ok && status_ok && responsible_ok
    }
}

/// Unpivot the status matrix into one row per (project, task).
///
/// Rows are grouped by project in column order, tasks in matrix order.
pub fn melt(matrix: &StatusMatrix) -> Vec<ReportRow> {
    matrix
        .projects
        .iter()
        .enumerate()
        .flat_map(|(column, project)| {
            matrix.rows.iter().map(move |row| ReportRow {
                project: project.name.clone(),
                item_number: row.task.item_number.clone(),
                activity: row.task.title.clone(),
                status: row.statuses.get(column).copied().unwrap_or_default(),
                responsible: row.task.responsible_name.clone(),
                sector: row.task.sector_name.clone(),
                description: row.task.description.clone(),
            })
        })
        .collect()
}

/// Melt the matrix and keep the rows the filter accepts.
pub fn build_report(matrix: &StatusMatrix, filter: &ReportFilter) -> Vec<ReportRow> {
    melt(matrix)
        .into_iter()
        .filter(|row| filter.matches(row))
        .collect()
}

/// Write report rows as CSV with a header line.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(REPORT_HEADERS)?;
    for row in rows {
        csv.write_record([
            row.project.as_str(),
            row.item_number.as_str(),
            row.activity.as_str(),
            row.status.as_str(),
            row.responsible.as_deref().unwrap_or_default(),
            row.sector.as_deref().unwrap_or_default(),
            row.description.as_deref().unwrap_or_default(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Download name of a report: `Relatorio_<scope>_<YYYYmmdd_HHMM>.csv`.
///
/// Whitespace and path separators in the scope become underscores.
pub fn report_file_name(scope: &str, now: NaiveDateTime) -> String {
    let scope: String = scope
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("Relatorio_{}_{}.csv", scope, now.format("%Y%m%d_%H%M"))
}
