//! Onboarding spreadsheet import.
//!
//! The source is a CSV export of a human-authored spreadsheet: a few
//! preamble rows, a header row containing the key token (`ITENS`), task
//! metadata columns and one column per project holding that project's
//! status for each task. Re-embedded header rows and rows without an item
//! number are dropped.
//!
//! Parsing produces an [`ImportPlan`] without touching the database; the plan
//! is written by [`crate::db::Database::import_plan`].

mod columns;

pub use columns::{ColumnLayout, dedupe_columns, detect_header_row};

use crate::config::ImportConfig;
use crate::types::{Status, is_phase_root, phase_number};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Errors that abort an import before any row is written.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Header row with '{token}' not found in the first {scanned} rows")]
    HeaderNotFound { token: String, scanned: usize },

    #[error("Required column '{0}' is missing from the header")]
    MissingColumn(String),
}

/// A status cell that was not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusWarning {
    pub line: u64,
    pub item_number: String,
    pub project: String,
    pub value: String,
}

impl fmt::Display for StatusWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: item {} / {}: unknown status '{}', stored as {}",
            self.line,
            self.item_number,
            self.project,
            self.value,
            Status::default()
        )
    }
}

/// One task row of the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTask {
    /// Source line in the CSV file (1-based).
    pub line: u64,
    pub item_number: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub area: Option<String>,
    pub stage: Option<String>,
    /// Upper-cased sector name.
    pub sector: Option<String>,
    /// Upper-cased responsible name.
    pub responsible: Option<String>,
    /// Status per project, aligned with [`ImportPlan::projects`].
    pub statuses: Vec<Status>,
}

/// A phase derived from item numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPhase {
    pub number: i64,
    pub title: Option<String>,
}

/// Everything an import will write, computed from the CSV alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportPlan {
    pub projects: Vec<String>,
    pub sectors: Vec<String>,
    pub responsibles: Vec<String>,
    pub phases: Vec<PlannedPhase>,
    pub tasks: Vec<PlannedTask>,
    pub warnings: Vec<StatusWarning>,
}

/// Null-normalise a cell: empty or `nan` become `None`.
fn clean_cell(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(value.to_string())
    }
}

fn cell<'a>(record: &'a StringRecord, idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| record.get(i))
}

impl ImportPlan {
    /// Parse a spreadsheet export from a file.
    pub fn from_path<P: AsRef<Path>>(path: P, config: &ImportConfig) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, config)
    }

    /// Parse a spreadsheet export from any reader.
    pub fn from_reader<R: Read>(reader: R, config: &ImportConfig) -> Result<Self, ImportError> {
        let mut csv = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv.records().collect::<Result<Vec<_>, _>>()?;
        if let Some(first) = records.first_mut() {
            strip_bom(first);
        }

        let header_idx = detect_header_row(&records, &config.header_token, config.header_scan_rows)
            .ok_or_else(|| ImportError::HeaderNotFound {
                token: config.header_token.clone(),
                scanned: config.header_scan_rows.min(records.len()),
            })?;

        let header: Vec<&str> = records[header_idx].iter().collect();
        let layout = ColumnLayout::classify(dedupe_columns(&header), config)?;
        debug!(
            header_row = header_idx,
            projects = layout.projects.len(),
            "Spreadsheet header classified"
        );

        Ok(Self::from_records(&records[header_idx + 1..], &layout, config))
    }

    fn from_records(records: &[StringRecord], layout: &ColumnLayout, config: &ImportConfig) -> Self {
        let token = config.header_token.trim().to_uppercase();
        let projects: Vec<String> = layout.project_names().map(String::from).collect();

        let mut sectors = BTreeSet::new();
        let mut responsibles = BTreeSet::new();
        let mut phases: BTreeMap<i64, Option<String>> = BTreeMap::new();
        let mut tasks = Vec::new();
        let mut warnings = Vec::new();

        for record in records {
            let Some(item_number) = clean_cell(record.get(layout.item)) else {
                continue;
            };
            if item_number.to_uppercase() == token {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            let title = clean_cell(record.get(layout.title));
            let sector = clean_cell(cell(record, layout.sector)).map(|s| s.to_uppercase());
            let responsible = clean_cell(cell(record, layout.responsible)).map(|r| r.to_uppercase());

            if let Some(s) = &sector {
                sectors.insert(s.clone());
            }
            if let Some(r) = &responsible {
                responsibles.insert(r.clone());
            }
            if let Some(number) = phase_number(&item_number) {
                let entry = phases.entry(number).or_default();
                if entry.is_none() && is_phase_root(&item_number) {
                    *entry = title.clone();
                }
            }

            let statuses = layout
                .projects
                .iter()
                .map(|(idx, project)| {
                    let raw = record.get(*idx).unwrap_or_default();
                    Status::normalize(raw).unwrap_or_else(|| {
                        let warning = StatusWarning {
                            line,
                            item_number: item_number.clone(),
                            project: project.clone(),
                            value: raw.trim().to_string(),
                        };
                        warn!(%warning, "Unknown status value");
                        warnings.push(warning);
                        Status::default()
                    })
                })
                .collect();

            tasks.push(PlannedTask {
                line,
                title,
                description: clean_cell(cell(record, layout.description)),
                area: clean_cell(cell(record, layout.area)),
                stage: clean_cell(cell(record, layout.stage)),
                sector,
                responsible,
                statuses,
                item_number,
            });
        }

        Self {
            projects,
            sectors: sectors.into_iter().collect(),
            responsibles: responsibles.into_iter().collect(),
            phases: phases
                .into_iter()
                .map(|(number, title)| PlannedPhase { number, title })
                .collect(),
            tasks,
            warnings,
        }
    }

    /// Number of status rows the plan writes.
    pub fn status_row_count(&self) -> usize {
        self.tasks.len() * self.projects.len()
    }
}

fn strip_bom(record: &mut StringRecord) {
    let Some(first) = record.get(0) else {
        return;
    };
    if let Some(stripped) = first.strip_prefix('\u{feff}') {
        let mut cells: Vec<String> = record.iter().map(String::from).collect();
        cells[0] = stripped.to_string();
        *record = StringRecord::from(cells);
    }
}
