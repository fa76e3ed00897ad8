//! Header detection, column de-duplication and column classification.

use super::ImportError;
use crate::config::ImportConfig;
use csv::StringRecord;
use std::collections::HashMap;

/// Index of the first record, among the first `scan_rows`, holding a cell
/// equal to `token` after trimming and upper-casing.
pub fn detect_header_row(records: &[StringRecord], token: &str, scan_rows: usize) -> Option<usize> {
    let token = token.trim().to_uppercase();
    records
        .iter()
        .take(scan_rows)
        .position(|record| record.iter().any(|cell| cell.trim().to_uppercase() == token))
}

/// Make header names unique while preserving order.
///
/// Names are trimmed and empty ones become `Unnamed: <index>`. The first
/// occurrence of a name keeps it; the k-th repeat becomes `name.k`.
pub fn dedupe_columns<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let name = match raw.as_ref().trim() {
                "" => format!("Unnamed: {}", idx),
                trimmed => trimmed.to_string(),
            };
            let count = seen.entry(name.clone()).or_insert(0);
            let out = if *count == 0 {
                name
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            out
        })
        .collect()
}

/// Where each task field and each project lives in a data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub columns: Vec<String>,
    pub item: usize,
    pub title: usize,
    pub description: Option<usize>,
    pub sector: Option<usize>,
    pub responsible: Option<usize>,
    pub stage: Option<usize>,
    pub area: Option<usize>,
    /// Project columns as `(index, project name)`, left to right.
    pub projects: Vec<(usize, String)>,
}

impl ColumnLayout {
    /// Classify de-duplicated columns into task metadata and projects.
    ///
    /// Fails when a required column, or the item or title column, is absent.
    pub fn classify(columns: Vec<String>, config: &ImportConfig) -> Result<Self, ImportError> {
        let find = |name: &str| columns.iter().position(|c| c == name);

        for required in &config.required_columns {
            if find(required).is_none() {
                return Err(ImportError::MissingColumn(required.clone()));
            }
        }

        let names = &config.columns;
        let item = find(&names.item).ok_or_else(|| ImportError::MissingColumn(names.item.clone()))?;
        let title =
            find(&names.title).ok_or_else(|| ImportError::MissingColumn(names.title.clone()))?;

        let projects = columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !config.is_metadata_column(name) && !name.contains("Unnamed"))
            .map(|(idx, name)| (idx, name.clone()))
            .collect();

        Ok(Self {
            item,
            title,
            description: find(&names.description),
            sector: find(&names.sector),
            responsible: find(&names.responsible),
            stage: find(&names.stage),
            area: names.area.iter().find_map(|name| find(name)),
            projects,
            columns,
        })
    }

    /// Names of the project columns, in order.
    pub fn project_names(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|(_, name)| name.as_str())
    }
}
