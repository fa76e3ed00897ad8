//! Core types for the onboarding tracker.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Completion status of a task within one project.
///
/// The vocabulary is closed. Values are stored upper-cased exactly as
/// rendered by [`Status::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "NÃO INICIADO")]
    NaoIniciado,
    #[serde(rename = "ANDAMENTO")]
    Andamento,
    #[serde(rename = "PENDENTE")]
    Pendente,
    #[serde(rename = "ENTRADA")]
    Entrada,
    #[serde(rename = "SIM")]
    Sim,
    #[serde(rename = "NÃO SE APLICA")]
    NaoSeAplica,
}

impl Status {
    /// Selection order used by status dropdowns.
    pub const ALL: [Status; 6] = [
        Status::Sim,
        Status::Andamento,
        Status::Pendente,
        Status::Entrada,
        Status::NaoIniciado,
        Status::NaoSeAplica,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NaoIniciado => "NÃO INICIADO",
            Status::Andamento => "ANDAMENTO",
            Status::Pendente => "PENDENTE",
            Status::Entrada => "ENTRADA",
            Status::Sim => "SIM",
            Status::NaoSeAplica => "NÃO SE APLICA",
        }
    }

    /// Normalize a raw cell or form value into a status.
    ///
    /// Trims and upper-cases the input. Blank, `NAN` and `NONE` map to the
    /// default status. Returns `None` for values outside the vocabulary.
    pub fn normalize(raw: &str) -> Option<Status> {
        let value = raw.trim().to_uppercase();
        match value.as_str() {
            "" | "NAN" | "NONE" => Some(Status::NaoIniciado),
            "NÃO INICIADO" | "NAO INICIADO" => Some(Status::NaoIniciado),
            "ANDAMENTO" => Some(Status::Andamento),
            "PENDENTE" => Some(Status::Pendente),
            "ENTRADA" => Some(Status::Entrada),
            "SIM" | "CONCLUIDO" | "CONCLUÍDO" | "OK" => Some(Status::Sim),
            "NÃO SE APLICA" | "NAO SE APLICA" => Some(Status::NaoSeAplica),
            _ => None,
        }
    }

    /// Whether the status counts towards completion.
    pub fn is_done(&self) -> bool {
        matches!(self, Status::Sim | Status::NaoSeAplica)
    }

    /// Hex colour used by the dashboard status bars.
    pub fn color(&self) -> &'static str {
        match self {
            Status::Sim => "#10B981",
            Status::Andamento => "#3B82F6",
            Status::Pendente => "#F59E0B",
            Status::Entrada => "#8B5CF6",
            Status::NaoIniciado => "#64748B",
            Status::NaoSeAplica => "#334155",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::normalize(s).ok_or_else(|| {
            format!(
                "Invalid status '{}'. Expected one of: {}",
                s.trim(),
                Status::ALL
                    .iter()
                    .map(Status::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// A construction project ("obra").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub title: Option<String>,
}

/// Project with completion counters for the project list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub total_tasks: i64,
    pub done_tasks: i64,
}

impl ProjectSummary {
    /// Completion percentage, rounded down.
    pub fn percent(&self) -> i64 {
        percent_floor(self.done_tasks, self.total_tasks)
    }
}

/// Entry of an auxiliary lookup list (sector or responsible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxEntry {
    pub id: i64,
    pub name: String,
}

/// Phase grouping derived from the integer part of item numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,
    pub number: i64,
    pub title: Option<String>,
}

/// Master checklist task joined with its lookup names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub item_number: String,
    pub title: String,
    pub description: Option<String>,
    pub area: Option<String>,
    pub stage: Option<String>,
    pub sector_name: Option<String>,
    pub responsible_name: Option<String>,
}

/// One row of a single project's status grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTaskRow {
    pub task_id: i64,
    pub item_number: String,
    pub title: String,
    pub description: Option<String>,
    pub area: Option<String>,
    pub stage: Option<String>,
    pub sector: Option<String>,
    pub responsible: Option<String>,
    pub status: Status,
    /// Version of the stored status row; 0 when no row exists yet.
    pub version: i64,
    pub updated_at: Option<i64>,
}

/// One cell of the cross-project grid (task x project).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalGridRow {
    pub project_id: i64,
    pub project_name: String,
    pub task_id: i64,
    pub item_number: String,
    pub title: String,
    pub description: Option<String>,
    pub stage: Option<String>,
    pub sector: Option<String>,
    pub responsible: Option<String>,
    pub phase_title: Option<String>,
    pub status: Status,
}

/// Integer percentage of `part` over `total`, rounded down. Zero when empty.
pub fn percent_floor(part: i64, total: i64) -> i64 {
    if total > 0 { part * 100 / total } else { 0 }
}

// =============================================================================
// Item number conventions
// =============================================================================

/// Whether an item number denotes a child activity ("N.M").
///
/// Root rows ("N") and synthetic parent rows ("N.0") are not activities.
pub fn is_child_activity(item_number: &str) -> bool {
    let item = item_number.trim();
    item.contains('.') && !item.ends_with(".0")
}

/// The phase group of an item number: the text before the first `.`.
pub fn phase_group(item_number: &str) -> &str {
    let item = item_number.trim();
    item.split('.').next().unwrap_or(item)
}

/// The phase number of an item number, if its group is numeric.
pub fn phase_number(item_number: &str) -> Option<i64> {
    let group = phase_group(item_number);
    if group.is_empty() || !group.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    group.parse().ok()
}

/// Whether an item number is the root row of its phase ("N" or "N.0").
pub fn is_phase_root(item_number: &str) -> bool {
    let item = item_number.trim();
    phase_number(item).is_some() && (!item.contains('.') || item.ends_with(".0"))
}

/// Segment-wise numeric sort key of an item number.
///
/// Each dot-separated segment is reduced to its digits, without leading
/// zeros, paired with their count. Comparing length before text orders digit
/// runs numerically at any size. `None` when the item number contains no
/// digits at all.
pub fn item_sort_key(item_number: &str) -> Option<Vec<(usize, String)>> {
    if !item_number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(
        item_number
            .trim()
            .split('.')
            .map(|segment| {
                let digits: String = segment.chars().filter(|c| c.is_ascii_digit()).collect();
                let significant = digits.trim_start_matches('0');
                (significant.len(), significant.to_string())
            })
            .collect(),
    )
}

/// Numeric-aware ordering of item numbers: "1.2" sorts before "1.10".
///
/// Item numbers without digits sort last, lexically.
pub fn compare_item_numbers(a: &str, b: &str) -> Ordering {
    match (item_sort_key(a), item_sort_key(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Sort order for phase groups: numeric groups first, others as 999.
pub fn phase_group_order(group: &str) -> i64 {
    if !group.is_empty() && group.chars().all(|c| c.is_ascii_digit()) {
        group.parse().unwrap_or(999)
    } else {
        999
    }
}
