//! Dashboard aggregates computed from the cross-project grid.

use crate::types::{GlobalGridRow, ProjectTaskRow, Status, is_child_activity, percent_floor, phase_group, phase_group_order};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Stage label used when a task has none.
pub const MISSING_STAGE: &str = "N/D";
/// Sector label used when a task has none.
pub const MISSING_SECTOR: &str = "GERAL";

/// What the top-risk KPI ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
    /// Project with the most pending items (consolidated view).
    Project,
    /// Sector with the most pending items (single-project view).
    Sector,
}

/// A label with a count, as shown by bar charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub label: String,
    pub count: usize,
}

/// Headline KPIs of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    /// Project the summary is restricted to, `None` for all projects.
    pub project: Option<String>,
    /// Child activities in scope.
    pub total: usize,
    pub done: usize,
    pub pending: usize,
    /// Percent done, rounded down.
    pub progress: i64,
    pub risk_kind: RiskKind,
    pub top_risk: Option<CountEntry>,
}

/// Most frequent label, ties broken by name.
fn top_count<'a>(labels: impl Iterator<Item = &'a str>) -> Option<CountEntry> {
    count_labels(labels).into_iter().next()
}

/// Count labels, most frequent first, ties broken by name.
fn count_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<CountEntry> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(label, count)| CountEntry {
            label: label.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries
}

impl DashboardSummary {
    /// Compute the KPIs, optionally restricted to one project.
    ///
    /// Totals only count child activities ("N.M", not "N.0"). The top risk
    /// looks at every pending row in scope.
    pub fn compute(rows: &[GlobalGridRow], project: Option<&str>) -> Self {
        let scoped: Vec<&GlobalGridRow> = rows
            .iter()
            .filter(|r| project.is_none_or(|p| r.project_name == p))
            .collect();

        let activities = scoped.iter().filter(|r| is_child_activity(&r.item_number));
        let (mut total, mut done, mut pending) = (0, 0, 0);
        for row in activities {
            total += 1;
            if row.status.is_done() {
                done += 1;
            }
            if row.status == Status::Pendente {
                pending += 1;
            }
        }

        let pending_rows = scoped.iter().filter(|r| r.status == Status::Pendente);
        let (risk_kind, top_risk) = match project {
            None => (
                RiskKind::Project,
                top_count(pending_rows.map(|r| r.project_name.as_str())),
            ),
            Some(_) => (
                RiskKind::Sector,
                top_count(pending_rows.filter_map(|r| r.sector.as_deref())),
            ),
        };

        Self {
            project: project.map(String::from),
            total,
            done,
            pending,
            progress: percent_floor(done as i64, total as i64),
            risk_kind,
            top_risk,
        }
    }
}

/// Completion of one project over every catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectProgress {
    pub project: String,
    pub total: usize,
    pub done: usize,
    pub percent: i64,
}

/// Per-project completion, least advanced first.
pub fn project_progress(rows: &[GlobalGridRow]) -> Vec<ProjectProgress> {
    let mut by_project: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = by_project.entry(row.project_name.as_str()).or_default();
        entry.0 += 1;
        if row.status.is_done() {
            entry.1 += 1;
        }
    }
    let mut progress: Vec<ProjectProgress> = by_project
        .into_iter()
        .map(|(project, (total, done))| ProjectProgress {
            project: project.to_string(),
            total,
            done,
            percent: percent_floor(done as i64, total as i64),
        })
        .collect();
    // Stable sort keeps name order among equal percentages.
    progress.sort_by_key(|p| p.percent);
    progress
}

/// Sectors with the most pending rows. Rows without a sector are ignored.
pub fn top_pending_sectors(rows: &[GlobalGridRow], n: usize) -> Vec<CountEntry> {
    let mut entries = count_labels(
        rows.iter()
            .filter(|r| r.status == Status::Pendente)
            .filter_map(|r| r.sector.as_deref()),
    );
    entries.truncate(n);
    entries
}

/// Row of the pending-activities radar table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadarRow {
    pub project: String,
    pub item_number: String,
    pub title: String,
    pub stage: Option<String>,
    pub responsible: Option<String>,
    pub status: Status,
}

/// The first `n` pending rows, in grid order.
pub fn pending_radar(rows: &[GlobalGridRow], n: usize) -> Vec<RadarRow> {
    rows.iter()
        .filter(|r| r.status == Status::Pendente)
        .take(n)
        .map(|r| RadarRow {
            project: r.project_name.clone(),
            item_number: r.item_number.clone(),
            title: r.title.clone(),
            stage: r.stage.clone(),
            responsible: r.responsible.clone(),
            status: r.status,
        })
        .collect()
}

/// One leaf of the stage > sector > status breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionEntry {
    pub stage: String,
    pub sector: String,
    pub status: Status,
    pub count: usize,
}

/// Count rows by stage, sector and status.
///
/// Missing stages show as [`MISSING_STAGE`] and missing sectors as
/// [`MISSING_SECTOR`].
pub fn distribution(rows: &[GlobalGridRow]) -> Vec<DistributionEntry> {
    let mut counts: BTreeMap<(String, String, &'static str), (Status, usize)> = BTreeMap::new();
    for row in rows {
        let stage = row.stage.clone().unwrap_or_else(|| MISSING_STAGE.to_string());
        let sector = row.sector.clone().unwrap_or_else(|| MISSING_SECTOR.to_string());
        let entry = counts
            .entry((stage, sector, row.status.as_str()))
            .or_insert((row.status, 0));
        entry.1 += 1;
    }
    counts
        .into_iter()
        .map(|((stage, sector, _), (status, count))| DistributionEntry {
            stage,
            sector,
            status,
            count,
        })
        .collect()
}

/// Tasks of one phase group in the management view.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseGroup {
    pub group: String,
    pub rows: Vec<ProjectTaskRow>,
}

/// Group project rows by phase ("N" of "N.M").
///
/// Numeric groups come first in numeric order; other groups sort as 999.
/// Rows keep their incoming order within a group.
pub fn group_by_phase(rows: Vec<ProjectTaskRow>) -> Vec<PhaseGroup> {
    let mut groups: Vec<PhaseGroup> = Vec::new();
    for row in rows {
        let group = phase_group(&row.item_number).to_string();
        match groups.iter_mut().find(|g| g.group == group) {
            Some(existing) => existing.rows.push(row),
            None => groups.push(PhaseGroup {
                group,
                rows: vec![row],
            }),
        }
    }
    groups.sort_by(|a, b| {
        phase_group_order(&a.group)
            .cmp(&phase_group_order(&b.group))
            .then_with(|| a.group.cmp(&b.group))
    });
    groups
}

/// Keep rows matching an optional sector and an optional status.
pub fn filter_project_rows(
    rows: Vec<ProjectTaskRow>,
    sector: Option<&str>,
    status: Option<Status>,
) -> Vec<ProjectTaskRow> {
    rows.into_iter()
        .filter(|r| sector.is_none_or(|s| r.sector.as_deref().unwrap_or_default() == s))
        .filter(|r| status.is_none_or(|s| r.status == s))
        .collect()
}
