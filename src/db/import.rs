//! Writes an [`ImportPlan`] into the database.
//!
//! An import is a destructive replace: every checklist table is cleared
//! (children first) and refilled (parents first) inside one transaction.
//! Each task and its status rows are written under a savepoint so a bad row
//! is rolled back on its own and the import continues.

use super::lookups::{AuxTable, ensure_name};
use super::{Database, now_ms};
use crate::error::AppError;
use crate::import::{ImportPlan, PlannedTask};
use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Tables cleared by a replace, children first.
const CLEAR_ORDER: [&str; 6] = [
    "project_tasks",
    "tasks",
    "phases",
    "projects",
    "responsibles",
    "sectors",
];

/// Import mode determining how to handle existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Import into an empty database. Fails if any project or task exists.
    #[default]
    Fresh,
    /// Clear every checklist table before importing.
    Replace,
}

/// Options for controlling import behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub mode: ImportMode,
}

impl ImportOptions {
    pub fn fresh() -> Self {
        Self {
            mode: ImportMode::Fresh,
        }
    }

    pub fn replace() -> Self {
        Self {
            mode: ImportMode::Replace,
        }
    }
}

/// A data row that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: u64,
    pub item_number: String,
    pub message: String,
}

/// Result of an import operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Rows removed per table before importing.
    pub rows_deleted: BTreeMap<String, usize>,
    pub projects: usize,
    pub sectors: usize,
    pub responsibles: usize,
    pub phases: usize,
    pub tasks: usize,
    pub status_rows: usize,
    pub row_errors: Vec<RowError>,
    /// Non-fatal notes carried over from parsing.
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub fn total_deleted(&self) -> usize {
        self.rows_deleted.values().sum()
    }
}

/// Name -> id maps built while importing lookups.
struct IdMaps {
    projects: Vec<i64>,
    sectors: HashMap<String, i64>,
    responsibles: HashMap<String, i64>,
    phases: HashMap<i64, i64>,
}

fn table_is_empty(conn: &Connection, table: &str) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count == 0)
}

fn insert_task(conn: &Connection, task: &PlannedTask, ids: &IdMaps, now: i64) -> Result<usize> {
    // Rows keyed by ITENS are kept even without an activity name.
    let title = task.title.as_deref().unwrap_or_default();

    let sector_id = task.sector.as_ref().and_then(|s| ids.sectors.get(s)).copied();
    let responsible_id = task
        .responsible
        .as_ref()
        .and_then(|r| ids.responsibles.get(r))
        .copied();
    let phase_id = crate::types::phase_number(&task.item_number)
        .and_then(|n| ids.phases.get(&n))
        .copied();

    conn.execute(
        "INSERT INTO tasks (item_number, title, description, area, stage,
                            phase_id, sector_id, default_responsible_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            task.item_number,
            title,
            task.description,
            task.area,
            task.stage,
            phase_id,
            sector_id,
            responsible_id,
        ],
    )?;
    let task_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare_cached(
        "INSERT INTO project_tasks (project_id, task_id, status, version, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
    )?;
    for (project_id, status) in ids.projects.iter().zip(&task.statuses) {
        stmt.execute(params![project_id, task_id, status, now])?;
    }
    Ok(task.statuses.len().min(ids.projects.len()))
}

impl Database {
    /// Write an import plan.
    ///
    /// In [`ImportMode::Fresh`] the database must hold no projects or tasks.
    /// Row failures are logged, recorded in the report and skipped; any other
    /// failure rolls back the whole import.
    pub fn import_plan(&self, plan: &ImportPlan, options: &ImportOptions) -> Result<ImportReport> {
        self.with_conn_mut(|conn| {
            let mut tx = conn.transaction()?;
            let mut report = ImportReport {
                warnings: plan.warnings.iter().map(ToString::to_string).collect(),
                ..Default::default()
            };

            match options.mode {
                ImportMode::Fresh => {
                    if !table_is_empty(&tx, "projects")? || !table_is_empty(&tx, "tasks")? {
                        return Err(AppError::already_exists(
                            "Checklist data",
                            "database is not empty; import with --force to replace it",
                        )
                        .into());
                    }
                }
                ImportMode::Replace => {
                    for table in CLEAR_ORDER {
                        let deleted = tx
                            .execute(&format!("DELETE FROM {}", table), [])
                            .with_context(|| format!("Failed to clear {}", table))?;
                        report.rows_deleted.insert(table.to_string(), deleted);
                    }
                }
            }

            let now = now_ms();
            let mut ids = IdMaps {
                projects: Vec::with_capacity(plan.projects.len()),
                sectors: HashMap::new(),
                responsibles: HashMap::new(),
                phases: HashMap::new(),
            };

            for name in &plan.projects {
                tx.execute(
                    "INSERT INTO projects (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                let id: i64 = tx.query_row(
                    "SELECT id FROM projects WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                ids.projects.push(id);
            }
            for name in &plan.sectors {
                ids.sectors
                    .insert(name.clone(), ensure_name(&tx, AuxTable::Sectors, name)?);
            }
            for name in &plan.responsibles {
                ids.responsibles
                    .insert(name.clone(), ensure_name(&tx, AuxTable::Responsibles, name)?);
            }
            for phase in &plan.phases {
                tx.execute(
                    "INSERT INTO phases (number, title) VALUES (?1, ?2)",
                    params![phase.number, phase.title],
                )?;
                ids.phases.insert(phase.number, tx.last_insert_rowid());
            }

            report.projects = ids.projects.len();
            report.sectors = ids.sectors.len();
            report.responsibles = ids.responsibles.len();
            report.phases = ids.phases.len();

            for task in &plan.tasks {
                let sp = tx.savepoint()?;
                match insert_task(&sp, task, &ids, now) {
                    Ok(status_rows) => {
                        sp.commit()?;
                        report.tasks += 1;
                        report.status_rows += status_rows;
                    }
                    Err(e) => {
                        // Dropping the savepoint rolls the row back.
                        drop(sp);
                        warn!(
                            line = task.line,
                            item = %task.item_number,
                            error = %e,
                            "Skipping row"
                        );
                        report.row_errors.push(RowError {
                            line: task.line,
                            item_number: task.item_number.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            tx.commit()?;
            info!(
                projects = report.projects,
                tasks = report.tasks,
                status_rows = report.status_rows,
                skipped = report.row_errors.len(),
                "Import complete"
            );
            Ok(report)
        })
    }
}
