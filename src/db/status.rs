//! Per-project task status: upserts, grids and the wide status matrix.

use super::{Database, now_ms};
use crate::error::AppError;
use crate::types::{
    GlobalGridRow, Project, ProjectTaskRow, Status, TaskRecord, compare_item_numbers,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A single status assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEdit {
    pub project_id: i64,
    pub task_id: i64,
    pub status: Status,
}

/// Stored state of one status row after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub project_id: i64,
    pub task_id: i64,
    pub status: Status,
    pub version: i64,
    pub updated_at: i64,
}

/// Wide pivot: one row per task, one column per project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusMatrix {
    pub projects: Vec<Project>,
    pub rows: Vec<MatrixRow>,
}

/// A task and its status in each project of the matrix, in column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRow {
    pub task: TaskRecord,
    pub statuses: Vec<Status>,
}

impl StatusMatrix {
    /// Status of a task in a project, if both are in the matrix.
    pub fn get(&self, task_id: i64, project_id: i64) -> Option<Status> {
        let column = self.projects.iter().position(|p| p.id == project_id)?;
        self.rows
            .iter()
            .find(|r| r.task.id == task_id)
            .and_then(|r| r.statuses.get(column).copied())
    }
}

const UPSERT_SQL: &str = "INSERT INTO project_tasks (project_id, task_id, status, version, updated_at)
     VALUES (?1, ?2, ?3, 1, ?4)
     ON CONFLICT(project_id, task_id) DO UPDATE SET
         status = excluded.status,
         version = project_tasks.version + 1,
         updated_at = excluded.updated_at";

fn read_status_record(conn: &Connection, project_id: i64, task_id: i64) -> Result<StatusRecord> {
    let record = conn.query_row(
        "SELECT project_id, task_id, status, version, updated_at
         FROM project_tasks WHERE project_id = ?1 AND task_id = ?2",
        params![project_id, task_id],
        |row| {
            Ok(StatusRecord {
                project_id: row.get(0)?,
                task_id: row.get(1)?,
                status: row.get(2)?,
                version: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )?;
    Ok(record)
}

/// Fail with `NotFound` unless both the project and the task exist.
fn ensure_pair_exists(conn: &Connection, project_id: i64, task_id: i64) -> Result<()> {
    let project: Option<i64> = conn
        .query_row(
            "SELECT id FROM projects WHERE id = ?1",
            params![project_id],
            |row| row.get(0),
        )
        .optional()?;
    if project.is_none() {
        return Err(AppError::not_found("Project", project_id).into());
    }
    let task: Option<i64> = conn
        .query_row("SELECT id FROM tasks WHERE id = ?1", params![task_id], |row| {
            row.get(0)
        })
        .optional()?;
    if task.is_none() {
        return Err(AppError::not_found("Task", task_id).into());
    }
    Ok(())
}

impl Database {
    /// Set the status of a task in a project. Last write wins.
    ///
    /// Creates the row on first write, otherwise updates it in place and
    /// bumps its version.
    pub fn upsert_status(&self, project_id: i64, task_id: i64, status: Status) -> Result<StatusRecord> {
        self.with_conn(|conn| {
            ensure_pair_exists(conn, project_id, task_id)?;
            conn.execute(UPSERT_SQL, params![project_id, task_id, status, now_ms()])?;
            debug!(project_id, task_id, status = %status, "Status updated");
            read_status_record(conn, project_id, task_id)
        })
    }

    /// Set a status only if the stored version still matches.
    ///
    /// `expected_version` is the version the caller last read; 0 means the
    /// caller saw no stored row. A mismatch returns `Conflict` and leaves the
    /// row untouched.
    pub fn upsert_status_checked(
        &self,
        project_id: i64,
        task_id: i64,
        status: Status,
        expected_version: i64,
    ) -> Result<StatusRecord> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_pair_exists(&tx, project_id, task_id)?;

            let current: i64 = tx
                .query_row(
                    "SELECT version FROM project_tasks WHERE project_id = ?1 AND task_id = ?2",
                    params![project_id, task_id],
                    |row| row.get(0),
                )
                .optional()?
                .unwrap_or(0);
            if current != expected_version {
                return Err(AppError::conflict(expected_version, current).into());
            }

            tx.execute(UPSERT_SQL, params![project_id, task_id, status, now_ms()])?;
            let record = read_status_record(&tx, project_id, task_id)?;
            tx.commit()?;
            debug!(project_id, task_id, version = record.version, "Status updated (checked)");
            Ok(record)
        })
    }

    /// Status grid for one project: every catalog task with its status.
    ///
    /// Tasks without a stored row report the default status and version 0.
    pub fn project_grid(&self, project_id: i64) -> Result<Vec<ProjectTaskRow>> {
        let mut rows = self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM projects WHERE id = ?1",
                    params![project_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(AppError::not_found("Project", project_id).into());
            }

            let mut stmt = conn.prepare(
                "SELECT t.id, t.item_number, t.title, t.description, t.area, t.stage,
                        s.name, r.name,
                        COALESCE(pt.status, ?2), COALESCE(pt.version, 0), pt.updated_at
                 FROM tasks t
                 LEFT JOIN sectors s ON s.id = t.sector_id
                 LEFT JOIN responsibles r ON r.id = t.default_responsible_id
                 LEFT JOIN project_tasks pt ON pt.task_id = t.id AND pt.project_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![project_id, Status::default()], |row| {
                    Ok(ProjectTaskRow {
                        task_id: row.get(0)?,
                        item_number: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        area: row.get(4)?,
                        stage: row.get(5)?,
                        sector: row.get(6)?,
                        responsible: row.get(7)?,
                        status: row.get(8)?,
                        version: row.get(9)?,
                        updated_at: row.get(10)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.sort_by(|a, b| compare_item_numbers(&a.item_number, &b.item_number));
        Ok(rows)
    }

    /// Cross join of every task with every project.
    ///
    /// Ordered by project name, then numeric item order.
    pub fn global_grid(&self) -> Result<Vec<GlobalGridRow>> {
        let mut rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.name, t.id, t.item_number, t.title, t.description, t.stage,
                        s.name, r.name, ph.title, COALESCE(pt.status, ?1)
                 FROM tasks t
                 CROSS JOIN projects p
                 LEFT JOIN project_tasks pt ON pt.task_id = t.id AND pt.project_id = p.id
                 LEFT JOIN sectors s ON s.id = t.sector_id
                 LEFT JOIN responsibles r ON r.id = t.default_responsible_id
                 LEFT JOIN phases ph ON ph.id = t.phase_id",
            )?;
            let rows = stmt
                .query_map(params![Status::default()], |row| {
                    Ok(GlobalGridRow {
                        project_id: row.get(0)?,
                        project_name: row.get(1)?,
                        task_id: row.get(2)?,
                        item_number: row.get(3)?,
                        title: row.get(4)?,
                        description: row.get(5)?,
                        stage: row.get(6)?,
                        sector: row.get(7)?,
                        responsible: row.get(8)?,
                        phase_title: row.get(9)?,
                        status: row.get(10)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.sort_by(|a, b| {
            a.project_name
                .cmp(&b.project_name)
                .then_with(|| compare_item_numbers(&a.item_number, &b.item_number))
        });
        Ok(rows)
    }

    /// Wide status pivot for the projects of a category (`None` or `GERAL`
    /// for all), with the default status filled in.
    pub fn status_matrix(&self, category: Option<&str>) -> Result<StatusMatrix> {
        let projects = self.list_projects(category)?;
        let tasks = self.list_tasks_raw()?;

        let stored: HashMap<(i64, i64), Status> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT task_id, project_id, status FROM project_tasks")?;
            let map = stmt
                .query_map([], |row| Ok(((row.get(0)?, row.get(1)?), row.get(2)?)))?
                .collect::<Result<HashMap<_, _>, _>>()?;
            Ok(map)
        })?;

        let rows = tasks
            .into_iter()
            .map(|task| {
                let statuses = projects
                    .iter()
                    .map(|p| stored.get(&(task.id, p.id)).copied().unwrap_or_default())
                    .collect();
                MatrixRow { task, statuses }
            })
            .collect();

        Ok(StatusMatrix { projects, rows })
    }

    /// Upsert many statuses in one transaction. Returns the number written.
    pub fn save_status_matrix(&self, edits: &[StatusEdit]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_ms();
            {
                let mut stmt = tx.prepare(UPSERT_SQL)?;
                for edit in edits {
                    stmt.execute(params![edit.project_id, edit.task_id, edit.status, now])?;
                }
            }
            tx.commit()?;
            info!(count = edits.len(), "Status matrix saved");
            Ok(edits.len())
        })
    }
}
