//! Master checklist tasks: listing, creation and bulk metadata edits.

use super::Database;
use super::lookups::{AuxTable, load_name_map, normalize_name};
use crate::error::AppError;
use crate::types::{TaskRecord, compare_item_numbers, phase_number};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

const TASK_SELECT: &str = "SELECT t.id, t.item_number, t.title, t.description, t.area, t.stage,
            s.name AS sector_name, r.name AS responsible_name
     FROM tasks t
     LEFT JOIN sectors s ON s.id = t.sector_id
     LEFT JOIN responsibles r ON r.id = t.default_responsible_id";

fn parse_task_row(row: &Row) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get("id")?,
        item_number: row.get("item_number")?,
        title: row.get("title")?,
        description: row.get("description")?,
        area: row.get("area")?,
        stage: row.get("stage")?,
        sector_name: row.get("sector_name")?,
        responsible_name: row.get("responsible_name")?,
    })
}

/// Blank strings become `None`.
fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Input for creating a checklist task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub item_number: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub sector_name: Option<String>,
    #[serde(default)]
    pub responsible_name: Option<String>,
}

/// One edited row of the task catalog editor.
///
/// Every field overwrites the stored value; blank means null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEdit {
    pub id: i64,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sector_name: Option<String>,
    #[serde(default)]
    pub responsible_name: Option<String>,
}

/// Resolve an optional lookup name through a preloaded map.
///
/// Blank names clear the reference; names missing from the map are rejected.
fn resolve_lookup(
    map: &HashMap<String, i64>,
    table: AuxTable,
    name: Option<&str>,
    task_id: i64,
) -> Result<Option<i64>> {
    let Some(name) = name.map(normalize_name).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    match map.get(&name) {
        Some(id) => Ok(Some(*id)),
        None => Err(AppError::invalid_value(
            match table {
                AuxTable::Sectors => "sector_name",
                AuxTable::Responsibles => "responsible_name",
            },
            format!(
                "Unknown {} '{}' on task {}; add it to the list first",
                table.label().to_lowercase(),
                name,
                task_id
            ),
        )
        .into()),
    }
}

/// Phase id for an item number, if that phase exists.
pub(crate) fn phase_id_for(conn: &Connection, item_number: &str) -> Result<Option<i64>> {
    let Some(number) = phase_number(item_number) else {
        return Ok(None);
    };
    let id = conn
        .query_row(
            "SELECT id FROM phases WHERE number = ?1",
            params![number],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

impl Database {
    /// All tasks joined with sector and responsible names, in numeric item order.
    pub fn list_tasks_raw(&self) -> Result<Vec<TaskRecord>> {
        let mut tasks = self.with_conn(|conn| {
            let mut stmt = conn.prepare(TASK_SELECT)?;
            let tasks = stmt
                .query_map([], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })?;
        tasks.sort_by(|a, b| compare_item_numbers(&a.item_number, &b.item_number));
        Ok(tasks)
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE t.id = ?1", TASK_SELECT);
            let task = conn
                .query_row(&sql, params![task_id], parse_task_row)
                .optional()?;
            Ok(task)
        })
    }

    /// Add a task to the master checklist.
    ///
    /// Sector and responsible names must already exist in their lists.
    pub fn create_task(&self, input: &NewTask) -> Result<TaskRecord> {
        let item_number = input.item_number.trim();
        if item_number.is_empty() {
            return Err(AppError::missing_field("item_number").into());
        }
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::missing_field("title").into());
        }

        let id = self.with_conn(|conn| {
            let sectors = load_name_map(conn, AuxTable::Sectors)?;
            let responsibles = load_name_map(conn, AuxTable::Responsibles)?;
            let sector_id = resolve_lookup(&sectors, AuxTable::Sectors, input.sector_name.as_deref(), 0)?;
            let responsible_id = resolve_lookup(
                &responsibles,
                AuxTable::Responsibles,
                input.responsible_name.as_deref(),
                0,
            )?;
            let phase_id = phase_id_for(conn, item_number)?;

            conn.execute(
                "INSERT INTO tasks (item_number, title, description, area, stage,
                                    phase_id, sector_id, default_responsible_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item_number,
                    title,
                    non_blank(input.description.as_deref()),
                    non_blank(input.area.as_deref()),
                    non_blank(input.stage.as_deref()),
                    phase_id,
                    sector_id,
                    responsible_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!(task_id = id, item_number = %item_number, "Task created");
        self.get_task(id)?
            .ok_or_else(|| AppError::not_found("Task", id).into())
    }

    /// Apply catalog edits to many tasks in one transaction.
    ///
    /// Sector and responsible names are resolved through maps loaded once
    /// per call. An unknown name or task id fails the whole call and no row
    /// is changed. Returns the number of tasks updated.
    pub fn save_bulk_tasks(&self, edits: &[TaskEdit]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let sectors = load_name_map(&tx, AuxTable::Sectors)?;
            let responsibles = load_name_map(&tx, AuxTable::Responsibles)?;

            let mut updated = 0;
            for edit in edits {
                let sector_id =
                    resolve_lookup(&sectors, AuxTable::Sectors, edit.sector_name.as_deref(), edit.id)?;
                let responsible_id = resolve_lookup(
                    &responsibles,
                    AuxTable::Responsibles,
                    edit.responsible_name.as_deref(),
                    edit.id,
                )?;

                let rows = tx.execute(
                    "UPDATE tasks
                     SET area = ?1, stage = ?2, description = ?3,
                         sector_id = ?4, default_responsible_id = ?5
                     WHERE id = ?6",
                    params![
                        non_blank(edit.area.as_deref()),
                        non_blank(edit.stage.as_deref()),
                        non_blank(edit.description.as_deref()),
                        sector_id,
                        responsible_id,
                        edit.id,
                    ],
                )?;
                if rows == 0 {
                    return Err(AppError::not_found("Task", edit.id).into());
                }
                updated += rows;
            }

            tx.commit()?;
            info!(updated, "Task catalog saved");
            Ok(updated)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_lookup_blank_clears() {
        let map = HashMap::from([("OBRAS".to_string(), 1)]);
        assert_eq!(resolve_lookup(&map, AuxTable::Sectors, None, 1).unwrap(), None);
        assert_eq!(resolve_lookup(&map, AuxTable::Sectors, Some("  "), 1).unwrap(), None);
    }

    #[test]
    fn test_resolve_lookup_normalizes_name() {
        let map = HashMap::from([("OBRAS".to_string(), 7)]);
        assert_eq!(
            resolve_lookup(&map, AuxTable::Sectors, Some(" obras "), 1).unwrap(),
            Some(7)
        );
    }

    #[test]
    fn test_resolve_lookup_rejects_unknown() {
        let map = HashMap::new();
        let err = resolve_lookup(&map, AuxTable::Responsibles, Some("ANA"), 3).unwrap_err();
        let app: AppError = err.into();
        assert_eq!(app.code, crate::error::ErrorCode::InvalidFieldValue);
        assert_eq!(app.field.as_deref(), Some("responsible_name"));
    }
}
