//! Project CRUD and completion summaries.

use super::{Database, is_unique_violation, now_ms};
use crate::error::AppError;
use crate::types::{Project, ProjectSummary, Status};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

/// Category filter value meaning "all categories".
pub const ALL_CATEGORIES: &str = "GERAL";

fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        category: row.get("category")?,
        title: row.get("title")?,
    })
}

/// Normalize an optional category: trimmed, upper-cased, blank as none.
fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
}

impl Database {
    /// List projects ordered by name, optionally filtered by category.
    ///
    /// A `None` filter or the [`ALL_CATEGORIES`] value returns every project.
    pub fn list_projects(&self, category: Option<&str>) -> Result<Vec<Project>> {
        let category = normalize_category(category).filter(|c| c != ALL_CATEGORIES);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, category, title FROM projects
                 WHERE (?1 IS NULL OR category = ?1)
                 ORDER BY name",
            )?;
            let projects = stmt
                .query_map(params![category], parse_project_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(projects)
        })
    }

    /// Get a project by ID.
    pub fn get_project(&self, project_id: i64) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let project = conn
                .query_row(
                    "SELECT id, name, category, title FROM projects WHERE id = ?1",
                    params![project_id],
                    parse_project_row,
                )
                .optional()?;
            Ok(project)
        })
    }

    /// Get a project by its exact name.
    pub fn get_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let project = conn
                .query_row(
                    "SELECT id, name, category, title FROM projects WHERE name = ?1",
                    params![name.trim()],
                    parse_project_row,
                )
                .optional()?;
            Ok(project)
        })
    }

    /// Create a project, or rename/recategorise an existing one when
    /// `project_id` is given.
    pub fn save_project(
        &self,
        name: &str,
        category: Option<&str>,
        project_id: Option<i64>,
    ) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::missing_field("name").into());
        }
        let category = normalize_category(category);

        self.with_conn(|conn| {
            let result = match project_id {
                Some(id) => conn
                    .execute(
                        "UPDATE projects SET name = ?1, category = ?2 WHERE id = ?3",
                        params![name, category, id],
                    )
                    .map(|rows| (rows, id)),
                None => conn
                    .execute(
                        "INSERT INTO projects (name, category, created_at) VALUES (?1, ?2, ?3)",
                        params![name, category, now_ms()],
                    )
                    .map(|rows| (rows, conn.last_insert_rowid())),
            };

            let id = match result {
                Ok((0, id)) => return Err(AppError::not_found("Project", id).into()),
                Ok((_, id)) => id,
                Err(e) if is_unique_violation(&e) => {
                    return Err(AppError::already_exists("Project", name).into());
                }
                Err(e) => return Err(e.into()),
            };

            info!(project_id = id, name = %name, "Project saved");

            let project = conn.query_row(
                "SELECT id, name, category, title FROM projects WHERE id = ?1",
                params![id],
                parse_project_row,
            )?;
            Ok(project)
        })
    }

    /// Delete a project and, by cascade, all of its status rows.
    pub fn delete_project(&self, project_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
            if rows == 0 {
                return Err(AppError::not_found("Project", project_id).into());
            }
            info!(project_id, "Project deleted");
            Ok(())
        })
    }

    /// Projects with task counters. Every catalog task counts towards the
    /// total; done tasks are those whose status is SIM or NÃO SE APLICA.
    pub fn projects_summary(&self) -> Result<Vec<ProjectSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.name, p.category,
                        (SELECT COUNT(*) FROM tasks) AS total_tasks,
                        (SELECT COUNT(*) FROM project_tasks pt
                          WHERE pt.project_id = p.id AND pt.status IN (?1, ?2)) AS done_tasks
                 FROM projects p
                 ORDER BY p.name",
            )?;
            let summaries = stmt
                .query_map(params![Status::Sim, Status::NaoSeAplica], |row| {
                    Ok(ProjectSummary {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        category: row.get("category")?,
                        total_tasks: row.get("total_tasks")?,
                        done_tasks: row.get("done_tasks")?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(summaries)
        })
    }
}
