//! JSON API handlers.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use super::server::DashboardServer;
use crate::db::lookups::{AuxEdit, AuxTable, AuxUpdateSummary};
use crate::db::status::{StatusEdit, StatusMatrix, StatusRecord};
use crate::db::tasks::{NewTask, TaskEdit};
use crate::error::{AppError, AppResult};
use crate::report::{
    self, CountEntry, DashboardSummary, DistributionEntry, ProjectProgress, RadarRow,
    ReportFilter,
};
use crate::types::{
    AuxEntry, GlobalGridRow, Phase, Project, ProjectSummary, ProjectTaskRow, Status, TaskRecord,
};

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryParams {
    category: Option<String>,
}

/// Project list entry with its completion percentage.
#[derive(Debug, Serialize)]
pub(crate) struct ProjectListEntry {
    #[serde(flatten)]
    summary: ProjectSummary,
    percent: i64,
}

pub(crate) async fn list_projects(
    State(state): State<DashboardServer>,
    Query(params): Query<CategoryParams>,
) -> AppResult<Json<Vec<ProjectListEntry>>> {
    let category = params
        .category
        .as_deref()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty() && c != crate::db::projects::ALL_CATEGORIES);

    let entries = state
        .db()
        .projects_summary()?
        .into_iter()
        .filter(|s| category.is_none() || s.category == category)
        .map(|summary| ProjectListEntry {
            percent: summary.percent(),
            summary,
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveProjectRequest {
    #[serde(default)]
    id: Option<i64>,
    name: String,
    #[serde(default)]
    category: Option<String>,
}

pub(crate) async fn save_project(
    State(state): State<DashboardServer>,
    Json(request): Json<SaveProjectRequest>,
) -> AppResult<Json<Project>> {
    let project =
        state
            .db()
            .save_project(&request.name, request.category.as_deref(), request.id)?;
    Ok(Json(project))
}

pub(crate) async fn delete_project(
    State(state): State<DashboardServer>,
    Path(project_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.db().delete_project(project_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn project_grid(
    State(state): State<DashboardServer>,
    Path(project_id): Path<i64>,
) -> AppResult<Json<Vec<ProjectTaskRow>>> {
    Ok(Json(state.db().project_grid(project_id)?))
}

pub(crate) async fn global_grid(
    State(state): State<DashboardServer>,
) -> AppResult<Json<Vec<GlobalGridRow>>> {
    Ok(Json(state.db().global_grid()?))
}

pub(crate) async fn status_matrix(
    State(state): State<DashboardServer>,
    Query(params): Query<CategoryParams>,
) -> AppResult<Json<StatusMatrix>> {
    Ok(Json(state.db().status_matrix(params.category.as_deref())?))
}

#[derive(Debug, Serialize)]
pub(crate) struct CountResponse {
    count: usize,
}

pub(crate) async fn save_status_matrix(
    State(state): State<DashboardServer>,
    Json(edits): Json<Vec<StatusEdit>>,
) -> AppResult<Json<CountResponse>> {
    let count = state.db().save_status_matrix(&edits)?;
    Ok(Json(CountResponse { count }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectParams {
    project: Option<String>,
}

/// Everything the dashboard page charts.
#[derive(Debug, Serialize)]
pub(crate) struct DashboardResponse {
    summary: DashboardSummary,
    project_progress: Vec<ProjectProgress>,
    top_pending_sectors: Vec<CountEntry>,
    radar: Vec<RadarRow>,
    distribution: Vec<DistributionEntry>,
}

pub(crate) async fn dashboard_summary(
    State(state): State<DashboardServer>,
    Query(params): Query<ProjectParams>,
) -> AppResult<Json<DashboardResponse>> {
    let project = params.project.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let all_rows = state.db().global_grid()?;
    let rows: Vec<GlobalGridRow> = match project {
        Some(p) => all_rows.into_iter().filter(|r| r.project_name == p).collect(),
        None => all_rows,
    };

    Ok(Json(DashboardResponse {
        summary: DashboardSummary::compute(&rows, project),
        project_progress: report::project_progress(&rows),
        top_pending_sectors: report::top_pending_sectors(&rows, report::TOP_PENDING_SECTORS),
        radar: report::pending_radar(&rows, report::RADAR_ROWS),
        distribution: report::distribution(&rows),
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    project_id: i64,
    task_id: i64,
    status: String,
    /// When present, the write only succeeds if the stored version matches.
    #[serde(default)]
    expected_version: Option<i64>,
}

pub(crate) async fn upsert_status(
    State(state): State<DashboardServer>,
    Json(request): Json<StatusRequest>,
) -> AppResult<Json<StatusRecord>> {
    let status: Status = request
        .status
        .parse()
        .map_err(|e: String| AppError::invalid_value("status", e))?;

    let record = match request.expected_version {
        Some(version) => state.db().upsert_status_checked(
            request.project_id,
            request.task_id,
            status,
            version,
        )?,
        None => state
            .db()
            .upsert_status(request.project_id, request.task_id, status)?,
    };
    Ok(Json(record))
}

pub(crate) async fn list_tasks(
    State(state): State<DashboardServer>,
) -> AppResult<Json<Vec<TaskRecord>>> {
    Ok(Json(state.db().list_tasks_raw()?))
}

pub(crate) async fn create_task(
    State(state): State<DashboardServer>,
    Json(task): Json<NewTask>,
) -> AppResult<(StatusCode, Json<TaskRecord>)> {
    let created = state.db().create_task(&task)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkTasksResponse {
    updated: usize,
}

pub(crate) async fn bulk_tasks(
    State(state): State<DashboardServer>,
    Json(edits): Json<Vec<TaskEdit>>,
) -> AppResult<Json<BulkTasksResponse>> {
    let updated = state.db().save_bulk_tasks(&edits)?;
    Ok(Json(BulkTasksResponse { updated }))
}

pub(crate) async fn list_phases(State(state): State<DashboardServer>) -> AppResult<Json<Vec<Phase>>> {
    Ok(Json(state.db().list_phases()?))
}

pub(crate) async fn list_aux(
    State(state): State<DashboardServer>,
    Path(table): Path<String>,
) -> AppResult<Json<Vec<AuxEntry>>> {
    let table: AuxTable = table.parse()?;
    Ok(Json(state.db().list_aux(table)?))
}

pub(crate) async fn update_aux(
    State(state): State<DashboardServer>,
    Path(table): Path<String>,
    Json(edits): Json<Vec<AuxEdit>>,
) -> AppResult<Json<AuxUpdateSummary>> {
    let table: AuxTable = table.parse()?;
    Ok(Json(state.db().update_aux_list(table, &edits)?))
}

pub(crate) async fn delete_aux(
    State(state): State<DashboardServer>,
    Path((table, id)): Path<(String, i64)>,
) -> AppResult<StatusCode> {
    let table: AuxTable = table.parse()?;
    state.db().delete_aux(table, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build a report filter from raw query pairs.
///
/// `status` and `responsible` may repeat. Without any `status` pair the
/// default filter (PENDENTE) applies; an explicit `status=` with no value
/// selects every status.
pub(crate) fn report_filter_from_pairs(pairs: &[(String, String)]) -> AppResult<ReportFilter> {
    let mut filter = ReportFilter::default();
    let mut saw_status = false;
    let mut statuses = Vec::new();

    for (key, value) in pairs {
        let value = value.trim();
        match key.as_str() {
            "project" if !value.is_empty() => filter.project = Some(value.to_string()),
            "status" => {
                saw_status = true;
                if !value.is_empty() {
                    let status: Status = value
                        .parse()
                        .map_err(|e: String| AppError::invalid_value("status", e))?;
                    statuses.push(status);
                }
            }
            "responsible" if !value.is_empty() => filter.responsibles.push(value.to_string()),
            _ => {}
        }
    }
    if saw_status {
        filter.statuses = statuses;
    }
    Ok(filter)
}

pub(crate) async fn export_report(
    State(state): State<DashboardServer>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let filter = report_filter_from_pairs(&pairs)?;
    let matrix = state.db().status_matrix(None)?;
    let rows = report::build_report(&matrix, &filter);

    let mut body = Vec::new();
    report::write_csv(&rows, &mut body)?;

    let scope = filter.project.as_deref().unwrap_or("Geral");
    let file_name = report::report_file_name(scope, chrono::Local::now().naive_local());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    ))
}
