//! HTTP server implementation for the web dashboard.
//!
//! This module provides the axum-based HTTP server that serves the dashboard
//! pages, the htmx fragments they load and the JSON API.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::templates::{self, Nav};
use super::{api, fragments};
use crate::config::{Config, UiConfig};
use crate::db::Database;
use crate::error::{AppError, ErrorCode};
use crate::types::Status;

/// Dashboard server state shared across handlers.
#[derive(Clone)]
pub struct DashboardServer {
    db: Arc<Database>,
    config: Arc<Config>,
}

impl DashboardServer {
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// Get the database reference.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.code {
            ErrorCode::MissingRequiredField | ErrorCode::InvalidFieldValue => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists | ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ConnectionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        warn!(code = ?self.code, error = %self.message, "Request failed");
        (status, Json(self)).into_response()
    }
}

/// Escape HTML special characters.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `<option>` list of the status vocabulary, with `selected` marked.
pub(crate) fn status_options(selected: Option<Status>) -> String {
    Status::ALL
        .iter()
        .map(|s| {
            format!(
                r#"<option value="{0}"{1}>{0}</option>"#,
                s.as_str(),
                if Some(*s) == selected { " selected" } else { "" }
            )
        })
        .collect()
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: &'static str,
}

/// Health check endpoint. Pings the database.
async fn health(State(state): State<DashboardServer>) -> impl IntoResponse {
    match state.db().ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version: env!("CARGO_PKG_VERSION"),
                database: "ok",
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    version: env!("CARGO_PKG_VERSION"),
                    database: "unavailable",
                }),
            )
        }
    }
}

// =============================================================================
// Pages
// =============================================================================

async fn root() -> Html<String> {
    Html(templates::page("Dashboard", Nav::Dashboard, templates::INDEX_TEMPLATE))
}

async fn projects_page() -> Html<String> {
    Html(templates::page("Obras", Nav::Projects, templates::PROJECTS_TEMPLATE))
}

async fn project_detail_page(
    State(state): State<DashboardServer>,
    Path(project_id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let project = state
        .db()
        .get_project(project_id)?
        .ok_or_else(|| AppError::not_found("Project", project_id))?;

    let body = templates::PROJECT_DETAIL_TEMPLATE
        .replace("{{project_id}}", &project.id.to_string())
        .replace("{{project_name}}", &html_escape(&project.name))
        .replace("{{status_options}}", &status_options(None));
    Ok(Html(templates::page(&html_escape(&project.name), Nav::Projects, &body)))
}

async fn settings_page() -> Html<String> {
    Html(templates::page("Configurações", Nav::Settings, templates::SETTINGS_TEMPLATE))
}

async fn reports_page() -> Html<String> {
    let checkboxes: String = crate::report::REPORT_STATUS_OPTIONS
        .iter()
        .map(|s| {
            format!(
                r#"<label><input type="checkbox" name="status" value="{0}"{1}> {0}</label>"#,
                s.as_str(),
                if *s == Status::Pendente { " checked" } else { "" }
            )
        })
        .collect();
    let body = templates::REPORTS_TEMPLATE.replace("{{status_checkboxes}}", &checkboxes);
    Html(templates::page("Relatórios", Nav::Reports, &body))
}

/// Build the router with all routes.
pub(crate) fn build_router(state: DashboardServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Page routes
        .route("/", get(root))
        .route("/projects", get(projects_page))
        .route("/projects/{project_id}", get(project_detail_page))
        .route("/settings", get(settings_page))
        .route("/reports", get(reports_page))
        // htmx fragment routes
        .route("/api/dashboard/overview", get(fragments::dashboard_overview))
        .route("/api/dashboard/project-options", get(fragments::project_options))
        .route("/api/projects/cards", get(fragments::project_cards))
        .route("/api/projects/category-options", get(fragments::category_options))
        .route("/api/projects/save", post(fragments::project_save))
        .route("/api/projects/{project_id}/remove", post(fragments::project_remove))
        .route("/api/projects/{project_id}/manage", get(fragments::project_manage))
        .route(
            "/api/projects/{project_id}/sector-options",
            get(fragments::sector_options),
        )
        .route("/api/status/form", post(fragments::status_form))
        .route("/api/settings/tasks", get(fragments::settings_tasks))
        .route("/api/settings/tasks/{task_id}", post(fragments::settings_task_save))
        .route(
            "/api/settings/aux/{table}",
            get(fragments::settings_aux).post(fragments::settings_aux_add),
        )
        .route(
            "/api/settings/aux/{table}/{id}/remove",
            post(fragments::settings_aux_remove),
        )
        .route("/api/reports/preview", get(fragments::report_preview))
        .route(
            "/api/reports/responsible-options",
            get(fragments::responsible_options),
        )
        // JSON API routes
        .route("/api/projects", get(api::list_projects).post(api::save_project))
        .route("/api/projects/{project_id}", delete(api::delete_project))
        .route("/api/projects/{project_id}/grid", get(api::project_grid))
        .route("/api/grid", get(api::global_grid))
        .route("/api/matrix", get(api::status_matrix).post(api::save_status_matrix))
        .route("/api/dashboard/summary", get(api::dashboard_summary))
        .route("/api/status", post(api::upsert_status))
        .route("/api/tasks", get(api::list_tasks).post(api::create_task))
        .route("/api/tasks/bulk", post(api::bulk_tasks))
        .route("/api/phases", get(api::list_phases))
        .route("/api/aux/{table}", get(api::list_aux).post(api::update_aux))
        .route("/api/aux/{table}/{id}", delete(api::delete_aux))
        .route("/api/reports/export.csv", get(api::export_report))
        .route("/api/health", get(health))
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    db: Arc<Database>,
    ui_config: &UiConfig,
    config: Arc<Config>,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let state = DashboardServer::new(db, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((ui_config.bind.as_str(), ui_config.port)).await?;
    let bound_addr = listener.local_addr()?;

    info!("Dashboard server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Dashboard server shutting down");
            })
            .await
        {
            tracing::error!("Dashboard server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            database: "ok",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("\"database\":\"ok\""));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<b>"A" & 'B'</b>"#),
            "&lt;b&gt;&quot;A&quot; &amp; &#39;B&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_status_options_marks_selected() {
        let html = status_options(Some(Status::Pendente));
        assert!(html.contains(r#"<option value="PENDENTE" selected>PENDENTE</option>"#));
        assert!(html.contains(r#"<option value="SIM">SIM</option>"#));
    }

    #[test]
    fn test_error_status_mapping() {
        let response = AppError::conflict(1, 2).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let response = AppError::not_found("Project", 9).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = AppError::missing_field("name").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
