//! htmx fragment handlers. Each returns an HTML snippet swapped into a page.

use axum::{
    extract::{Form, Path, Query, State},
    response::Html,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use tracing::warn;

use super::api::report_filter_from_pairs;
use super::server::{DashboardServer, html_escape, status_options};
use crate::db::lookups::{AuxEdit, AuxTable};
use crate::db::tasks::TaskEdit;
use crate::report::{self, DashboardSummary, RiskKind};
use crate::types::{GlobalGridRow, ProjectTaskRow, Status, percent_floor};

/// Rows shown in the report preview table.
const PREVIEW_ROWS: usize = 500;

fn error_fragment(context: &str, err: impl std::fmt::Display) -> Html<String> {
    warn!(error = %err, "{}", context);
    Html(format!(
        r#"<div class="message message-error">{}: {}</div>"#,
        html_escape(context),
        html_escape(&err.to_string())
    ))
}

fn success_fragment(message: &str) -> Html<String> {
    Html(format!(
        r#"<div class="message message-success">{}</div>"#,
        html_escape(message)
    ))
}

/// `<option>` elements for `values`. A selected value missing from the list
/// is rendered first so that saving the row submits it unchanged.
fn option_list<'a>(values: impl Iterator<Item = &'a str>, selected: Option<&str>) -> String {
    let mut found = false;
    let listed: String = values
        .map(|v| {
            let is_selected = Some(v) == selected;
            found |= is_selected;
            format!(
                r#"<option value="{0}"{1}>{0}</option>"#,
                html_escape(v),
                if is_selected { " selected" } else { "" }
            )
        })
        .collect();
    match selected {
        Some(current) if !found && !current.is_empty() => format!(
            r#"<option value="{0}" selected>{0}</option>{1}"#,
            html_escape(current),
            listed
        ),
        _ => listed,
    }
}

fn metric_card(label: &str, value: &str, sub: &str, color: &str) -> String {
    format!(
        r#"<div class="card stat">
            <div class="stat-label">{}</div>
            <div class="stat-value">{}</div>
            <div class="stat-sub" style="color:{}">{}</div>
        </div>"#,
        html_escape(label),
        html_escape(value),
        color,
        html_escape(sub)
    )
}

fn progress_bar(percent: i64, color: &str) -> String {
    format!(
        r#"<div class="bar"><div style="width:{}%; background:{};"></div></div>"#,
        percent.clamp(0, 100),
        color
    )
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectFilterParams {
    project: Option<String>,
}

/// KPIs, charts and radar for the dashboard page.
pub(crate) async fn dashboard_overview(
    State(state): State<DashboardServer>,
    Query(params): Query<ProjectFilterParams>,
) -> Html<String> {
    let rows = match state.db().global_grid() {
        Ok(rows) => rows,
        Err(e) => return error_fragment("Falha ao carregar o painel", e),
    };
    if rows.is_empty() {
        return Html(r#"<div class="empty-state">Nenhum dado encontrado.</div>"#.to_string());
    }

    let project = params.project.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let rows: Vec<GlobalGridRow> = match project {
        Some(p) => rows.into_iter().filter(|r| r.project_name == p).collect(),
        None => rows,
    };
    let summary = DashboardSummary::compute(&rows, project);

    let mut html = String::new();
    let suffix = project.map(|p| format!(": {}", p)).unwrap_or_else(|| " (Consolidado)".to_string());
    let _ = write!(html, "<h4>Visão Geral{}</h4>", html_escape(&suffix));

    let (risk_label, risk_default) = match summary.risk_kind {
        RiskKind::Project => ("Obra com Mais Pendências", "Nenhuma"),
        RiskKind::Sector => ("Gargalo no Setor", "Nenhum"),
    };
    let (risk_name, risk_count) = summary
        .top_risk
        .as_ref()
        .map(|r| (r.label.as_str(), r.count))
        .unwrap_or((risk_default, 0));

    html.push_str(r#"<div class="grid grid-stats">"#);
    html.push_str(&metric_card("Total", &summary.total.to_string(), "Atividades", "#888"));
    html.push_str(&metric_card(
        "Progresso",
        &format!("{}%", summary.progress),
        &format!("{} Concluídos", summary.done),
        Status::Sim.color(),
    ));
    html.push_str(&metric_card(
        "Risco",
        &summary.pending.to_string(),
        "Pendentes",
        Status::Pendente.color(),
    ));
    html.push_str(&metric_card(
        risk_label,
        risk_name,
        &format!("{} Itens", risk_count),
        "#E37026",
    ));
    html.push_str("</div>");

    html.push_str(r#"<div class="grid" style="grid-template-columns: 3fr 2fr; margin-top:1rem;">"#);

    html.push_str(r#"<div class="card">"#);
    if project.is_none() {
        html.push_str("<h4>Comparativo de Progresso por Obra</h4>");
        for p in report::project_progress(&rows) {
            let _ = write!(
                html,
                r#"<div style="margin-bottom:0.5rem;"><span>{}</span> <strong>{}%</strong>{}</div>"#,
                html_escape(&p.project),
                p.percent,
                progress_bar(p.percent, "#E37026")
            );
        }
    } else {
        html.push_str("<h4>Distribuição (Etapa &gt; Setor)</h4><table><thead><tr><th>Etapa</th><th>Setor</th><th>Status</th><th>Qtd</th></tr></thead><tbody>");
        for entry in report::distribution(&rows) {
            let _ = write!(
                html,
                r#"<tr><td>{}</td><td>{}</td><td style="color:{}">{}</td><td>{}</td></tr>"#,
                html_escape(&entry.stage),
                html_escape(&entry.sector),
                entry.status.color(),
                entry.status,
                entry.count
            );
        }
        html.push_str("</tbody></table>");
    }
    html.push_str("</div>");

    html.push_str(r#"<div class="card"><h4>Top Pendências</h4>"#);
    let sectors = report::top_pending_sectors(&rows, report::TOP_PENDING_SECTORS);
    match sectors.first().map(|s| s.count) {
        None => html.push_str(r#"<div class="message message-success">Sem pendências críticas.</div>"#),
        Some(max) => {
            for sector in &sectors {
                let width = percent_floor(sector.count as i64, max as i64);
                let _ = write!(
                    html,
                    r#"<div style="margin-bottom:0.5rem;"><span>{}</span> <strong>{}</strong>{}</div>"#,
                    html_escape(&sector.label),
                    sector.count,
                    progress_bar(width, Status::Pendente.color())
                );
            }
        }
    }
    html.push_str("</div></div>");

    html.push_str(r#"<div class="card" style="margin-top:1rem;"><h4>Radar de Atividades</h4>"#);
    let radar = report::pending_radar(&rows, report::RADAR_ROWS);
    if radar.is_empty() {
        html.push_str(r#"<div class="empty-state">Nenhuma pendência.</div>"#);
    } else {
        html.push_str("<table><thead><tr><th>Obra</th><th>Item</th><th>Etapa</th><th>Responsável</th><th>Status</th></tr></thead><tbody>");
        for row in radar {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{} - {}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&row.project),
                html_escape(&row.item_number),
                html_escape(&row.title),
                html_escape(row.stage.as_deref().unwrap_or_default()),
                html_escape(row.responsible.as_deref().unwrap_or_default()),
                row.status
            );
        }
        html.push_str("</tbody></table>");
    }
    html.push_str("</div>");

    Html(html)
}

/// Project `<option>` list with an "all projects" entry.
pub(crate) async fn project_options(State(state): State<DashboardServer>) -> Html<String> {
    let mut html = String::from(r#"<option value="">Todas as Obras</option>"#);
    let projects = match state.db().list_projects(None) {
        Ok(projects) => projects,
        Err(e) => {
            warn!(error = %e, "Failed to load project options");
            return Html(html);
        }
    };
    html.push_str(&option_list(projects.iter().map(|p| p.name.as_str()), None));
    Html(html)
}

// =============================================================================
// Projects
// =============================================================================

fn render_project_cards(state: &DashboardServer) -> String {
    let summaries = match state.db().projects_summary() {
        Ok(s) => s,
        Err(e) => return error_fragment("Falha ao carregar obras", e).0,
    };
    if summaries.is_empty() {
        return r#"<div class="empty-state">Nenhuma obra cadastrada.</div>"#.to_string();
    }

    let mut html = String::from(r#"<div class="grid grid-cards">"#);
    for project in &summaries {
        let pct = project.percent();
        let color = if pct == 100 { "#22c55e" } else { "#3b82f6" };
        let _ = write!(
            html,
            r##"<div class="card">
                <div style="display:flex; justify-content:space-between;">
                    <a href="/projects/{id}"><strong>{name}</strong></a>
                    <strong style="color:{color}">{pct}%</strong>
                </div>
                <span class="tag">{category}</span>
                <div class="stat-label">Progresso {done}/{total}</div>
                {bar}
                <button hx-post="/api/projects/{id}/remove"
                        hx-target="#project-cards"
                        hx-confirm="Excluir {name}? Todos os status desta obra serão apagados.">Excluir</button>
            </div>"##,
            id = project.id,
            name = html_escape(&project.name),
            color = color,
            pct = pct,
            category = html_escape(project.category.as_deref().unwrap_or("-")),
            done = project.done_tasks,
            total = project.total_tasks,
            bar = progress_bar(pct, color),
        );
    }
    html.push_str("</div>");
    html
}

pub(crate) async fn project_cards(State(state): State<DashboardServer>) -> Html<String> {
    Html(render_project_cards(&state))
}

pub(crate) async fn category_options(State(state): State<DashboardServer>) -> Html<String> {
    let categories = &state.config().catalog.project_categories;
    Html(option_list(categories.iter().map(String::as_str), None))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectForm {
    #[serde(default)]
    id: Option<i64>,
    name: String,
    #[serde(default)]
    category: Option<String>,
}

pub(crate) async fn project_save(
    State(state): State<DashboardServer>,
    Form(form): Form<ProjectForm>,
) -> Html<String> {
    let mut html = match state
        .db()
        .save_project(&form.name, form.category.as_deref(), form.id)
    {
        Ok(project) => success_fragment(&format!("Obra '{}' salva.", project.name)).0,
        Err(e) => error_fragment("Falha ao salvar obra", e).0,
    };
    html.push_str(&render_project_cards(&state));
    Html(html)
}

pub(crate) async fn project_remove(
    State(state): State<DashboardServer>,
    Path(project_id): Path<i64>,
) -> Html<String> {
    let mut html = match state.db().delete_project(project_id) {
        Ok(()) => success_fragment("Obra excluída.").0,
        Err(e) => error_fragment("Falha ao excluir obra", e).0,
    };
    html.push_str(&render_project_cards(&state));
    Html(html)
}

// =============================================================================
// Project management
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ManageParams {
    sector: Option<String>,
    status: Option<String>,
}

fn status_bar(task_id: i64, status: Status) -> String {
    format!(
        r#"<div id="status-bar-{}" class="status-bar" style="background:{};"></div>"#,
        task_id,
        status.color()
    )
}

fn render_task_row(project_id: i64, row: &ProjectTaskRow) -> String {
    let mut tags = String::new();
    if let Some(sector) = &row.sector {
        let _ = write!(tags, r#"<span class="tag">{}</span>"#, html_escape(sector));
    }
    if let Some(area) = &row.area {
        let _ = write!(tags, r#"<span class="tag">{}</span>"#, html_escape(area));
    }
    let description = row
        .description
        .as_deref()
        .map(|d| format!(r#"<div class="description">{}</div>"#, html_escape(d)))
        .unwrap_or_default();

    format!(
        r##"<div class="task-row">
            {bar}
            <div class="content">
                <div><strong>{item} - {title}</strong></div>
                <div>{tags}</div>
                {description}
            </div>
            <select name="status"
                    hx-post="/api/status/form"
                    hx-vals='{{"project_id": {project_id}, "task_id": {task_id}}}'
                    hx-target="#status-bar-{task_id}"
                    hx-swap="outerHTML">{options}</select>
        </div>"##,
        bar = status_bar(row.task_id, row.status),
        item = html_escape(&row.item_number),
        title = html_escape(&row.title),
        tags = tags,
        description = description,
        project_id = project_id,
        task_id = row.task_id,
        options = status_options(Some(row.status)),
    )
}

/// Status rows of one project grouped by phase, with optional filters.
pub(crate) async fn project_manage(
    State(state): State<DashboardServer>,
    Path(project_id): Path<i64>,
    Query(params): Query<ManageParams>,
) -> Html<String> {
    let rows = match state.db().project_grid(project_id) {
        Ok(rows) => rows,
        Err(e) => return error_fragment("Falha ao carregar obra", e),
    };

    let sector = params.sector.as_deref().filter(|s| !s.is_empty());
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(Status::normalize);
    let rows = report::filter_project_rows(rows, sector, status);
    if rows.is_empty() {
        return Html(
            r#"<div class="empty-state">Nenhuma atividade corresponde aos filtros.</div>"#
                .to_string(),
        );
    }

    let mut html = String::new();
    for group in report::group_by_phase(rows) {
        let _ = write!(
            html,
            r#"<div class="phase-header">FASE {}</div>"#,
            html_escape(&group.group)
        );
        for row in &group.rows {
            html.push_str(&render_task_row(project_id, row));
        }
    }
    Html(html)
}

/// Sector `<option>` list for one project's filter.
pub(crate) async fn sector_options(
    State(state): State<DashboardServer>,
    Path(project_id): Path<i64>,
) -> Html<String> {
    let mut html = String::from(r#"<option value="">Todos</option>"#);
    let rows = match state.db().project_grid(project_id) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, project_id, "Failed to load sector options");
            return Html(html);
        }
    };
    let sectors: BTreeSet<&str> = rows.iter().filter_map(|r| r.sector.as_deref()).collect();
    html.push_str(&option_list(sectors.into_iter(), None));
    Html(html)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusForm {
    project_id: i64,
    task_id: i64,
    status: String,
}

/// Single status change from a management select. Returns the new status bar.
pub(crate) async fn status_form(
    State(state): State<DashboardServer>,
    Form(form): Form<StatusForm>,
) -> Html<String> {
    let status = match form.status.parse::<Status>() {
        Ok(s) => s,
        Err(e) => return error_fragment("Status inválido", e),
    };
    match state.db().upsert_status(form.project_id, form.task_id, status) {
        Ok(record) => Html(status_bar(record.task_id, record.status)),
        Err(e) => error_fragment("Falha ao salvar status", e),
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Editable task catalog table.
pub(crate) async fn settings_tasks(State(state): State<DashboardServer>) -> Html<String> {
    let db = state.db();
    let loaded = db.list_tasks_raw().and_then(|tasks| {
        let sectors = db.list_aux(AuxTable::Sectors)?;
        let responsibles = db.list_aux(AuxTable::Responsibles)?;
        Ok((tasks, sectors, responsibles))
    });
    let (tasks, sectors, responsibles) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => return error_fragment("Falha ao carregar atividades", e),
    };
    if tasks.is_empty() {
        return Html(r#"<div class="empty-state">Nenhuma atividade cadastrada.</div>"#.to_string());
    }

    let stages = &state.config().catalog.stage_options;
    let mut html = String::from(
        "<table><thead><tr><th>Item</th><th>Atividade</th><th>Área</th><th>Etapa</th>\
         <th>Setor</th><th>Responsável</th><th>Descrição</th><th></th></tr></thead><tbody>",
    );
    for task in &tasks {
        let blank = r#"<option value=""></option>"#;
        let _ = write!(
            html,
            r##"<tr>
                <td>{item}</td>
                <td>{title}</td>
                <td><input type="text" name="area" value="{area}"></td>
                <td><select name="stage">{blank}{stages}</select></td>
                <td><select name="sector_name">{blank}{sectors}</select></td>
                <td><select name="responsible_name">{blank}{responsibles}</select></td>
                <td><input type="text" name="description" value="{description}"></td>
                <td><button hx-post="/api/settings/tasks/{id}"
                            hx-include="closest tr"
                            hx-target="#settings-message">Salvar</button></td>
            </tr>"##,
            id = task.id,
            item = html_escape(&task.item_number),
            title = html_escape(&task.title),
            area = html_escape(task.area.as_deref().unwrap_or_default()),
            blank = blank,
            stages = option_list(stages.iter().map(String::as_str), task.stage.as_deref()),
            sectors = option_list(
                sectors.iter().map(|s| s.name.as_str()),
                task.sector_name.as_deref()
            ),
            responsibles = option_list(
                responsibles.iter().map(|r| r.name.as_str()),
                task.responsible_name.as_deref()
            ),
            description = html_escape(task.description.as_deref().unwrap_or_default()),
        );
    }
    html.push_str("</tbody></table>");
    Html(html)
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskEditForm {
    #[serde(default)]
    area: Option<String>,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sector_name: Option<String>,
    #[serde(default)]
    responsible_name: Option<String>,
}

pub(crate) async fn settings_task_save(
    State(state): State<DashboardServer>,
    Path(task_id): Path<i64>,
    Form(form): Form<TaskEditForm>,
) -> Html<String> {
    let edit = TaskEdit {
        id: task_id,
        area: form.area,
        stage: form.stage,
        description: form.description,
        sector_name: form.sector_name,
        responsible_name: form.responsible_name,
    };
    match state.db().save_bulk_tasks(&[edit]) {
        Ok(_) => success_fragment("Atividade atualizada."),
        Err(e) => error_fragment("Falha ao salvar atividade", e),
    }
}

fn render_aux_list(state: &DashboardServer, table: AuxTable) -> String {
    let entries = match state.db().list_aux(table) {
        Ok(entries) => entries,
        Err(e) => return error_fragment("Falha ao carregar lista", e).0,
    };
    let slug = table.table_name();

    let mut html = String::from("<table><tbody>");
    for entry in &entries {
        let _ = write!(
            html,
            r##"<tr><td>{name}</td><td><button hx-post="/api/settings/aux/{slug}/{id}/remove"
                hx-target="#aux-{slug}"
                hx-confirm="Remover {name}?">Remover</button></td></tr>"##,
            name = html_escape(&entry.name),
            slug = slug,
            id = entry.id,
        );
    }
    html.push_str("</tbody></table>");
    let _ = write!(
        html,
        r##"<form hx-post="/api/settings/aux/{slug}" hx-target="#aux-{slug}">
            <input type="text" name="name" required>
            <button type="submit">Adicionar</button>
        </form>"##,
        slug = slug
    );
    html
}

pub(crate) async fn settings_aux(
    State(state): State<DashboardServer>,
    Path(table): Path<String>,
) -> Html<String> {
    match table.parse::<AuxTable>() {
        Ok(table) => Html(render_aux_list(&state, table)),
        Err(e) => error_fragment("Lista desconhecida", e),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuxForm {
    name: String,
}

pub(crate) async fn settings_aux_add(
    State(state): State<DashboardServer>,
    Path(table): Path<String>,
    Form(form): Form<AuxForm>,
) -> Html<String> {
    let table = match table.parse::<AuxTable>() {
        Ok(table) => table,
        Err(e) => return error_fragment("Lista desconhecida", e),
    };
    let edit = AuxEdit {
        id: None,
        name: form.name,
    };
    match state.db().update_aux_list(table, &[edit]) {
        Ok(_) => Html(render_aux_list(&state, table)),
        Err(e) => {
            let mut html = error_fragment("Falha ao atualizar lista", e).0;
            html.push_str(&render_aux_list(&state, table));
            Html(html)
        }
    }
}

pub(crate) async fn settings_aux_remove(
    State(state): State<DashboardServer>,
    Path((table, id)): Path<(String, i64)>,
) -> Html<String> {
    let table = match table.parse::<AuxTable>() {
        Ok(table) => table,
        Err(e) => return error_fragment("Lista desconhecida", e),
    };
    match state.db().delete_aux(table, id) {
        Ok(()) => Html(render_aux_list(&state, table)),
        Err(e) => {
            let mut html = error_fragment("Falha ao remover item", e).0;
            html.push_str(&render_aux_list(&state, table));
            Html(html)
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Filtered report table.
pub(crate) async fn report_preview(
    State(state): State<DashboardServer>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Html<String> {
    let filter = match report_filter_from_pairs(&pairs) {
        Ok(filter) => filter,
        Err(e) => return error_fragment("Filtro inválido", e),
    };
    let matrix = match state.db().status_matrix(None) {
        Ok(matrix) => matrix,
        Err(e) => return error_fragment("Falha ao carregar relatório", e),
    };
    if matrix.projects.is_empty() {
        return Html(
            r#"<div class="empty-state">Não foram encontradas obras para gerar relatório.</div>"#
                .to_string(),
        );
    }
    let rows = report::build_report(&matrix, &filter);

    let mut html = format!(
        r#"<div class="card stat"><div class="stat-label">Itens Encontrados</div><div class="stat-value">{}</div></div>"#,
        rows.len()
    );
    html.push_str("<table><thead><tr>");
    for header in report::REPORT_HEADERS {
        let _ = write!(html, "<th>{}</th>", html_escape(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows.iter().take(PREVIEW_ROWS) {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_escape(&row.project),
            html_escape(&row.item_number),
            html_escape(&row.activity),
            row.status,
            html_escape(row.responsible.as_deref().unwrap_or_default()),
            html_escape(row.sector.as_deref().unwrap_or_default()),
            html_escape(row.description.as_deref().unwrap_or_default()),
        );
    }
    html.push_str("</tbody></table>");
    if rows.len() > PREVIEW_ROWS {
        let _ = write!(
            html,
            r#"<div class="empty-state">Mostrando {} de {} itens. Baixe o CSV para ver todos.</div>"#,
            PREVIEW_ROWS,
            rows.len()
        );
    }
    Html(html)
}

/// Responsible `<option>` list for the report filter.
pub(crate) async fn responsible_options(State(state): State<DashboardServer>) -> Html<String> {
    let responsibles = match state.db().list_aux(AuxTable::Responsibles) {
        Ok(responsibles) => responsibles,
        Err(e) => {
            warn!(error = %e, "Failed to load responsible options");
            return Html(String::new());
        }
    };
    Html(option_list(responsibles.iter().map(|r| r.name.as_str()), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ImportConfig};
    use crate::db::Database;
    use crate::db::import::ImportOptions;
    use crate::import::ImportPlan;
    use std::sync::Arc;

    const SPREADSHEET: &str = "\
ITENS,ATIVIDADE,DESCRIÇÃO,SETOR,RESPONSÁVEL,ETAPA,OBRA A
1.1,Contrato,Assinar contrato,Obras,Ana,MONTAGEM,PENDENTE
";

    fn setup_server() -> DashboardServer {
        let db = Database::open_in_memory().expect("Failed to create in-memory database");
        let plan = ImportPlan::from_reader(SPREADSHEET.as_bytes(), &ImportConfig::default())
            .expect("Failed to parse spreadsheet");
        db.import_plan(&plan, &ImportOptions::fresh())
            .expect("Failed to import");
        DashboardServer::new(Arc::new(db), Arc::new(Config::default()))
    }

    /// Value a browser would submit for the named `<select>`.
    fn selected_value(html: &str, name: &str) -> Option<String> {
        let start = html.find(&format!(r#"name="{}">"#, name))?;
        let select = &html[start..];
        let select = &select[..select.find("</select>")?];
        let end = select.find(r#"" selected>"#)?;
        let value_start = select[..end].rfind(r#"value=""#)? + r#"value=""#.len();
        Some(select[value_start..end].to_string())
    }

    #[test]
    fn test_option_list_keeps_off_list_selection() {
        let html = option_list(["PRÉ-OBRA", "EXECUÇÃO"].into_iter(), Some("montagem"));
        assert!(html.starts_with(r#"<option value="montagem" selected>montagem</option>"#));
        assert_eq!(html.matches(" selected").count(), 1);

        let listed = option_list(["PRÉ-OBRA", "EXECUÇÃO"].into_iter(), Some("EXECUÇÃO"));
        assert_eq!(listed.matches("<option").count(), 2);
        assert!(listed.contains(r#"<option value="EXECUÇÃO" selected>"#));

        let blank = option_list(["PRÉ-OBRA"].into_iter(), Some(""));
        assert!(!blank.contains("selected"));
    }

    #[tokio::test]
    async fn test_settings_tasks_selects_stored_values() {
        let server = setup_server();
        let Html(html) = settings_tasks(State(server)).await;

        assert_eq!(selected_value(&html, "stage").as_deref(), Some("MONTAGEM"));
        assert_eq!(selected_value(&html, "sector_name").as_deref(), Some("OBRAS"));
        assert_eq!(selected_value(&html, "responsible_name").as_deref(), Some("ANA"));
    }

    #[tokio::test]
    async fn test_settings_save_keeps_untouched_fields() {
        let server = setup_server();
        let task_id = server.db().list_tasks_raw().unwrap()[0].id;
        let Html(html) = settings_tasks(State(server.clone())).await;

        // Submit the row as rendered, changing only the description.
        let form = TaskEditForm {
            area: Some(String::new()),
            stage: selected_value(&html, "stage"),
            description: Some("Contrato revisado".to_string()),
            sector_name: selected_value(&html, "sector_name"),
            responsible_name: selected_value(&html, "responsible_name"),
        };
        let Html(reply) = settings_task_save(State(server.clone()), Path(task_id), Form(form)).await;
        assert!(reply.contains("message-success"), "{}", reply);

        let task = server.db().get_task(task_id).unwrap().unwrap();
        assert_eq!(task.description.as_deref(), Some("Contrato revisado"));
        assert_eq!(task.stage.as_deref(), Some("MONTAGEM"));
        assert_eq!(task.sector_name.as_deref(), Some("OBRAS"));
        assert_eq!(task.responsible_name.as_deref(), Some("ANA"));
        assert_eq!(task.area, None);
    }

    #[tokio::test]
    async fn test_settings_save_reports_unknown_sector() {
        let server = setup_server();
        let task_id = server.db().list_tasks_raw().unwrap()[0].id;
        let form = TaskEditForm {
            area: None,
            stage: Some("MONTAGEM".to_string()),
            description: None,
            sector_name: Some("INEXISTENTE".to_string()),
            responsible_name: None,
        };
        let Html(reply) = settings_task_save(State(server.clone()), Path(task_id), Form(form)).await;
        assert!(reply.contains("Falha ao salvar atividade"), "{}", reply);

        let task = server.db().get_task(task_id).unwrap().unwrap();
        assert_eq!(task.sector_name.as_deref(), Some("OBRAS"));
    }

    #[tokio::test]
    async fn test_option_fragments_fall_back_on_load_failure() {
        let server = setup_server();
        let project_id = server.db().list_projects(None).unwrap()[0].id;

        let Html(before) = sector_options(State(server.clone()), Path(project_id)).await;
        assert!(before.contains(r#"<option value="OBRAS">"#));

        server
            .db()
            .with_conn(|conn| {
                conn.execute_batch("DROP TABLE project_tasks; DROP TABLE responsibles;")?;
                Ok(())
            })
            .unwrap();

        let Html(sectors) = sector_options(State(server.clone()), Path(project_id)).await;
        assert_eq!(sectors, r#"<option value="">Todos</option>"#);
        let Html(responsibles) = responsible_options(State(server)).await;
        assert!(responsibles.is_empty());
    }

    #[tokio::test]
    async fn test_status_form_stores_status_and_renders_bar() {
        let server = setup_server();
        let project_id = server.db().list_projects(None).unwrap()[0].id;
        let task_id = server.db().list_tasks_raw().unwrap()[0].id;

        let form = StatusForm {
            project_id,
            task_id,
            status: "SIM".to_string(),
        };
        let Html(html) = status_form(State(server.clone()), Form(form)).await;
        assert!(html.contains(&format!(r#"id="status-bar-{}""#, task_id)));
        assert!(html.contains(Status::Sim.color()));

        let matrix = server.db().status_matrix(None).unwrap();
        assert_eq!(matrix.get(task_id, project_id), Some(Status::Sim));
    }

    #[tokio::test]
    async fn test_status_form_rejects_unknown_status() {
        let server = setup_server();
        let project_id = server.db().list_projects(None).unwrap()[0].id;
        let task_id = server.db().list_tasks_raw().unwrap()[0].id;

        let form = StatusForm {
            project_id,
            task_id,
            status: "TALVEZ".to_string(),
        };
        let Html(html) = status_form(State(server.clone()), Form(form)).await;
        assert!(html.contains("Status inválido"));

        let matrix = server.db().status_matrix(None).unwrap();
        assert_eq!(matrix.get(task_id, project_id), Some(Status::Pendente));
    }
}
