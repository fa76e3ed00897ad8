//! HTML templates for the web dashboard.
//!
//! Templates are embedded at compile time using `include_str!`. Page bodies
//! are wrapped in the base layout by [`page`].

/// The base HTML layout with navigation.
pub const BASE_TEMPLATE: &str = include_str!("templates/base.html");

/// Cross-project dashboard with KPIs and charts.
pub const INDEX_TEMPLATE: &str = include_str!("templates/index.html");

/// Project list and creation form.
pub const PROJECTS_TEMPLATE: &str = include_str!("templates/projects.html");

/// Per-project management view with status selects.
pub const PROJECT_DETAIL_TEMPLATE: &str = include_str!("templates/project_detail.html");

/// Task catalog and auxiliary list editors.
pub const SETTINGS_TEMPLATE: &str = include_str!("templates/settings.html");

/// Report filters, preview and CSV download.
pub const REPORTS_TEMPLATE: &str = include_str!("templates/reports.html");

/// Navigation entry highlighted by the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Dashboard,
    Projects,
    Settings,
    Reports,
}

/// Wrap a page body in the base layout.
pub fn page(title: &str, nav: Nav, content: &str) -> String {
    let active = |entry: Nav| if entry == nav { "active" } else { "" };
    BASE_TEMPLATE
        .replace("{{title}}", title)
        .replace("{{nav_dashboard}}", active(Nav::Dashboard))
        .replace("{{nav_projects}}", active(Nav::Projects))
        .replace("{{nav_settings}}", active(Nav::Settings))
        .replace("{{nav_reports}}", active(Nav::Reports))
        .replace("{{content}}", content)
}
