//! Web dashboard HTTP server module.
//!
//! Serves the dashboard pages, the htmx fragments they load and a JSON API
//! over the same database handle.

mod api;
mod fragments;
mod server;
pub mod templates;

pub use server::{DashboardServer, start_server};

/// Build the dashboard router without binding a socket.
pub fn router(db: std::sync::Arc<crate::db::Database>, config: std::sync::Arc<crate::config::Config>) -> axum::Router {
    server::build_router(DashboardServer::new(db, config))
}
