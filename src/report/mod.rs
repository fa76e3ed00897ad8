//! Reporting: dashboard aggregates and long-format CSV reports.
//!
//! Everything here is a pure function of rows already read from the
//! database, so it can be exercised without one.

mod aggregates;
mod export;

pub use aggregates::{
    CountEntry, DashboardSummary, DistributionEntry, MISSING_SECTOR, MISSING_STAGE, PhaseGroup,
    ProjectProgress, RadarRow, RiskKind, distribution, filter_project_rows, group_by_phase,
    pending_radar, project_progress, top_pending_sectors,
};
pub use export::{
    REPORT_HEADERS, REPORT_STATUS_OPTIONS, ReportFilter, ReportRow, build_report, melt,
    report_file_name, write_csv,
};

/// Sectors shown in the "top pending" chart.
pub const TOP_PENDING_SECTORS: usize = 5;
/// Rows shown in the pending radar table.
pub const RADAR_ROWS: usize = 10;
