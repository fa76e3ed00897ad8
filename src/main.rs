//! Onboarding Tracker
//!
//! Web dashboard, spreadsheet import and CSV reporting for the onboarding
//! checklist of a network of projects.

use anyhow::Result;
use clap::Parser;
use flate2::Compression;
use flate2::write::GzEncoder;
use onboarding_tracker::cli::import::ImportArgs;
use onboarding_tracker::cli::report::ReportArgs;
use onboarding_tracker::cli::{Cli, Command, ServeArgs};
use onboarding_tracker::config::{Config, ConfigLoader};
use onboarding_tracker::dashboard;
use onboarding_tracker::db::Database;
use onboarding_tracker::db::import::ImportOptions;
use onboarding_tracker::import::ImportPlan;
use onboarding_tracker::logging::{self, LogTarget};
use onboarding_tracker::report;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    // If explicit config path given, set it as env var for ConfigLoader to pick up
    // SAFETY: This is safe at program startup before any other threads are spawned
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("ONBOARDING_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    if let Some(path) = loader.config_path() {
        info!(path = %path.display(), "Loaded configuration");
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }

    match cli.command {
        Some(Command::Import(args)) => run_import(loader.into_config(), args),
        Some(Command::Report(args)) => run_report(loader.into_config(), args),
        Some(Command::Serve(args)) => run_server(loader.into_config(), args).await,
        None => run_server(loader.into_config(), ServeArgs::default()).await,
    }
}

/// Run the web dashboard until Ctrl-C.
async fn run_server(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.ui.port = port;
    }

    info!("Starting Onboarding Tracker v{}", env!("CARGO_PKG_VERSION"));

    let db = match Database::open(&config.server.db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(
                path = %config.server.db_path.display(),
                "Failed to open database: {:#}", e
            );
            return Err(e);
        }
    };
    info!(path = %config.server.db_path.display(), "Database ready");

    let ui = config.ui.clone();
    let config = Arc::new(config);
    let (shutdown_tx, addr) = dashboard::start_server(db, &ui, config).await?;
    eprintln!("Dashboard available at http://{}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, stopping");
    let _ = shutdown_tx.send(());

    Ok(())
}

/// Run the import command.
fn run_import(config: Config, args: ImportArgs) -> Result<()> {
    info!(
        file = %args.file.display(),
        mode = args.import_mode(),
        "Importing onboarding spreadsheet"
    );

    // Parsing happens before the database is opened so a malformed file
    // never leaves a half-written import behind.
    let plan = ImportPlan::from_path(&args.file, &config.import)?;
    for warning in &plan.warnings {
        warn!("{}", warning);
    }

    if args.dry_run {
        println!("Dry run - no changes will be made");
        println!();
        println!("File: {}", args.file.display());
        println!();
        println!("Would import:");
        println!("  Projects:     {}", plan.projects.len());
        println!("  Sectors:      {}", plan.sectors.len());
        println!("  Responsibles: {}", plan.responsibles.len());
        println!("  Phases:       {}", plan.phases.len());
        println!("  Tasks:        {}", plan.tasks.len());
        println!("  Status rows:  {}", plan.status_row_count());
        if !plan.warnings.is_empty() {
            println!();
            println!("Warnings: {}", plan.warnings.len());
            for warning in &plan.warnings {
                println!("  {}", warning);
            }
        }
        return Ok(());
    }

    let db = Database::open(&config.server.db_path)?;
    let options = if args.force {
        ImportOptions::replace()
    } else {
        ImportOptions::fresh()
    };

    let result = db.import_plan(&plan, &options)?;

    println!("Import completed successfully!");
    println!();
    if result.total_deleted() > 0 {
        println!("Deleted (replace mode):");
        for (table, count) in &result.rows_deleted {
            if *count > 0 {
                println!("  {}: {}", table, count);
            }
        }
        println!();
    }
    println!("Imported:");
    println!("  Projects:     {}", result.projects);
    println!("  Sectors:      {}", result.sectors);
    println!("  Responsibles: {}", result.responsibles);
    println!("  Phases:       {}", result.phases);
    println!("  Tasks:        {}", result.tasks);
    println!("  Status rows:  {}", result.status_rows);

    if !result.row_errors.is_empty() {
        println!();
        println!("Skipped rows: {}", result.row_errors.len());
        for row in &result.row_errors {
            println!("  line {} ({}): {}", row.line, row.item_number, row.message);
        }
    }
    if !result.warnings.is_empty() {
        println!();
        println!("Warnings: {}", result.warnings.len());
        for warning in &result.warnings {
            println!("  {}", warning);
        }
    }

    Ok(())
}

/// Run the report command.
fn run_report(config: Config, args: ReportArgs) -> Result<()> {
    let db = Database::open(&config.server.db_path)?;
    let matrix = db.status_matrix(None)?;
    let rows = report::build_report(&matrix, &args.filter());

    info!(rows = rows.len(), "Writing report");

    match &args.output {
        Some(path) => {
            let file = File::create(path)?;
            if args.is_gzipped() {
                let mut encoder = GzEncoder::new(file, Compression::default());
                report::write_csv(&rows, &mut encoder)?;
                encoder.finish()?;
            } else {
                report::write_csv(&rows, file)?;
            }
            eprintln!("Report written to {} ({} rows)", path.display(), rows.len());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            report::write_csv(&rows, &mut handle)?;
            handle.flush()?;
        }
    }

    Ok(())
}
