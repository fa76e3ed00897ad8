//! End-to-end tests for importing the onboarding spreadsheet.

use onboarding_tracker::config::ImportConfig;
use onboarding_tracker::db::Database;
use onboarding_tracker::db::import::ImportOptions;
use onboarding_tracker::db::lookups::AuxTable;
use onboarding_tracker::error::{AppError, ErrorCode};
use onboarding_tracker::import::{ImportError, ImportPlan};
use onboarding_tracker::types::Status;
use std::io::Write;

const SPREADSHEET: &str = "\
ITENS,ATIVIDADE,DESCRIÇÃO,SETOR,RESPONSÁVEL,PROJETO A,PROJETO B
1.1,Contrato,Assinar contrato,Obras,Ana,SIM,
1.2,Alvará,,Legal,,,sim
1.3,Vistoria,Vistoria inicial,Obras,Bruno,,
";

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn plan(input: &str) -> ImportPlan {
    ImportPlan::from_reader(input.as_bytes(), &ImportConfig::default())
        .expect("Failed to parse spreadsheet")
}

fn table_count(db: &Database, table: &str) -> i64 {
    db.with_conn(|conn| {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    })
    .unwrap()
}

#[test]
fn import_creates_projects_tasks_and_status_rows() {
    let db = setup_db();
    let report = db
        .import_plan(&plan(SPREADSHEET), &ImportOptions::fresh())
        .unwrap();

    assert_eq!(report.projects, 2);
    assert_eq!(report.tasks, 3);
    assert_eq!(report.status_rows, 6);
    assert!(report.row_errors.is_empty());

    assert_eq!(table_count(&db, "projects"), 2);
    assert_eq!(table_count(&db, "tasks"), 3);
    assert_eq!(table_count(&db, "project_tasks"), 6);

    let matrix = db.status_matrix(None).unwrap();
    let names: Vec<&str> = matrix.projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["PROJETO A", "PROJETO B"]);

    let statuses: Vec<(String, Vec<Status>)> = matrix
        .rows
        .iter()
        .map(|row| (row.task.item_number.clone(), row.statuses.clone()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("1.1".to_string(), vec![Status::Sim, Status::NaoIniciado]),
            ("1.2".to_string(), vec![Status::NaoIniciado, Status::Sim]),
            (
                "1.3".to_string(),
                vec![Status::NaoIniciado, Status::NaoIniciado]
            ),
        ]
    );
}

#[test]
fn import_fills_lookups_and_task_references() {
    let db = setup_db();
    db.import_plan(&plan(SPREADSHEET), &ImportOptions::fresh())
        .unwrap();

    let sectors: Vec<String> = db
        .list_aux(AuxTable::Sectors)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(sectors, vec!["LEGAL", "OBRAS"]);

    let responsibles: Vec<String> = db
        .list_aux(AuxTable::Responsibles)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(responsibles, vec!["ANA", "BRUNO"]);

    let tasks = db.list_tasks_raw().unwrap();
    assert_eq!(tasks[0].sector_name.as_deref(), Some("OBRAS"));
    assert_eq!(tasks[0].responsible_name.as_deref(), Some("ANA"));
    assert_eq!(tasks[1].description, None);
    assert_eq!(tasks[1].responsible_name, None);
}

#[test]
fn repeated_header_rows_are_not_imported() {
    let input = "\
ITENS,ATIVIDADE,OBRA X
1.1,Contrato,SIM
ITENS,ATIVIDADE,OBRA X
1.2,Alvará,
";
    let db = setup_db();
    db.import_plan(&plan(input), &ImportOptions::fresh())
        .unwrap();

    let items: Vec<String> = db
        .list_tasks_raw()
        .unwrap()
        .into_iter()
        .map(|t| t.item_number)
        .collect();
    assert_eq!(items, vec!["1.1", "1.2"]);
}

#[test]
fn import_twice_with_replace_keeps_counts() {
    let db = setup_db();
    let parsed = plan(SPREADSHEET);
    db.import_plan(&parsed, &ImportOptions::fresh()).unwrap();

    let second = db.import_plan(&parsed, &ImportOptions::replace()).unwrap();
    assert_eq!(second.rows_deleted.get("tasks"), Some(&3));
    assert_eq!(second.rows_deleted.get("project_tasks"), Some(&6));

    assert_eq!(table_count(&db, "projects"), 2);
    assert_eq!(table_count(&db, "tasks"), 3);
    assert_eq!(table_count(&db, "project_tasks"), 6);
    assert_eq!(table_count(&db, "sectors"), 2);
    assert_eq!(table_count(&db, "responsibles"), 2);
}

#[test]
fn fresh_import_refuses_non_empty_database() {
    let db = setup_db();
    db.save_project("OBRA EXISTENTE", None, None).unwrap();

    let err = db
        .import_plan(&plan(SPREADSHEET), &ImportOptions::fresh())
        .unwrap_err();
    assert_eq!(AppError::from(err).code, ErrorCode::AlreadyExists);

    assert_eq!(table_count(&db, "projects"), 1);
    assert_eq!(table_count(&db, "tasks"), 0);
}

#[test]
fn missing_required_column_fails_before_database_writes() {
    let input = "\
ITENS,DESCRIÇÃO,PROJETO A
1.1,Assinar contrato,SIM
";
    let db = setup_db();
    db.save_project("OBRA EXISTENTE", None, None).unwrap();

    let err = ImportPlan::from_reader(input.as_bytes(), &ImportConfig::default()).unwrap_err();
    assert!(matches!(err, ImportError::MissingColumn(ref name) if name == "ATIVIDADE"));

    assert_eq!(table_count(&db, "projects"), 1);
}

#[test]
fn rows_without_title_are_imported_with_statuses() {
    let input = "\
ITENS,ATIVIDADE,OBRA X
1.1,Contrato,SIM
1.2,,SIM
1.3,Vistoria,
";
    let db = setup_db();
    let report = db
        .import_plan(&plan(input), &ImportOptions::fresh())
        .unwrap();

    assert_eq!(report.tasks, 3);
    assert_eq!(report.status_rows, 3);
    assert!(report.row_errors.is_empty());
    assert_eq!(table_count(&db, "tasks"), 3);

    let matrix = db.status_matrix(None).unwrap();
    let untitled = matrix
        .rows
        .iter()
        .find(|row| row.task.item_number == "1.2")
        .unwrap();
    assert_eq!(untitled.task.title, "");
    assert_eq!(untitled.statuses, vec![Status::Sim]);
}

#[test]
fn unknown_status_values_become_warnings() {
    let input = "\
ITENS,ATIVIDADE,OBRA X
1.1,Contrato,talvez
";
    let db = setup_db();
    let report = db
        .import_plan(&plan(input), &ImportOptions::fresh())
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("talvez"));

    let matrix = db.status_matrix(None).unwrap();
    assert_eq!(matrix.rows[0].statuses, vec![Status::NaoIniciado]);
}

#[test]
fn import_from_file_on_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all("\u{feff}".as_bytes()).unwrap();
    file.write_all(SPREADSHEET.as_bytes()).unwrap();
    file.flush().unwrap();

    let parsed = ImportPlan::from_path(file.path(), &ImportConfig::default()).unwrap();
    assert_eq!(parsed.projects, vec!["PROJETO A", "PROJETO B"]);
    assert_eq!(parsed.tasks.len(), 3);
    assert_eq!(parsed.status_row_count(), 6);
}

#[test]
fn imported_phases_link_tasks() {
    let input = "\
ITENS,ATIVIDADE,OBRA X
1,PRÉ-OBRA,
1.1,Contrato,SIM
2,OBRA,
2.1,Fundação,
";
    let db = setup_db();
    let report = db
        .import_plan(&plan(input), &ImportOptions::fresh())
        .unwrap();
    assert_eq!(report.phases, 2);

    let phases = db.list_phases().unwrap();
    let titles: Vec<(i64, Option<String>)> =
        phases.into_iter().map(|p| (p.number, p.title)).collect();
    assert_eq!(
        titles,
        vec![
            (1, Some("PRÉ-OBRA".to_string())),
            (2, Some("OBRA".to_string())),
        ]
    );

    let grid = db.global_grid().unwrap();
    let fundacao = grid.iter().find(|r| r.item_number == "2.1").unwrap();
    assert_eq!(fundacao.phase_title.as_deref(), Some("OBRA"));
}
