//! Integration tests for the database layer.
//!
//! These tests verify the core database operations using an in-memory SQLite database.
//! Tests are organized by module and functionality.

use onboarding_tracker::db::Database;
use onboarding_tracker::db::lookups::{AuxEdit, AuxTable};
use onboarding_tracker::db::status::StatusEdit;
use onboarding_tracker::db::tasks::{NewTask, TaskEdit};
use onboarding_tracker::error::{AppError, ErrorCode};
use onboarding_tracker::types::{Project, Status, TaskRecord};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn error_code(err: anyhow::Error) -> ErrorCode {
    AppError::from(err).code
}

fn add_project(db: &Database, name: &str, category: Option<&str>) -> Project {
    db.save_project(name, category, None)
        .expect("Failed to create project")
}

fn add_task(db: &Database, item: &str, title: &str) -> TaskRecord {
    db.create_task(&NewTask {
        item_number: item.to_string(),
        title: title.to_string(),
        ..Default::default()
    })
    .expect("Failed to create task")
}

fn add_aux(db: &Database, table: AuxTable, names: &[&str]) {
    let edits: Vec<AuxEdit> = names
        .iter()
        .map(|name| AuxEdit {
            id: None,
            name: name.to_string(),
        })
        .collect();
    db.update_aux_list(table, &edits)
        .expect("Failed to update aux list");
}

fn count_status_rows(db: &Database) -> i64 {
    db.with_conn(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM project_tasks", [], |row| row.get(0))?)
    })
    .unwrap()
}

mod project_tests {
    use super::*;

    #[test]
    fn save_project_creates_and_renames() {
        let db = setup_db();

        let project = add_project(&db, "  OBRA CENTRO ", Some("Residencial"));
        assert_eq!(project.name, "OBRA CENTRO");
        assert_eq!(project.category.as_deref(), Some("RESIDENCIAL"));

        let renamed = db
            .save_project("OBRA NORTE", None, Some(project.id))
            .unwrap();
        assert_eq!(renamed.id, project.id);
        assert_eq!(renamed.name, "OBRA NORTE");
        assert_eq!(
            db.get_project_by_name("OBRA NORTE").unwrap().map(|p| p.id),
            Some(project.id)
        );
    }

    #[test]
    fn save_project_rejects_duplicate_name() {
        let db = setup_db();
        add_project(&db, "OBRA A", None);

        let err = db.save_project("OBRA A", None, None).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::AlreadyExists);
    }

    #[test]
    fn save_project_requires_name() {
        let db = setup_db();
        let err = db.save_project("   ", None, None).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::MissingRequiredField);
    }

    #[test]
    fn save_project_unknown_id_is_not_found() {
        let db = setup_db();
        let err = db.save_project("OBRA A", None, Some(42)).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }

    #[test]
    fn list_projects_filters_by_category() {
        let db = setup_db();
        add_project(&db, "OBRA B", Some("Comercial"));
        add_project(&db, "OBRA A", Some("Residencial"));

        let all: Vec<String> = db
            .list_projects(None)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(all, vec!["OBRA A", "OBRA B"]);

        let general = db.list_projects(Some("GERAL")).unwrap();
        assert_eq!(general.len(), 2);

        let commercial = db.list_projects(Some("Comercial")).unwrap();
        assert_eq!(commercial.len(), 1);
        assert_eq!(commercial[0].name, "OBRA B");
    }

    #[test]
    fn delete_project_removes_its_status_rows() {
        let db = setup_db();
        let keep = add_project(&db, "OBRA A", None);
        let gone = add_project(&db, "OBRA B", None);
        let task = add_task(&db, "1.1", "Contrato");

        db.upsert_status(keep.id, task.id, Status::Sim).unwrap();
        db.upsert_status(gone.id, task.id, Status::Pendente).unwrap();
        assert_eq!(count_status_rows(&db), 2);

        db.delete_project(gone.id).unwrap();

        assert_eq!(count_status_rows(&db), 1);
        assert!(db.get_project(gone.id).unwrap().is_none());
        let err = db.delete_project(gone.id).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }

    #[test]
    fn projects_summary_percent_is_floored() {
        let db = setup_db();
        let project = add_project(&db, "OBRA A", None);
        let tasks: Vec<TaskRecord> = (1..=10)
            .map(|i| add_task(&db, &format!("1.{}", i), &format!("Atividade {}", i)))
            .collect();

        for task in &tasks[..5] {
            db.upsert_status(project.id, task.id, Status::Sim).unwrap();
        }
        for task in &tasks[5..7] {
            db.upsert_status(project.id, task.id, Status::NaoSeAplica)
                .unwrap();
        }
        db.upsert_status(project.id, tasks[7].id, Status::Pendente)
            .unwrap();

        let summary = db.projects_summary().unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_tasks, 10);
        assert_eq!(summary[0].done_tasks, 7);
        assert_eq!(summary[0].percent(), 70);
    }

    #[test]
    fn projects_summary_with_empty_catalog_is_zero() {
        let db = setup_db();
        add_project(&db, "OBRA A", None);
        let summary = db.projects_summary().unwrap();
        assert_eq!(summary[0].percent(), 0);
    }
}

mod lookup_tests {
    use super::*;

    #[test]
    fn update_aux_list_normalises_and_skips() {
        let db = setup_db();

        let summary = db
            .update_aux_list(
                AuxTable::Sectors,
                &[
                    AuxEdit {
                        id: None,
                        name: " obras ".to_string(),
                    },
                    AuxEdit {
                        id: None,
                        name: "OBRAS".to_string(),
                    },
                    AuxEdit {
                        id: None,
                        name: "   ".to_string(),
                    },
                    AuxEdit {
                        id: None,
                        name: "legal".to_string(),
                    },
                ],
            )
            .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 2);

        let names: Vec<String> = db
            .list_aux(AuxTable::Sectors)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["LEGAL", "OBRAS"]);
    }

    #[test]
    fn update_aux_list_renames_by_id() {
        let db = setup_db();
        add_aux(&db, AuxTable::Responsibles, &["ana"]);
        let ana = db.list_aux(AuxTable::Responsibles).unwrap().remove(0);

        let summary = db
            .update_aux_list(
                AuxTable::Responsibles,
                &[AuxEdit {
                    id: Some(ana.id),
                    name: "ana paula".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(
            db.list_aux(AuxTable::Responsibles).unwrap()[0].name,
            "ANA PAULA"
        );
    }

    #[test]
    fn delete_aux_clears_task_reference() {
        let db = setup_db();
        add_aux(&db, AuxTable::Sectors, &["OBRAS"]);
        let task = db
            .create_task(&NewTask {
                item_number: "1.1".to_string(),
                title: "Contrato".to_string(),
                sector_name: Some("obras".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(task.sector_name.as_deref(), Some("OBRAS"));

        let sector = db.list_aux(AuxTable::Sectors).unwrap().remove(0);
        db.delete_aux(AuxTable::Sectors, sector.id).unwrap();

        let task = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(task.sector_name, None);
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn list_tasks_uses_numeric_item_order() {
        let db = setup_db();
        for item in ["2", "1.10", "1", "1.2"] {
            add_task(&db, item, "Atividade");
        }

        let items: Vec<String> = db
            .list_tasks_raw()
            .unwrap()
            .into_iter()
            .map(|t| t.item_number)
            .collect();
        assert_eq!(items, vec!["1", "1.2", "1.10", "2"]);
    }

    #[test]
    fn create_task_rejects_unknown_sector() {
        let db = setup_db();
        let err = db
            .create_task(&NewTask {
                item_number: "1.1".to_string(),
                title: "Contrato".to_string(),
                sector_name: Some("INEXISTENTE".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::InvalidFieldValue);
        assert!(db.list_tasks_raw().unwrap().is_empty());
    }

    #[test]
    fn bulk_edit_updates_metadata_and_resolves_names() {
        let db = setup_db();
        add_aux(&db, AuxTable::Sectors, &["OBRAS"]);
        add_aux(&db, AuxTable::Responsibles, &["ANA"]);
        let task = add_task(&db, "1.1", "Contrato");

        let updated = db
            .save_bulk_tasks(&[TaskEdit {
                id: task.id,
                area: Some("Jurídico".to_string()),
                stage: Some("Pré-obra".to_string()),
                description: Some("Assinar".to_string()),
                sector_name: Some("obras".to_string()),
                responsible_name: Some("Ana".to_string()),
            }])
            .unwrap();
        assert_eq!(updated, 1);

        let task = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(task.area.as_deref(), Some("Jurídico"));
        assert_eq!(task.stage.as_deref(), Some("Pré-obra"));
        assert_eq!(task.sector_name.as_deref(), Some("OBRAS"));
        assert_eq!(task.responsible_name.as_deref(), Some("ANA"));
    }

    #[test]
    fn bulk_edit_with_unknown_sector_changes_nothing() {
        let db = setup_db();
        add_aux(&db, AuxTable::Sectors, &["OBRAS"]);
        let first = add_task(&db, "1.1", "Contrato");
        let second = add_task(&db, "1.2", "Alvará");

        let err = db
            .save_bulk_tasks(&[
                TaskEdit {
                    id: first.id,
                    stage: Some("Pré-obra".to_string()),
                    sector_name: Some("OBRAS".to_string()),
                    ..Default::default()
                },
                TaskEdit {
                    id: second.id,
                    sector_name: Some("MARKETING".to_string()),
                    ..Default::default()
                },
            ])
            .unwrap_err();

        let app_err = AppError::from(err);
        assert_eq!(app_err.code, ErrorCode::InvalidFieldValue);
        assert_eq!(app_err.field.as_deref(), Some("sector_name"));

        let first = db.get_task(first.id).unwrap().unwrap();
        assert_eq!(first.stage, None);
        assert_eq!(first.sector_name, None);
    }

    #[test]
    fn bulk_edit_blank_name_clears_reference() {
        let db = setup_db();
        add_aux(&db, AuxTable::Responsibles, &["ANA"]);
        let task = db
            .create_task(&NewTask {
                item_number: "1.1".to_string(),
                title: "Contrato".to_string(),
                responsible_name: Some("ANA".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(task.responsible_name.as_deref(), Some("ANA"));

        db.save_bulk_tasks(&[TaskEdit {
            id: task.id,
            responsible_name: Some("  ".to_string()),
            ..Default::default()
        }])
        .unwrap();

        let task = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(task.responsible_name, None);
    }

    #[test]
    fn bulk_edit_unknown_task_is_not_found() {
        let db = setup_db();
        let err = db
            .save_bulk_tasks(&[TaskEdit {
                id: 999,
                ..Default::default()
            }])
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }
}

mod status_tests {
    use super::*;

    #[test]
    fn missing_status_reads_as_not_started() {
        let db = setup_db();
        let project = add_project(&db, "OBRA A", None);
        add_task(&db, "1.1", "Contrato");
        add_task(&db, "1.2", "Alvará");

        let grid = db.project_grid(project.id).unwrap();
        assert_eq!(grid.len(), 2);
        for row in &grid {
            assert_eq!(row.status, Status::NaoIniciado);
            assert_eq!(row.version, 0);
        }

        let matrix = db.status_matrix(None).unwrap();
        assert!(
            matrix
                .rows
                .iter()
                .all(|row| row.statuses == vec![Status::NaoIniciado])
        );
        assert!(
            db.global_grid()
                .unwrap()
                .iter()
                .all(|row| row.status == Status::NaoIniciado)
        );
    }

    #[test]
    fn project_grid_unknown_project_is_not_found() {
        let db = setup_db();
        let err = db.project_grid(7).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }

    #[test]
    fn upsert_updates_in_place() {
        let db = setup_db();
        let project = add_project(&db, "OBRA A", None);
        let task = add_task(&db, "1.1", "Contrato");

        let first = db
            .upsert_status(project.id, task.id, Status::Pendente)
            .unwrap();
        assert_eq!(first.version, 1);

        db.upsert_status(project.id, task.id, Status::Andamento)
            .unwrap();
        let last = db.upsert_status(project.id, task.id, Status::Sim).unwrap();

        assert_eq!(last.version, 3);
        assert_eq!(last.status, Status::Sim);
        assert_eq!(count_status_rows(&db), 1);

        let grid = db.project_grid(project.id).unwrap();
        assert_eq!(grid[0].status, Status::Sim);
        assert_eq!(grid[0].version, 3);
    }

    #[test]
    fn upsert_unknown_pair_is_not_found() {
        let db = setup_db();
        let project = add_project(&db, "OBRA A", None);
        let err = db
            .upsert_status(project.id, 404, Status::Sim)
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
        assert_eq!(count_status_rows(&db), 0);
    }

    #[test]
    fn checked_upsert_with_stale_version_conflicts() {
        let db = setup_db();
        let project = add_project(&db, "OBRA A", None);
        let task = add_task(&db, "1.1", "Contrato");

        let created = db
            .upsert_status_checked(project.id, task.id, Status::Pendente, 0)
            .unwrap();
        assert_eq!(created.version, 1);

        let err = db
            .upsert_status_checked(project.id, task.id, Status::Sim, 0)
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::Conflict);

        let grid = db.project_grid(project.id).unwrap();
        assert_eq!(grid[0].status, Status::Pendente);
        assert_eq!(grid[0].version, 1);

        let updated = db
            .upsert_status_checked(project.id, task.id, Status::Sim, 1)
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.status, Status::Sim);
    }

    #[test]
    fn save_status_matrix_writes_batch() {
        let db = setup_db();
        let a = add_project(&db, "OBRA A", None);
        let b = add_project(&db, "OBRA B", None);
        let task = add_task(&db, "1.1", "Contrato");

        let written = db
            .save_status_matrix(&[
                StatusEdit {
                    project_id: a.id,
                    task_id: task.id,
                    status: Status::Sim,
                },
                StatusEdit {
                    project_id: b.id,
                    task_id: task.id,
                    status: Status::Entrada,
                },
                StatusEdit {
                    project_id: a.id,
                    task_id: task.id,
                    status: Status::Andamento,
                },
            ])
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(count_status_rows(&db), 2);

        let matrix = db.status_matrix(None).unwrap();
        assert_eq!(matrix.get(task.id, a.id), Some(Status::Andamento));
        assert_eq!(matrix.get(task.id, b.id), Some(Status::Entrada));
    }

    #[test]
    fn global_grid_is_project_by_task_cross_join() {
        let db = setup_db();
        let a = add_project(&db, "OBRA B", None);
        add_project(&db, "OBRA A", None);
        let first = add_task(&db, "1.10", "Vistoria");
        add_task(&db, "1.2", "Alvará");
        db.upsert_status(a.id, first.id, Status::Pendente).unwrap();

        let grid = db.global_grid().unwrap();
        assert_eq!(grid.len(), 4);

        let order: Vec<(&str, &str)> = grid
            .iter()
            .map(|r| (r.project_name.as_str(), r.item_number.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("OBRA A", "1.2"),
                ("OBRA A", "1.10"),
                ("OBRA B", "1.2"),
                ("OBRA B", "1.10"),
            ]
        );
        assert_eq!(grid[3].status, Status::Pendente);
    }
}

mod health_tests {
    use super::*;

    #[test]
    fn ping_succeeds_on_open_database() {
        let db = setup_db();
        assert!(db.ping().is_ok());
    }

    #[test]
    fn open_creates_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("onboarding.db");
        {
            let db = Database::open(&path).unwrap();
            add_project(&db, "OBRA A", None);
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_projects(None).unwrap().len(), 1);
    }
}
