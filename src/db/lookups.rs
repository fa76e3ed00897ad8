//! Auxiliary lookup lists: sectors, responsibles and phases.

use super::{Database, is_unique_violation};
use crate::error::AppError;
use crate::types::{AuxEntry, Phase};
use anyhow::Result;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;

/// Which auxiliary list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxTable {
    Sectors,
    Responsibles,
}

impl AuxTable {
    /// SQL table name. Only ever one of two constants.
    pub fn table_name(&self) -> &'static str {
        match self {
            AuxTable::Sectors => "sectors",
            AuxTable::Responsibles => "responsibles",
        }
    }

    /// Singular label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            AuxTable::Sectors => "Sector",
            AuxTable::Responsibles => "Responsible",
        }
    }
}

impl FromStr for AuxTable {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sectors" | "setores" => Ok(AuxTable::Sectors),
            "responsibles" | "responsaveis" | "responsáveis" => Ok(AuxTable::Responsibles),
            other => Err(AppError::invalid_value(
                "table",
                format!("Unknown auxiliary list: {}", other),
            )),
        }
    }
}

/// One edited row of an auxiliary list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuxEdit {
    /// Existing row to rename; `None` inserts a new name.
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

/// Outcome of [`Database::update_aux_list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuxUpdateSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Normalize a lookup name: trimmed and upper-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Load the name -> id map of an auxiliary list.
pub(crate) fn load_name_map(conn: &Connection, table: AuxTable) -> Result<HashMap<String, i64>> {
    let sql = format!("SELECT name, id FROM {}", table.table_name());
    let mut stmt = conn.prepare(&sql)?;
    let map = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(map)
}

/// Insert a name if absent and return its id.
pub(crate) fn ensure_name(conn: &Connection, table: AuxTable, name: &str) -> Result<i64> {
    let insert = format!(
        "INSERT INTO {} (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        table.table_name()
    );
    conn.execute(&insert, params![name])?;
    let select = format!("SELECT id FROM {} WHERE name = ?1", table.table_name());
    let id = conn.query_row(&select, params![name], |row| row.get(0))?;
    Ok(id)
}

impl Database {
    /// List an auxiliary list ordered by name.
    pub fn list_aux(&self, table: AuxTable) -> Result<Vec<AuxEntry>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT id, name FROM {} ORDER BY name", table.table_name());
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map([], |row| {
                    Ok(AuxEntry {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// Apply edits to an auxiliary list in one transaction.
    ///
    /// Names are trimmed and upper-cased. Rows with an id are renamed; rows
    /// without one are inserted unless the name already exists. Blank names
    /// are skipped.
    pub fn update_aux_list(&self, table: AuxTable, edits: &[AuxEdit]) -> Result<AuxUpdateSummary> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut summary = AuxUpdateSummary::default();

            let insert = format!(
                "INSERT INTO {} (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                table.table_name()
            );
            let update = format!("UPDATE {} SET name = ?1 WHERE id = ?2", table.table_name());

            for edit in edits {
                let name = normalize_name(&edit.name);
                if name.is_empty() {
                    summary.skipped += 1;
                    continue;
                }
                match edit.id {
                    Some(id) => match tx.execute(&update, params![name, id]) {
                        Ok(0) => return Err(AppError::not_found(table.label(), id).into()),
                        Ok(_) => summary.updated += 1,
                        Err(e) if is_unique_violation(&e) => {
                            return Err(AppError::already_exists(table.label(), &name).into());
                        }
                        Err(e) => return Err(e.into()),
                    },
                    None => {
                        if tx.execute(&insert, params![name])? > 0 {
                            summary.inserted += 1;
                        } else {
                            summary.skipped += 1;
                        }
                    }
                }
            }

            tx.commit()?;
            info!(
                table = table.table_name(),
                inserted = summary.inserted,
                updated = summary.updated,
                skipped = summary.skipped,
                "Auxiliary list updated"
            );
            Ok(summary)
        })
    }

    /// Delete an auxiliary entry. Tasks referencing it keep a null reference.
    pub fn delete_aux(&self, table: AuxTable, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let sql = format!("DELETE FROM {} WHERE id = ?1", table.table_name());
            if conn.execute(&sql, params![id])? == 0 {
                return Err(AppError::not_found(table.label(), id).into());
            }
            Ok(())
        })
    }

    /// List phases ordered by number.
    pub fn list_phases(&self) -> Result<Vec<Phase>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, number, title FROM phases ORDER BY number")?;
            let phases = stmt
                .query_map([], |row| {
                    Ok(Phase {
                        id: row.get(0)?,
                        number: row.get(1)?,
                        title: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(phases)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aux_table_from_str() {
        assert_eq!("sectors".parse::<AuxTable>().unwrap(), AuxTable::Sectors);
        assert_eq!("Responsáveis".parse::<AuxTable>().unwrap(), AuxTable::Responsibles);
        assert!("projects".parse::<AuxTable>().is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  engenharia "), "ENGENHARIA");
        assert_eq!(normalize_name("   "), "");
    }
}
