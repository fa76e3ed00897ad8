//! Configuration types and structures.
//!
//! This module contains all the configuration types used throughout the application.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default port for the web dashboard.
pub const DEFAULT_UI_PORT: u16 = 31995;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.import.validate()
    }
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("onboarding.db")
}

/// UI configuration for the web dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Port for the web dashboard (default: 31995).
    #[serde(default = "default_ui_port")]
    pub port: u16,

    /// Address the dashboard binds to (default: 127.0.0.1).
    #[serde(default = "default_ui_bind")]
    pub bind: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            port: default_ui_port(),
            bind: default_ui_bind(),
        }
    }
}

fn default_ui_port() -> u16 {
    DEFAULT_UI_PORT
}

fn default_ui_bind() -> String {
    "127.0.0.1".to_string()
}

/// Column layout of the onboarding spreadsheet.
///
/// Every column listed in `metadata_columns` carries task metadata. Every
/// other named column is a project. Columns in `required_columns` must be
/// present or the import fails before touching the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Literal cell value that marks the header row.
    #[serde(default = "default_header_token")]
    pub header_token: String,

    /// Number of leading records scanned for the header row.
    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,

    /// Columns that are task metadata rather than projects.
    #[serde(default = "default_metadata_columns")]
    pub metadata_columns: Vec<String>,

    /// Columns that must exist in the header.
    #[serde(default = "default_required_columns")]
    pub required_columns: Vec<String>,

    #[serde(default)]
    pub columns: ColumnNames,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            header_token: default_header_token(),
            header_scan_rows: default_header_scan_rows(),
            metadata_columns: default_metadata_columns(),
            required_columns: default_required_columns(),
            columns: ColumnNames::default(),
        }
    }
}

impl ImportConfig {
    /// Whether a column name is declared as metadata.
    pub fn is_metadata_column(&self, name: &str) -> bool {
        self.metadata_columns.iter().any(|c| c == name)
    }

    /// Ensure the layout is self-consistent.
    ///
    /// The key column must be the header token and every mapped column must
    /// be declared as metadata, otherwise it would be classified as a project.
    pub fn validate(&self) -> Result<()> {
        if self.header_token.trim().is_empty() {
            return Err(anyhow!("import.header_token must not be empty"));
        }
        if self.header_scan_rows == 0 {
            return Err(anyhow!("import.header_scan_rows must be at least 1"));
        }
        for name in self.columns.mapped() {
            if !self.is_metadata_column(name) {
                return Err(anyhow!(
                    "Column '{}' is mapped to task metadata but missing from import.metadata_columns",
                    name
                ));
            }
        }
        Ok(())
    }
}

fn default_header_token() -> String {
    "ITENS".to_string()
}

fn default_header_scan_rows() -> usize {
    15
}

fn default_metadata_columns() -> Vec<String> {
    [
        "ITENS",
        "ATIVIDADE",
        "DESCRIÇÃO",
        "SETOR",
        "ATIVIDADE1",
        "ATIVIDADE.1",
        "RESPONSÁVEL",
        "ETAPA",
        "OBSERVAÇÕES",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_required_columns() -> Vec<String> {
    vec!["ITENS".to_string(), "ATIVIDADE".to_string()]
}

/// Source column for each task field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnNames {
    #[serde(default = "default_item_column")]
    pub item: String,
    #[serde(default = "default_title_column")]
    pub title: String,
    #[serde(default = "default_description_column")]
    pub description: String,
    #[serde(default = "default_sector_column")]
    pub sector: String,
    #[serde(default = "default_responsible_column")]
    pub responsible: String,
    #[serde(default = "default_stage_column")]
    pub stage: String,
    /// Candidate columns for the area field; the first present one wins.
    #[serde(default = "default_area_columns")]
    pub area: Vec<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            item: default_item_column(),
            title: default_title_column(),
            description: default_description_column(),
            sector: default_sector_column(),
            responsible: default_responsible_column(),
            stage: default_stage_column(),
            area: default_area_columns(),
        }
    }
}

impl ColumnNames {
    /// All column names mapped to a task field.
    pub fn mapped(&self) -> impl Iterator<Item = &str> {
        [
            &self.item,
            &self.title,
            &self.description,
            &self.sector,
            &self.responsible,
            &self.stage,
        ]
        .into_iter()
        .chain(self.area.iter())
        .map(String::as_str)
    }
}

fn default_item_column() -> String {
    "ITENS".to_string()
}

fn default_title_column() -> String {
    "ATIVIDADE".to_string()
}

fn default_description_column() -> String {
    "DESCRIÇÃO".to_string()
}

fn default_sector_column() -> String {
    "SETOR".to_string()
}

fn default_responsible_column() -> String {
    "RESPONSÁVEL".to_string()
}

fn default_stage_column() -> String {
    "ETAPA".to_string()
}

fn default_area_columns() -> Vec<String> {
    vec!["ATIVIDADE1".to_string(), "ATIVIDADE.1".to_string()]
}

/// Option lists offered by the dashboard editors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_project_categories")]
    pub project_categories: Vec<String>,

    #[serde(default = "default_stage_options")]
    pub stage_options: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            project_categories: default_project_categories(),
            stage_options: default_stage_options(),
        }
    }
}

fn default_project_categories() -> Vec<String> {
    ["MULTIFAMILIAR", "COMERCIAL", "USO MISTO", "UNIFAMILIAR"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_stage_options() -> Vec<String> {
    ["PRÉ-OBRA", "EXECUÇÃO", "PÓS-OBRA", "DOCUMENTAÇÃO", "PROJETOS"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ui.port, DEFAULT_UI_PORT);
        assert_eq!(config.import.header_token, "ITENS");
        assert_eq!(config.import.header_scan_rows, 15);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
import:
  header_scan_rows: 5
"#,
        )
        .unwrap();
        assert_eq!(config.import.header_scan_rows, 5);
        assert_eq!(config.import.columns.title, "ATIVIDADE");
        assert!(config.import.is_metadata_column("SETOR"));
    }

    #[test]
    fn test_mapped_column_must_be_metadata() {
        let mut config = ImportConfig::default();
        config.columns.stage = "FASE".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("FASE"));
    }
}
