//! Import configuration: upload limits and the source-company registry.
//!
//! Company codes and their expected date formats are data, not code: the
//! registry is a plain map loadable from TOML, so adding a company is a
//! config change. The built-in defaults cover the three shipping companies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

/// Default cap on uploaded file size (bytes), checked before parsing begins.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Hard cap on `pageSize` for review queries.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Per-company import profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Display name.
    pub name: String,
    /// chrono format string for `transactionDate` in this company's exports.
    pub date_format: String,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Accepted file extensions (lowercase, no dot).
    #[serde(default = "default_extensions")]
    pub accepted_extensions: Vec<String>,
    /// Company code -> profile. Codes are matched case-insensitively.
    pub companies: HashMap<String, CompanyProfile>,
}

fn default_max_file_size() -> usize {
    DEFAULT_MAX_FILE_SIZE
}

fn default_extensions() -> Vec<String> {
    vec!["csv".into(), "tsv".into(), "txt".into()]
}

impl Default for ImportConfig {
    fn default() -> Self {
        let mut companies = HashMap::new();
        companies.insert(
            "us".to_string(),
            CompanyProfile { name: "US Sales".into(), date_format: "%m/%d/%Y".into() },
        );
        companies.insert(
            "eu".to_string(),
            CompanyProfile { name: "EU Sales".into(), date_format: "%d/%m/%Y".into() },
        );
        companies.insert(
            "kr".to_string(),
            CompanyProfile { name: "KR Sales".into(), date_format: "%Y-%m-%d".into() },
        );

        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_extensions: default_extensions(),
            companies,
        }
    }
}

impl ImportConfig {
    /// Load configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.check_date_formats()?;
        Ok(config)
    }

    /// Look up a company profile by code, case-insensitively.
    pub fn company(&self, code: &str) -> Option<&CompanyProfile> {
        let code = code.trim().to_lowercase();
        self.companies.get(&code)
    }

    /// Whether the file extension is an accepted tabular format.
    pub fn accepts_extension(&self, file_name: &str) -> bool {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        self.accepted_extensions.iter().any(|a| *a == ext)
    }

    /// Reject profiles whose date format chrono cannot interpret.
    fn check_date_formats(&self) -> Result<(), ConfigError> {
        use chrono::format::{Item, StrftimeItems};

        for (code, profile) in &self.companies {
            let broken = StrftimeItems::new(&profile.date_format)
                .any(|item| matches!(item, Item::Error));
            if broken {
                return Err(ConfigError::BadDateFormat {
                    code: code.clone(),
                    format: profile.date_format.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let config = ImportConfig::default();
        assert!(config.company("us").is_some());
        assert!(config.company("EU").is_some());
        assert!(config.company(" kr ").is_some());
        assert!(config.company("zz").is_none());
    }

    #[test]
    fn test_accepts_extension() {
        let config = ImportConfig::default();
        assert!(config.accepts_extension("sales.csv"));
        assert!(config.accepts_extension("SALES.CSV"));
        assert!(config.accepts_extension("export.tsv"));
        assert!(!config.accepts_extension("report.xlsx"));
        assert!(!config.accepts_extension("noextension"));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            max_file_size = 1024

            [companies.us]
            name = "US Sales"
            date_format = "%m/%d/%Y"
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.toml");
        std::fs::write(&path, toml).unwrap();

        let config = ImportConfig::from_path(&path).unwrap();
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(config.company("us").unwrap().date_format, "%m/%d/%Y");
        // Defaults fill in what the file omits.
        assert!(config.accepts_extension("a.csv"));
    }

    #[test]
    fn test_bad_date_format_rejected() {
        let toml = r#"
            [companies.us]
            name = "US Sales"
            date_format = "%q"
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.toml");
        std::fs::write(&path, toml).unwrap();

        assert!(matches!(
            ImportConfig::from_path(&path),
            Err(ConfigError::BadDateFormat { .. })
        ));
    }
}
