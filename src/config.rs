//! Driver configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one driver instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DriverConfig {
    /// Database file path; in-memory when absent
    pub database: Option<String>,
    /// Use the indexed field-access strategy
    #[serde(default)]
    pub indexed_access: bool,
    /// Busy timeout applied to every borrowed handle
    pub busy_timeout_ms: Option<u64>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("rowmap.toml")
}

impl DriverConfig {
    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for a database file
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            database: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file, `rowmap.toml` by default.
    /// Returns `None` when the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Option<Self>> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("invalid config {}: {}", path.display(), e)))?;
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(DriverConfig::load(Some(&path)).unwrap().is_none());
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowmap.toml");
        std::fs::write(
            &path,
            "database = \"data/app.db\"\nindexed_access = true\nbusy_timeout_ms = 250\n",
        )
        .unwrap();

        let config = DriverConfig::load(Some(&path)).unwrap().unwrap();
        assert_eq!(config.database.as_deref(), Some("data/app.db"));
        assert!(config.indexed_access);
        assert_eq!(config.busy_timeout_ms, Some(250));
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowmap.toml");
        std::fs::write(&path, "database = [not toml").unwrap();

        assert!(matches!(
            DriverConfig::load(Some(&path)),
            Err(Error::Configuration(_))
        ));
    }
}
