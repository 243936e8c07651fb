//! keyval.toml configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Store-level settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend table holding the records.
    pub table: String,
    /// Items fetched per page while traversing a match.
    pub page_size: usize,
    /// Physical key attribute names.
    pub keys: KeyAttributes,
}

/// Names of the two physical key attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyAttributes {
    pub partition: String,
    pub sort: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: "keyval".to_string(),
            page_size: 100,
            keys: KeyAttributes::default(),
        }
    }
}

impl Default for KeyAttributes {
    fn default() -> Self {
        Self {
            partition: "prefix".to_string(),
            sort: "suffix".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| Error::config(format!("keyval.toml: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(format!("keyval.toml: {e}")))
    }

    /// Checked on load and again when a store client is created, so configs
    /// built in code get the same treatment as parsed ones.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::config("page_size must be greater than zero"));
        }
        if self.keys.partition == self.keys.sort {
            return Err(Error::config("partition and sort key attributes must differ"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_from_empty_file() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.keys.partition, "prefix");
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn parse_partial() {
        let config = StoreConfig::from_toml_str(
            r#"
table = "persons"

[keys]
partition = "pk"
"#,
        )
        .unwrap();
        assert_eq!(config.table, "persons");
        assert_eq!(config.keys.partition, "pk");
        assert_eq!(config.keys.sort, "suffix");
    }

    #[test]
    fn zero_page_size_rejected() {
        let err = StoreConfig::from_toml_str("page_size = 0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("page_size"), "{err}");
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = StoreConfig::from_toml_str("page_size = \"ten\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn identical_key_attributes_rejected() {
        let err = StoreConfig::from_toml_str("[keys]\npartition = \"k\"\nsort = \"k\"").unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn toml_round_trip() {
        let config = StoreConfig {
            page_size: 2,
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyval.toml");
        std::fs::write(&path, "table = \"t\"\npage_size = 10\n").unwrap();
        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.table, "t");
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.backend().is_none());
        assert!(err.to_string().contains("missing.toml"), "{err}");
    }
}
