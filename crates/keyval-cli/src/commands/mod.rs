pub mod config;
pub mod demo;

use std::path::Path;

use keyval::StoreConfig;
use tracing::info;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    match path {
        Some(path) => {
            let config = StoreConfig::from_file(path)?;
            info!(path = %path.display(), table = %config.table, "configuration loaded");
            Ok(config)
        }
        None => Ok(StoreConfig::default()),
    }
}
