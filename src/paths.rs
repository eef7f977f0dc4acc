use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn database_file_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os("DRAMAWATCH_DB").filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("dramawatch").join("dramawatch.db"))
}

pub fn config_file_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("unable to resolve config directory")?;
    Ok(base.join("dramawatch").join("config.json"))
}
