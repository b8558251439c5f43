use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Creates the directory that will hold the storage file, if it has one.
pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    let Some(dir) = Path::new(&cfg.storage_path).parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() || fs::metadata(dir).await.is_ok() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    tracing::info!("Created directory: {}", dir.display());
    Ok(())
}
