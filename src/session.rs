use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

/// Scratch space for media downloaded during this run. Everything in it is
/// removed when the session is dropped.
#[derive(Debug)]
pub struct MediaSession {
    dir: TempDir,
}

impl MediaSession {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("video-ideas-")
            .tempdir()
            .context("Failed to create session media dir")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `bytes` as `<id>.mp4` and returns a path a local player can open.
    pub async fn store(&self, id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.path().join(format!("{}.mp4", id));
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write media {}", path.display()))?;
        Ok(path)
    }
}
