use crate::logw;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Durable string key/value store shared by everything running from the same
/// installation. Values live in a single pretty-printed JSON object on disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: Option<PathBuf>,
}

impl LocalStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// A store with no backing facility: reads find nothing, writes are dropped.
    pub fn unavailable() -> Self {
        Self { path: None }
    }

    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        let path = self.path.as_ref()?;
        match read_map(path) {
            Ok(mut map) => map.remove(key),
            Err(err) => {
                logw(format!("Storage read failed ({}): {:#}", path.display(), err));
                None
            }
        }
    }

    pub fn set_item(&self, key: &str, value: &str) {
        let Some(path) = self.path.as_ref() else {
            logw(format!("Storage unavailable; dropping write for {}", key));
            return;
        };
        let mut map = read_map_for_write(path);
        map.insert(key.to_string(), value.to_string());
        if let Err(err) = write_map(path, &map) {
            logw(format!("Storage write failed ({}): {:#}", path.display(), err));
        }
    }

    pub fn remove_item(&self, key: &str) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        let mut map = read_map_for_write(path);
        if map.remove(key).is_none() {
            return;
        }
        if let Err(err) = write_map(path, &map) {
            logw(format!("Storage remove failed ({}): {:#}", path.display(), err));
        }
    }
}

fn read_map(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read storage: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse storage: {}", path.display()))
}

/// An unreadable file is replaced wholesale on the next write.
fn read_map_for_write(path: &Path) -> BTreeMap<String, String> {
    read_map(path).unwrap_or_else(|err| {
        logw(format!("Discarding unreadable storage ({}): {:#}", path.display(), err));
        BTreeMap::new()
    })
}

/// Writes to a sibling temp file and renames it over `path`.
fn write_map(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create dir {}", parent.display()))?;

    let content = serde_json::to_string_pretty(map)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write storage: {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace storage: {}", path.display()))?;
    Ok(())
}
