use crate::logw;
use std::path::Path;
use std::process::Command;

fn opener() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("explorer")
    } else if cfg!(target_os = "macos") {
        Some("open")
    } else if cfg!(unix) {
        Some("xdg-open")
    } else {
        None
    }
}

/// Hands a gallery video (or its folder) to the desktop's default player.
pub fn open_path<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || !path.exists() {
        return false;
    }
    let Some(program) = opener() else {
        return false;
    };
    match Command::new(program).arg(path).spawn() {
        Ok(_) => true,
        Err(err) => {
            logw(format!("Could not open {} with {}: {}", path.display(), program, err));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paths_are_not_opened() {
        assert!(!open_path(""));
        assert!(!open_path("/definitely/not/here.mp4"));
    }
}
