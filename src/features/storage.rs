use std::path::PathBuf;

#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
pub fn test_env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

pub fn parse_file_uri_path(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if uri.starts_with('/') {
        return Some(PathBuf::from(uri));
    }
    None
}

pub fn preferred_temp_dir() -> PathBuf {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(custom) = std::env::var("SIGNDESK_TEMP_DIR") {
        candidates.push(PathBuf::from(custom));
    }
    if let Ok(tmpdir) = std::env::var("TMPDIR") {
        candidates.push(PathBuf::from(tmpdir));
    }
    candidates.push(std::env::temp_dir());

    for dir in candidates {
        if let Ok(meta) = std::fs::metadata(&dir) {
            if meta.is_dir() {
                return dir;
            }
        }
    }
    std::env::temp_dir()
}

/// Root of the local document store when no explicit directory is configured.
pub fn default_data_dir() -> PathBuf {
    if let Ok(custom) = std::env::var("SIGNDESK_DATA_DIR") {
        return PathBuf::from(custom);
    }
    preferred_temp_dir().join("signdesk")
}

/// Where downloads land: next to a local source file when there is one.
pub fn output_dir_for(source_uri: Option<&str>) -> PathBuf {
    if let Some(path) = source_uri.and_then(parse_file_uri_path) {
        if let Some(parent) = path.parent() {
            if parent.is_dir() {
                return parent.to_path_buf();
            }
        }
    }
    preferred_temp_dir()
}
