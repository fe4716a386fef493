//! Data directory layout.
//!
//! ```text
//! <data dir>/
//!   config.toml
//!   session/<session id>   one JSONL journal per session
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PARLEY_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. an explicit path (the `--dir` flag)
/// 2. `PARLEY_DIR`
/// 3. `~/.parley`
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".parley");
    }
    PathBuf::from(".parley")
}

/// Paths inside one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirs {
    root: PathBuf,
}

impl DataDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self) -> PathBuf {
        self.root.join("session")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Create the directory tree if it does not exist yet.
    pub fn create(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.session_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_dir_wins() {
        let dir = resolve_data_dir(Some(Path::new("/tmp/custom")));
        assert_eq!(dir, PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn test_create_layout() {
        let tmp = TempDir::new().unwrap();
        let dirs = DataDirs::new(tmp.path().join("nested"));
        dirs.create().unwrap();
        assert!(dirs.session_dir().is_dir());
        assert_eq!(dirs.config_path(), tmp.path().join("nested").join("config.toml"));
        // Idempotent.
        dirs.create().unwrap();
    }
}
