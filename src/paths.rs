//! Centralized path resolution for the todo data directory.
//!
//! Everything lives under one directory: `$TODO_HOME` when set, otherwise
//! `$HOME/.todo`. The database path can be overridden separately with
//! `--db` / `TODO_DB`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Resolve the data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TODO_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".todo"))
}

pub fn default_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("todos.db")
}

/// Records the pid of the running daemon.
pub fn pid_file(data_dir: &Path) -> PathBuf {
    data_dir.join("todo.pid")
}

pub fn daemon_log(data_dir: &Path) -> PathBuf {
    data_dir.join("daemon.log")
}

pub fn config_file(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Create `path`'s parent directory if it does not exist yet.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}
