//! Runtime configuration resolved once at startup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const HOME_ENV: &str = "GLOWUP_HOME";
pub const LOG_ENV: &str = "GLOWUP_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";
pub const SNAPSHOT_FILE: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub snapshot_path: PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Resolve from an optional `--db` override and the process environment.
    pub fn resolve(db: Option<PathBuf>) -> Result<Self> {
        Self::resolve_with(db, |key| env::var(key).ok())
    }

    /// Same as [`Config::resolve`] with an injectable environment lookup.
    pub fn resolve_with<F>(db: Option<PathBuf>, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let snapshot_path = match db {
            Some(path) => path,
            None => data_dir(&var).join(SNAPSHOT_FILE),
        };
        if let Some(parent) = snapshot_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let log_filter = var(LOG_ENV).filter(|f| !f.trim().is_empty()).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Ok(Config { snapshot_path, log_filter })
    }

    pub fn data_dir(&self) -> &Path {
        self.snapshot_path.parent().unwrap_or_else(|| Path::new("."))
    }
}

fn data_dir<F: Fn(&str) -> Option<String>>(var: &F) -> PathBuf {
    if let Some(dir) = var(HOME_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    let home = var("HOME").unwrap_or_else(|| ".".to_string());
    PathBuf::from(home).join(".glowup")
}
