//! Error types for glowup.
//!
//! These are genuine failures (I/O, malformed files, unknown ids). Board rule
//! rejections are not errors; see [`crate::board::Rejection`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings file error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("settings export error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("task not found: {0}")]
    TaskNotFound(u64),

    #[error("subtask {subtask} not found on task {task}")]
    SubtaskNotFound { task: u64, subtask: u64 },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("estimated duration must be a positive number of minutes")]
    MissingDuration,
}

pub type Result<T> = std::result::Result<T, Error>;
