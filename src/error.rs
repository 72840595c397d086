use std::{io, path::PathBuf, sync::Arc};

/// Result type for rotatelog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the rotating writer or its rules.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory { path: PathBuf, source: io::Error },
    #[error("Failed to open log file '{path}': {source}")]
    OpenFile { path: PathBuf, source: io::Error },
    #[error("Failed to spawn writer thread: {0}")]
    SpawnWorker(io::Error),
    /// Returned by `write` once the writer has been closed.
    #[error("log file closed")]
    Closed,
    /// The outcome of the first `close`, shared with every later call.
    #[error("Failed to close log file '{path}': {source}")]
    Close { path: PathBuf, source: Arc<io::Error> },
    #[error("Failed to rename file from '{from}' to '{to}': {source}")]
    Rename { from: PathBuf, to: PathBuf, source: io::Error },
    /// Rotation was refused rather than overwrite an earlier backup.
    #[error("Backup file '{0}' already exists")]
    BackupExists(PathBuf),
    #[error("Failed to list backups in '{path}': {source}")]
    ListBackups { path: PathBuf, source: io::Error },
    #[error("Invalid backup file pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Invalid backup log filename: '{0}'")]
    InvalidBackupName(PathBuf),
    #[error("Failed to parse backup time from '{path}': {source}")]
    ParseBackupTime { path: PathBuf, source: chrono::ParseError },
    #[error("Failed to compress '{path}': {source}")]
    Compress { path: PathBuf, source: io::Error },
    #[error("Configuration error: {0}")]
    Config(String),
}
