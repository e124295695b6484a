use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkgtrailError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error at '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    StdIoError(#[from] std::io::Error),

    #[error("Parsing error in '{file}': {message}")]
    ParseError { file: String, message: String },

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// The native tool is missing. Non-fatal: the backend is skipped for the run.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The native tool ran but its output could not be understood.
    #[error("Backend '{backend}' query failed: {message}")]
    BackendQueryError { backend: String, message: String },

    /// Persisting an action failed. Fatal to the current run.
    #[error("Ledger write failed at '{path}': {reason}")]
    LedgerWriteError { path: PathBuf, reason: String },

    #[error("Ledger '{path}' is corrupted at line {line}: {message}")]
    LedgerCorrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A native install/remove failed and the caller asked for strict handling.
    #[error("{kind} of {backend}:{package} failed: {detail}")]
    ActionFailed {
        kind: String,
        backend: String,
        package: String,
        detail: String,
    },

    #[error("System command '{command}' failed: {reason}")]
    SystemCommandFailed { command: String, reason: String },

    #[error("Command '{command}' timed out after {seconds} seconds")]
    CommandTimedOut { command: String, seconds: f64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid package specification: {0}")]
    InvalidPackage(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),

    /// Lock acquisition failed (contention or poisoned mutex)
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// Path resolution or validation error
    #[error("Path error: {0}")]
    PathError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PkgtrailError>;
