//! Error types for cleanslate.

use thiserror::Error;

/// A single table that could not be truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    pub table: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum Error {
    // Container runtime errors
    #[error("Command `{command}` failed{}: {stderr}", exit_suffix(.code))]
    Process {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Malformed inspect output: {0}")]
    Parse(String),

    #[error("Container {container} is not running (status: {status})")]
    NotRunning { container: String, status: String },

    #[error("Container {container} is running but publishes no host binding for {port}")]
    MissingPortMapping { container: String, port: String },

    // Database errors
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("{target} not ready after {attempts} attempts: {last_error}")]
    NotReady {
        target: String,
        attempts: u32,
        last_error: String,
    },

    #[error(
        "Truncation of {database} failed for {} table(s): {}",
        .failures.len(),
        describe_failures(.failures)
    )]
    Truncation {
        database: String,
        failures: Vec<TableFailure>,
    },

    // Infrastructure errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this is the runtime reporting that the inspected container
    /// does not exist at all.
    pub fn is_container_missing(&self) -> bool {
        match self {
            Error::Process { stderr, .. } => {
                stderr.contains("No such object") || stderr.contains("No such container")
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {}", code),
        None => String::new(),
    }
}

fn describe_failures(failures: &[TableFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.table, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
