use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a load run. None of these are retried
/// internally; the caller decides whether to rerun from scratch.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The batch is empty. Raised before the sink is touched.
    #[error("no input files matching '{pattern}' in {}", dir.display())]
    NoInputFiles { dir: PathBuf, pattern: String },

    /// A source file lacks one or more canonical columns.
    #[error("{} is missing required columns: {}", path.display(), missing.join(", "))]
    SchemaMismatch { path: PathBuf, missing: Vec<String> },

    /// The file could be opened but not decoded into canonical rows.
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("warehouse unreachable: {0}")]
    Connection(#[source] sqlx::Error),

    /// Creating or truncating the sink table failed.
    #[error("sink table {operation} failed: {source}")]
    Sink {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// The bulk copy for one file was rejected; its transaction was rolled back.
    #[error("bulk transfer of {} failed: {source}", path.display())]
    Transfer {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn decode(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transfer(path: &std::path::Path, source: sqlx::Error) -> Self {
        Self::Transfer {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short machine-friendly name for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoInputFiles { .. } => "no_input_files",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::Decode { .. } => "decode",
            Self::Connection(_) => "connection",
            Self::Sink { .. } => "sink",
            Self::Transfer { .. } => "transfer",
            Self::Io(_) => "io",
        }
    }
}
