//! Error types.
//!
//! Two layers:
//!
//! - [`LoadError`] is the structural taxonomy for measurement-file loading.
//!   These are fatal: a file without a data section or with missing/garbled
//!   required columns cannot be analyzed and the load aborts immediately.
//! - [`AppError`] is the application-level error carrying an exit code for
//!   the `forc` binary. Library callers that don't care about exit codes can
//!   stay on `LoadError`.
//!
//! Line-level irregularities (pre-marker sweep lines, short trailing
//! branches, per-cell fit failures) are *not* errors: they are recovered
//! locally and appended to the audit log.

use thiserror::Error;

/// Fatal errors raised while loading an instrument `.dat` file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// EOF was reached before the `[Data]` section sentinel.
    #[error("no data section found (missing `{0}` line)")]
    MissingDataSection(&'static str),

    /// A required named column is absent from the data-section header.
    #[error("missing required column `{0}` in data header")]
    MissingColumn(String),

    /// A data line carried a non-numeric value in a required column.
    #[error("line {line}: malformed value in column `{column}`: `{value}`")]
    MalformedValue {
        line: usize,
        column: String,
        value: String,
    },

    /// Underlying I/O failure while reading the stream.
    #[error("i/o error while reading measurement file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        // Exit codes: 2 = bad input file / schema, 1 = everything else.
        let code = match err {
            LoadError::MissingDataSection(_)
            | LoadError::MissingColumn(_)
            | LoadError::MalformedValue { .. } => 2,
            LoadError::Io(_) => 1,
        };
        AppError::new(code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
