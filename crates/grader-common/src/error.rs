//! Error types shared by the autograder crates.

use thiserror::Error;

/// Infrastructure-level error used across the autograder crates.
///
/// Per-project and per-test failures are *not* errors: they are recorded in
/// the batch report as [`crate::CompileFailure`] or [`crate::Verdict`]
/// values. This type covers everything that prevents the engine itself from
/// doing its job.
#[derive(Error, Debug)]
pub enum GraderError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A mixin rule carries a pattern that does not compile
    #[error("Invalid mixin pattern for `{import}`: {message}")]
    InvalidPattern { import: String, message: String },

    /// File I/O error
    #[error("File error: {0}")]
    FileError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// External process could not be spawned or awaited
    #[error("Process error: {0}")]
    ProcessError(String),
}

impl GraderError {
    /// Returns the error code string for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            GraderError::ConfigError(_) => "CONFIG_ERROR",
            GraderError::InvalidPattern { .. } => "INVALID_PATTERN",
            GraderError::FileError(_) => "FILE_ERROR",
            GraderError::SerializationError(_) => "SERIALIZATION_ERROR",
            GraderError::ProcessError(_) => "PROCESS_ERROR",
        }
    }

    /// Whether this error aborts a batch before any project is processed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GraderError::ConfigError(_)
                | GraderError::InvalidPattern { .. }
                | GraderError::SerializationError(_)
        )
    }
}

impl From<std::io::Error> for GraderError {
    fn from(err: std::io::Error) -> Self {
        GraderError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for GraderError {
    fn from(err: serde_json::Error) -> Self {
        GraderError::SerializationError(err.to_string())
    }
}

/// Result type alias using GraderError
pub type AppResult<T> = Result<T, GraderError>;
