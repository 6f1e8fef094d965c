use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    /// Input could not be tokenized as CSV. Carries the failing stage.
    ParseError(String),
    /// No data rows survived parsing/transform. Carries the stage that noticed it.
    EmptyInput(String),
    /// Requested transform slug has no stored config.
    UnknownTransform(String),
    DatabaseError(String),
    RenderError(String),
    IoError(String),
}

impl AppError {
    /// Short machine-readable kind, used as the `error` field of API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal",
            AppError::NotFound(_) => "not_found",
            AppError::ValidationError(_) => "validation",
            AppError::ParseError(_) => "parse",
            AppError::EmptyInput(_) => "empty_input",
            AppError::UnknownTransform(_) => "unknown_transform",
            AppError::DatabaseError(_) => "database",
            AppError::RenderError(_) => "render",
            AppError::IoError(_) => "io",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::EmptyInput(stage) => write!(f, "CSV contains no data rows ({})", stage),
            AppError::UnknownTransform(slug) => write!(f, "Unknown transform: {}", slug),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::RenderError(msg) => write!(f, "Render error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let empty = AppError::EmptyInput("after parse".to_string());
        let unknown = AppError::UnknownTransform("moores".to_string());
        assert_ne!(empty.kind(), unknown.kind());
        assert_eq!(unknown.to_string(), "Unknown transform: moores");
        assert!(empty.to_string().contains("after parse"));
    }
}
