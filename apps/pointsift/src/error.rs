//! CLI error type

use pointsift_expr::ExprError;
use pointsift_table::{ConfigError, FilterError, IoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot read {path}: {message}")]
    ReadFile { path: String, message: String },

    #[error("cannot write {path}: {message}")]
    WriteFile { path: String, message: String },

    #[error("{failed} of {total} tables failed")]
    BatchFailures { failed: usize, total: usize },
}

impl From<ExprError> for CliError {
    fn from(err: ExprError) -> Self {
        CliError::Filter(err.into())
    }
}

impl CliError {
    /// Label printed before the message: `[pointsift] <kind> error: ...`
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Filter(
                FilterError::Syntax { .. }
                | FilterError::UnsafeExpression { .. }
                | FilterError::UnknownColumn { .. }
                | FilterError::TypeEvaluation(_),
            ) => "expression",
            CliError::Filter(FilterError::Table(_)) | CliError::Io(_) => "table",
            CliError::Config(_) => "config",
            CliError::ReadFile { .. } | CliError::WriteFile { .. } => "io",
            CliError::BatchFailures { .. } => "batch",
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_errors_share_a_kind() {
        let err: CliError = pointsift_expr::parse_and_validate("x +").unwrap_err().into();
        assert_eq!(err.kind(), "expression");

        let err = CliError::from(FilterError::UnknownColumn {
            missing: vec!["dem_h".to_string()],
        });
        assert_eq!(err.kind(), "expression");
        assert_eq!(err.to_string(), "Unknown column(s): dem_h");
    }

    #[test]
    fn test_io_errors() {
        let err = CliError::from(IoError::FileNotFound("a.csv".to_string()));
        assert_eq!(err.kind(), "table");
        assert_eq!(err.exit_code(), 2);
    }
}
