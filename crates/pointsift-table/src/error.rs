//! Filter error taxonomy

use crate::table::TableError;
use pointsift_expr::ExprError;
use thiserror::Error;

/// Errors surfaced by filtering a table with an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// The expression text is malformed
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    /// The expression is well-formed but uses a forbidden construct
    #[error("Unsafe expression: {construct} is not allowed ({detail})")]
    UnsafeExpression { construct: String, detail: String },

    /// The expression references columns the table does not have
    #[error("Unknown column(s): {}", .missing.join(", "))]
    UnknownColumn { missing: Vec<String> },

    /// The expression cannot produce a boolean per row
    #[error("Type error: {0}")]
    TypeEvaluation(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl FilterError {
    /// Short label for the error kind, used in user-facing messages
    pub fn kind(&self) -> &'static str {
        match self {
            FilterError::Syntax { .. } => "syntax",
            FilterError::UnsafeExpression { .. } => "unsafe expression",
            FilterError::UnknownColumn { .. } => "unknown column",
            FilterError::TypeEvaluation(_) => "type",
            FilterError::Table(_) => "table",
        }
    }
}

impl From<ExprError> for FilterError {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::Syntax { message, offset } => FilterError::Syntax { message, offset },
            ExprError::Unsafe { construct, detail } => {
                FilterError::UnsafeExpression { construct, detail }
            }
        }
    }
}

/// Result type for filtering
pub type FilterResult<T> = Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_errors_map_one_to_one() {
        let err: FilterError = pointsift_expr::parse_and_validate("x +").unwrap_err().into();
        assert_eq!(err.kind(), "syntax");

        let err: FilterError = pointsift_expr::parse_and_validate("open('f')")
            .unwrap_err()
            .into();
        assert!(matches!(err, FilterError::UnsafeExpression { .. }));
    }

    #[test]
    fn test_unknown_column_lists_all_names() {
        let err = FilterError::UnknownColumn {
            missing: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Unknown column(s): a, b");
    }
}
