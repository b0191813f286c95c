//! Error types for expression parsing and validation

use thiserror::Error;

/// Errors raised while turning expression text into a validated expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// The text is not a well-formed expression
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    /// The text is well-formed but uses a construct outside the whitelist
    #[error("Unsafe expression: {construct} is not allowed ({detail})")]
    Unsafe { construct: String, detail: String },
}

impl ExprError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize) -> Self {
        ExprError::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub(crate) fn unsafe_construct(construct: impl Into<String>, detail: impl Into<String>) -> Self {
        ExprError::Unsafe {
            construct: construct.into(),
            detail: detail.into(),
        }
    }

    /// True for [`ExprError::Syntax`]
    pub fn is_syntax(&self) -> bool {
        matches!(self, ExprError::Syntax { .. })
    }

    /// True for [`ExprError::Unsafe`]
    pub fn is_unsafe(&self) -> bool {
        matches!(self, ExprError::Unsafe { .. })
    }
}

/// Result type for expression operations
pub type ExprResult<T> = Result<T, ExprError>;
