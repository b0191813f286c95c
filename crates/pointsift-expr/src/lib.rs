//! pointsift-expr - Safe filter expressions over named columns
//!
//! This crate turns untrusted expression text into a validated tree that
//! can only contain whitelisted constructs:
//!
//! # Expression Syntax
//!
//! - **Columns and numbers**: `dem_h`, `3`, `1.5e-3`
//! - **Arithmetic**: `+ - * / **` and unary `-`
//! - **Comparisons**: `< <= > >= == !=` (never chained)
//! - **Logic**: `and`, `or`, `not`
//! - **Functions**: `abs(x)`
//!
//! Everything else a general expression grammar can express (attribute
//! access, other calls, strings, collections, lambdas, imports, ...)
//! parses but is rejected with [`ExprError::Unsafe`].
//!
//! # Examples
//!
//! ```
//! use pointsift_expr::parse_and_validate;
//!
//! let expr = parse_and_validate("abs(dem_h - h_te_best_fit) <= 3 and cloud_flag_atm < 3").unwrap();
//! assert_eq!(expr.columns().len(), 3);
//!
//! assert!(parse_and_validate("__import__('os')").unwrap_err().is_unsafe());
//! assert!(parse_and_validate("dem_h +").unwrap_err().is_syntax());
//! ```

pub mod ast;
pub mod cache;
pub mod error;
pub mod syntax;
pub mod validate;
pub mod whitelist;

pub use ast::*;
pub use cache::ExprCache;
pub use error::{ExprError, ExprResult};
pub use validate::{
    parse_and_validate, parse_and_validate_with_limit, ValidatedExpr, DEFAULT_MAX_EXPRESSION_LEN,
};
pub use whitelist::WHITELIST;
