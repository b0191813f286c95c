//! Whitelist validation of parsed expressions
//!
//! The raw tree is walked top-down. Each node is first checked against
//! the whitelist and only then are its children visited, so the error
//! names the outermost offending construct.

use crate::ast::Expr;
use crate::error::{ExprError, ExprResult};
use crate::syntax::{parse_syntax, Syntax};
use crate::whitelist::WHITELIST;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Default cap on expression text length, in bytes
pub const DEFAULT_MAX_EXPRESSION_LEN: usize = 4096;

/// An expression that has passed validation
///
/// Only [`parse_and_validate`] (and its length-limited variant) can
/// produce one, so holding a `ValidatedExpr` proves the tree contains
/// nothing outside the whitelist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedExpr {
    source: String,
    root: Expr,
    columns: BTreeSet<String>,
}

impl ValidatedExpr {
    /// The text this expression was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root of the validated tree
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Referenced column names, sorted and deduplicated
    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }
}

impl fmt::Display for ValidatedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

/// Parse and validate untrusted expression text
pub fn parse_and_validate(text: &str) -> ExprResult<ValidatedExpr> {
    parse_and_validate_with_limit(text, DEFAULT_MAX_EXPRESSION_LEN)
}

/// Like [`parse_and_validate`], rejecting text longer than `max_len` bytes
pub fn parse_and_validate_with_limit(text: &str, max_len: usize) -> ExprResult<ValidatedExpr> {
    if text.len() > max_len {
        return Err(ExprError::syntax(
            format!(
                "expression is {} bytes long, the limit is {}",
                text.len(),
                max_len
            ),
            max_len,
        ));
    }

    let tree = parse_syntax(text)?;
    let root = match validate(&tree) {
        Ok(root) => root,
        Err(e) => {
            debug!(expression = text, error = %e, "rejected expression");
            return Err(e);
        }
    };
    let columns = root.columns();
    debug!(expression = text, columns = columns.len(), "validated expression");

    Ok(ValidatedExpr {
        source: text.to_string(),
        root,
        columns,
    })
}

/// Convert a raw syntax tree into a whitelisted [`Expr`]
pub fn validate(node: &Syntax) -> ExprResult<Expr> {
    match node {
        Syntax::Number(value) => Ok(Expr::Literal(*value)),

        Syntax::Name(name) => {
            check_name(name)?;
            if WHITELIST.function(name).is_some() {
                return Err(ExprError::unsafe_construct(
                    format!("function '{}' used as a value", name),
                    format!("call it, e.g. {}(x)", name),
                ));
            }
            Ok(Expr::Column(name.clone()))
        }

        Syntax::Unary { op, operand } => {
            let op = WHITELIST.unary_op(op).ok_or_else(|| {
                ExprError::unsafe_construct(
                    format!("unary operator '{}'", op),
                    "only '-' and 'not' are allowed",
                )
            })?;
            Ok(Expr::unary(op, validate(operand)?))
        }

        Syntax::Binary { op, left, right } => {
            let op = WHITELIST.binary_op(op).ok_or_else(|| {
                ExprError::unsafe_construct(
                    format!("operator '{}'", op),
                    "only + - * / ** are allowed",
                )
            })?;
            Ok(Expr::binary(op, validate(left)?, validate(right)?))
        }

        Syntax::BoolOp { op, operands } => {
            let op = WHITELIST.bool_op(op).ok_or_else(|| {
                ExprError::unsafe_construct(
                    format!("boolean operator '{}'", op),
                    "only 'and' and 'or' are allowed",
                )
            })?;
            let operands = operands
                .iter()
                .map(validate)
                .collect::<ExprResult<Vec<_>>>()?;
            Ok(Expr::BoolOp { op, operands })
        }

        Syntax::Compare { left, comparisons } => {
            let ops = comparisons
                .iter()
                .map(|(op, _)| {
                    WHITELIST.compare_op(op).ok_or_else(|| {
                        ExprError::unsafe_construct(
                            format!("comparison operator '{}'", op),
                            "only < <= > >= == != are allowed",
                        )
                    })
                })
                .collect::<ExprResult<Vec<_>>>()?;
            let ([op], [(_, right)]) = (ops.as_slice(), comparisons.as_slice()) else {
                return Err(ExprError::unsafe_construct(
                    "chained comparison",
                    "write 'a <= x and x <= b' instead of 'a <= x <= b'",
                ));
            };
            Ok(Expr::compare(*op, validate(left)?, validate(right)?))
        }

        Syntax::Call {
            func,
            args,
            keywords,
        } => {
            let Syntax::Name(name) = func.as_ref() else {
                return Err(ExprError::unsafe_construct(
                    "call of a computed value",
                    "only simple function calls like abs(x) are allowed",
                ));
            };
            let function = WHITELIST.function(name).ok_or_else(|| {
                ExprError::unsafe_construct(
                    format!("call to '{}'", name),
                    format!("allowed functions: {}", WHITELIST.function_names().join(", ")),
                )
            })?;
            if !keywords.is_empty() {
                return Err(ExprError::unsafe_construct(
                    "keyword argument",
                    format!("{}() takes positional arguments only", name),
                ));
            }
            if args.len() != function.arity() {
                return Err(ExprError::unsafe_construct(
                    format!("call to '{}' with {} arguments", name, args.len()),
                    format!("{}() takes exactly {} argument", name, function.arity()),
                ));
            }
            let args = args.iter().map(validate).collect::<ExprResult<Vec<_>>>()?;
            Ok(Expr::Call {
                func: function,
                args,
            })
        }

        Syntax::Str(_) => Err(rejected("string literal")),
        Syntax::Constant(constant) => Err(rejected(&format!("constant '{}'", constant))),
        Syntax::Attribute { attr, .. } => Err(rejected(&format!("attribute access '.{}'", attr))),
        Syntax::Subscript { .. } => Err(rejected("subscripting")),
        Syntax::Slice { .. } => Err(rejected("slice")),
        Syntax::Unpack { op, .. } => Err(rejected(&format!("argument unpacking '{}'", op))),
        Syntax::Collection { kind, .. } => Err(rejected(&format!("{} literal", kind))),
        Syntax::Comprehension { kind, .. } => Err(rejected(&format!("{} comprehension", kind))),
        Syntax::Lambda { .. } => Err(rejected("lambda")),
        Syntax::Conditional { .. } => Err(rejected("conditional expression")),
        Syntax::Import(module) => Err(rejected(&format!("import of '{}'", module))),
        Syntax::Assign { target, .. } => Err(rejected(&format!("assignment to '{}'", target))),
    }
}

fn rejected(construct: &str) -> ExprError {
    ExprError::unsafe_construct(
        construct,
        "expressions may only use numbers, column names, arithmetic, comparisons, and/or/not and abs()",
    )
}

/// Reject reserved `__name__` identifiers
fn check_name(name: &str) -> ExprResult<()> {
    if name.starts_with("__") {
        return Err(ExprError::unsafe_construct(
            format!("name '{}'", name),
            "names starting with '__' are reserved",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, BoolOp, CompareOp, Function, UnaryOp};

    fn construct(text: &str) -> String {
        match parse_and_validate(text) {
            Err(ExprError::Unsafe { construct, .. }) => construct,
            other => panic!("Expected unsafe error for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_validate_scenario_expression() {
        let expr =
            parse_and_validate("abs(dem_h - terrain_h_te_best_fit) <= 3 and cloud_flag_atm < 3")
                .unwrap();

        let expected = Expr::BoolOp {
            op: BoolOp::And,
            operands: vec![
                Expr::compare(
                    CompareOp::Le,
                    Expr::Call {
                        func: Function::Abs,
                        args: vec![Expr::binary(
                            BinaryOp::Sub,
                            Expr::column("dem_h"),
                            Expr::column("terrain_h_te_best_fit"),
                        )],
                    },
                    Expr::Literal(3.0),
                ),
                Expr::compare(CompareOp::Lt, Expr::column("cloud_flag_atm"), Expr::Literal(3.0)),
            ],
        };
        assert_eq!(expr.root(), &expected);
        assert_eq!(
            expr.columns().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["cloud_flag_atm", "dem_h", "terrain_h_te_best_fit"]
        );
    }

    #[test]
    fn test_unary_minus_and_not() {
        let expr = parse_and_validate("not -x > 1").unwrap();
        assert_eq!(
            expr.root(),
            &Expr::unary(
                UnaryOp::Not,
                Expr::compare(
                    CompareOp::Gt,
                    Expr::unary(UnaryOp::Neg, Expr::column("x")),
                    Expr::Literal(1.0)
                )
            )
        );
    }

    #[test]
    fn test_rejects_import_call() {
        assert_eq!(construct("__import__('os')"), "call to '__import__'");
        assert_eq!(
            construct("__import__('os').system('echo hi')"),
            "call of a computed value"
        );
    }

    #[test]
    fn test_rejects_outermost_construct_first() {
        assert_eq!(construct("x.y > 0"), "attribute access '.y'");
        assert_eq!(construct("x > 0 and y[0] > 1"), "subscripting");
        assert_eq!(construct("open('f') > 0"), "call to 'open'");
    }

    #[test]
    fn test_rejects_chained_comparison() {
        assert_eq!(construct("0 <= x <= 10"), "chained comparison");
        assert!(parse_and_validate("0 <= x and x <= 10").is_ok());
    }

    #[test]
    fn test_rejects_bad_abs_calls() {
        assert_eq!(construct("abs(x, y) > 0"), "call to 'abs' with 2 arguments");
        assert_eq!(construct("abs() > 0"), "call to 'abs' with 0 arguments");
        assert_eq!(construct("abs(x=1) > 0"), "keyword argument");
        assert_eq!(construct("abs > 0"), "function 'abs' used as a value");
    }

    #[test]
    fn test_rejects_slices_and_unpacking() {
        assert_eq!(construct("dem_h[1:2] > 0"), "subscripting");
        assert_eq!(construct("dem_h[::2] > 0"), "subscripting");
        assert_eq!(construct("dem_h[0, 1] > 0"), "subscripting");
        assert_eq!(construct("open(*args) > 0"), "call to 'open'");
        assert_eq!(construct("abs(*args) > 0"), "argument unpacking '*'");
        assert_eq!(construct("abs(**kw) > 0"), "argument unpacking '**'");
        assert_eq!(construct("f'{dem_h}' == 1"), "string literal");
    }

    #[test]
    fn test_long_chain_is_a_syntax_error() {
        let chain = format!("x{} > 0", "+x".repeat(2040));
        assert!(chain.len() < DEFAULT_MAX_EXPRESSION_LEN);
        assert!(parse_and_validate(&chain).unwrap_err().is_syntax());
    }

    #[test]
    fn test_rejects_dunder_names() {
        assert_eq!(construct("__builtins__ > 0"), "name '__builtins__'");
    }

    #[test]
    fn test_length_limit() {
        let long = format!("x > {}", "1".repeat(64));
        let err = parse_and_validate_with_limit(&long, 16).unwrap_err();
        assert!(err.is_syntax());
        assert!(parse_and_validate_with_limit("x > 1", 16).is_ok());
    }

    #[test]
    fn test_display_matches_source_semantics() {
        let expr = parse_and_validate("(a+b)*2>=c or not d<1").unwrap();
        assert_eq!(expr.to_string(), "(a + b) * 2 >= c or not d < 1");
        let reparsed = parse_and_validate(&expr.to_string()).unwrap();
        assert_eq!(reparsed.root(), expr.root());
    }
}
