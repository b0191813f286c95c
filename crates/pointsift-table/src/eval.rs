//! Binding and evaluation of validated expressions over table rows
//!
//! Binding resolves every column reference to a numeric column view and
//! checks operand types once, producing a [`Predicate`] whose per-row
//! evaluation cannot fail.

use crate::error::{FilterError, FilterResult};
use crate::table::{NumericColumn, Table};
use pointsift_expr::{BinaryOp, BoolOp, CompareOp, Expr, Function, UnaryOp, ValidatedExpr, ValueType};
use rayon::prelude::*;
use tracing::debug;

/// A numeric sub-expression bound to table columns
#[derive(Debug, Clone)]
pub enum NumExpr<'t> {
    Const(f64),
    Column(NumericColumn<'t>),
    Neg(Box<NumExpr<'t>>),
    Binary {
        op: BinaryOp,
        left: Box<NumExpr<'t>>,
        right: Box<NumExpr<'t>>,
    },
    Call {
        func: Function,
        arg: Box<NumExpr<'t>>,
    },
}

impl NumExpr<'_> {
    pub fn eval(&self, row: usize) -> f64 {
        match self {
            NumExpr::Const(v) => *v,
            NumExpr::Column(col) => col.get(row),
            NumExpr::Neg(operand) => -operand.eval(row),
            NumExpr::Binary { op, left, right } => op.apply(left.eval(row), right.eval(row)),
            NumExpr::Call { func, arg } => func.apply(arg.eval(row)),
        }
    }
}

/// A boolean sub-expression bound to table columns
#[derive(Debug, Clone)]
pub enum BoolExpr<'t> {
    /// Numeric comparison
    Compare {
        op: CompareOp,
        left: NumExpr<'t>,
        right: NumExpr<'t>,
    },
    /// `==` / `!=` between two boolean operands
    Equivalence {
        op: CompareOp,
        left: Box<BoolExpr<'t>>,
        right: Box<BoolExpr<'t>>,
    },
    Not(Box<BoolExpr<'t>>),
    And(Vec<BoolExpr<'t>>),
    Or(Vec<BoolExpr<'t>>),
}

impl BoolExpr<'_> {
    pub fn eval(&self, row: usize) -> bool {
        match self {
            BoolExpr::Compare { op, left, right } => op.evaluate(left.eval(row), right.eval(row)),
            BoolExpr::Equivalence { op, left, right } => {
                op.evaluate_bool(left.eval(row), right.eval(row))
            }
            BoolExpr::Not(operand) => !operand.eval(row),
            BoolExpr::And(operands) => operands.iter().all(|e| e.eval(row)),
            BoolExpr::Or(operands) => operands.iter().any(|e| e.eval(row)),
        }
    }
}

/// A validated expression bound to one table
#[derive(Debug, Clone)]
pub struct Predicate<'t> {
    root: BoolExpr<'t>,
    num_rows: usize,
}

impl<'t> Predicate<'t> {
    /// Bind `expr` to `table`.
    ///
    /// Fails with `UnknownColumn` (listing every missing name) before
    /// anything else is checked, then with `TypeEvaluation` if the tree
    /// does not yield a boolean or touches a categorical column.
    pub fn bind(expr: &ValidatedExpr, table: &'t Table) -> FilterResult<Self> {
        let missing: Vec<String> = expr
            .columns()
            .iter()
            .filter(|name| !table.has_column(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(FilterError::UnknownColumn { missing });
        }

        let root_type = expr
            .root()
            .value_type()
            .map_err(|e| FilterError::TypeEvaluation(e.to_string()))?;
        if root_type != ValueType::Boolean {
            return Err(FilterError::TypeEvaluation(format!(
                "expression '{}' evaluates to a {}, not a boolean",
                expr, root_type
            )));
        }

        let root = bind_bool(expr.root(), table)?;
        debug!(expression = %expr, rows = table.num_rows(), "bound expression");
        Ok(Self {
            root,
            num_rows: table.num_rows(),
        })
    }

    /// Evaluate a single row
    pub fn eval_row(&self, row: usize) -> bool {
        self.root.eval(row)
    }

    /// Number of rows in the bound table
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Evaluate every row; runs on the rayon pool once the table has at
    /// least `parallel_threshold` rows. Entry `i` always belongs to row `i`.
    pub fn mask(&self, parallel_threshold: usize) -> Vec<bool> {
        if self.num_rows >= parallel_threshold {
            debug!(rows = self.num_rows, "evaluating mask in parallel");
            (0..self.num_rows)
                .into_par_iter()
                .map(|row| self.root.eval(row))
                .collect()
        } else {
            (0..self.num_rows).map(|row| self.root.eval(row)).collect()
        }
    }
}

fn bind_num<'t>(expr: &Expr, table: &'t Table) -> FilterResult<NumExpr<'t>> {
    match expr {
        Expr::Literal(v) => Ok(NumExpr::Const(*v)),

        Expr::Column(name) => {
            let column = table
                .column(name)
                .ok_or_else(|| FilterError::UnknownColumn {
                    missing: vec![name.clone()],
                })?;
            column.numeric().map(NumExpr::Column).ok_or_else(|| {
                FilterError::TypeEvaluation(format!(
                    "column '{}' is categorical and cannot be used as a number",
                    name
                ))
            })
        }

        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Ok(NumExpr::Neg(Box::new(bind_num(operand, table)?))),

        Expr::Binary { op, left, right } => Ok(NumExpr::Binary {
            op: *op,
            left: Box::new(bind_num(left, table)?),
            right: Box::new(bind_num(right, table)?),
        }),

        Expr::Call { func, args } => match args.as_slice() {
            [arg] => Ok(NumExpr::Call {
                func: *func,
                arg: Box::new(bind_num(arg, table)?),
            }),
            _ => Err(FilterError::TypeEvaluation(format!(
                "'{}' takes {} argument(s), got {}",
                func.name(),
                func.arity(),
                args.len()
            ))),
        },

        other => Err(FilterError::TypeEvaluation(format!(
            "'{}' is a boolean where a number is expected",
            other
        ))),
    }
}

fn bind_bool<'t>(expr: &Expr, table: &'t Table) -> FilterResult<BoolExpr<'t>> {
    match expr {
        Expr::Compare { op, left, right } => {
            let operands = left
                .value_type()
                .map_err(|e| FilterError::TypeEvaluation(e.to_string()))?;
            match operands {
                ValueType::Number => Ok(BoolExpr::Compare {
                    op: *op,
                    left: bind_num(left, table)?,
                    right: bind_num(right, table)?,
                }),
                ValueType::Boolean if !op.is_ordering() => Ok(BoolExpr::Equivalence {
                    op: *op,
                    left: Box::new(bind_bool(left, table)?),
                    right: Box::new(bind_bool(right, table)?),
                }),
                ValueType::Boolean => Err(FilterError::TypeEvaluation(format!(
                    "'{}' cannot order boolean operands",
                    op.as_str()
                ))),
            }
        }

        Expr::Unary {
            op: UnaryOp::Not,
            operand,
        } => Ok(BoolExpr::Not(Box::new(bind_bool(operand, table)?))),

        Expr::BoolOp { op, operands } => {
            let bound = operands
                .iter()
                .map(|operand| bind_bool(operand, table))
                .collect::<FilterResult<Vec<_>>>()?;
            Ok(match op {
                BoolOp::And => BoolExpr::And(bound),
                BoolOp::Or => BoolExpr::Or(bound),
            })
        }

        other => Err(FilterError::TypeEvaluation(format!(
            "'{}' is a number where a boolean is expected",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use pointsift_expr::parse_and_validate;

    fn table() -> Table {
        Table::new(vec![
            ("x", Column::Float64(vec![1.0, -2.0, f64::NAN, 4.0])),
            ("n", Column::Int64(vec![1, 2, 3, 4])),
            ("flag", Column::Bool(vec![true, false, true, false])),
            ("beam", Column::Categorical(vec!["a".into(), "b".into(), "c".into(), "d".into()])),
        ])
        .unwrap()
    }

    fn mask(text: &str) -> FilterResult<Vec<bool>> {
        let expr = parse_and_validate(text).unwrap();
        let table = table();
        let predicate = Predicate::bind(&expr, &table)?;
        Ok(predicate.mask(usize::MAX))
    }

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(mask("x > 0").unwrap(), vec![true, false, false, true]);
        assert_eq!(mask("abs(x) >= 2").unwrap(), vec![false, true, false, true]);
    }

    #[test]
    fn test_nan_fails_every_comparison() {
        assert_eq!(mask("x != 100").unwrap(), vec![true, true, false, true]);
        assert_eq!(mask("x == x").unwrap(), vec![true, true, false, true]);
    }

    #[test]
    fn test_int_and_bool_columns_are_numeric() {
        assert_eq!(mask("n * 2 > 4").unwrap(), vec![false, false, true, true]);
        assert_eq!(mask("flag == 1").unwrap(), vec![true, false, true, false]);
    }

    #[test]
    fn test_boolean_equivalence() {
        assert_eq!(
            mask("(x > 0) == (n > 2)").unwrap(),
            vec![false, true, false, true]
        );
    }

    #[test]
    fn test_logic() {
        assert_eq!(mask("not x > 0").unwrap(), vec![false, true, true, false]);
        assert_eq!(mask("x > 0 or n == 2").unwrap(), vec![true, true, false, true]);
        assert_eq!(mask("x > 0 and n > 1").unwrap(), vec![false, false, false, true]);
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        assert_eq!(mask("x / 0 > 1000").unwrap(), vec![true, false, false, true]);
    }

    #[test]
    fn test_non_boolean_root_is_type_error() {
        let err = mask("x + n").unwrap_err();
        assert!(matches!(err, FilterError::TypeEvaluation(_)));
    }

    #[test]
    fn test_mixed_operands_are_type_errors() {
        assert!(matches!(mask("(x > 0) + 1 > 0"), Err(FilterError::TypeEvaluation(_))));
        assert!(matches!(mask("(x > 0) < (n > 1)"), Err(FilterError::TypeEvaluation(_))));
        assert!(matches!(mask("(x > 0) == 1"), Err(FilterError::TypeEvaluation(_))));
        assert!(matches!(mask("x > 0 and n"), Err(FilterError::TypeEvaluation(_))));
    }

    #[test]
    fn test_categorical_column_is_type_error() {
        let err = mask("beam > 0").unwrap_err();
        match err {
            FilterError::TypeEvaluation(msg) => assert!(msg.contains("beam")),
            other => panic!("Expected type error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_columns_are_reported_together() {
        let err = mask("zeta > 0 and alpha < 1 and x > 0").unwrap_err();
        assert_eq!(
            err,
            FilterError::UnknownColumn {
                missing: vec!["alpha".to_string(), "zeta".to_string()]
            }
        );
    }

    #[test]
    fn test_unknown_column_wins_over_type_error() {
        let err = mask("missing + 1").unwrap_err();
        assert!(matches!(err, FilterError::UnknownColumn { .. }));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let values: Vec<f64> = (0..10_000).map(|i| ((i * 7919) % 1000) as f64 - 500.0).collect();
        let table = Table::new(vec![("v", Column::Float64(values))]).unwrap();
        let expr = parse_and_validate("abs(v) < 250 or v ** 2 > 200000").unwrap();
        let predicate = Predicate::bind(&expr, &table).unwrap();

        assert_eq!(predicate.mask(usize::MAX), predicate.mask(0));
        assert_eq!(predicate.num_rows(), 10_000);
    }
}
