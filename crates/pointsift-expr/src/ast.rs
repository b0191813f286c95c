//! Abstract Syntax Tree for validated filter expressions
//!
//! Every variant here is a permitted construct. The raw parse tree
//! (see [`crate::syntax`]) can represent far more; only what survives
//! validation is ever turned into an [`Expr`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A validated expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A numeric literal
    Literal(f64),

    /// Reference to a table column, resolved at evaluation time
    Column(String),

    /// Unary negation or logical NOT
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Arithmetic on two operands
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Logical AND / OR over two or more operands
    BoolOp { op: BoolOp, operands: Vec<Expr> },

    /// A single (never chained) comparison
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// A call to a whitelisted function
    Call { func: Function, args: Vec<Expr> },
}

impl Expr {
    /// Create a column reference
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    /// Create a unary expression
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a binary arithmetic expression
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a comparison
    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Names of all columns referenced anywhere in the tree
    pub fn columns(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_columns(&mut names);
        names
    }

    fn collect_columns(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(name) => {
                names.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_columns(names),
            Expr::Binary { left, right, .. } | Expr::Compare { left, right, .. } => {
                left.collect_columns(names);
                right.collect_columns(names);
            }
            Expr::BoolOp { operands, .. } => {
                for operand in operands {
                    operand.collect_columns(names);
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(names);
                }
            }
        }
    }

    /// Statically infer the type this node evaluates to.
    ///
    /// Columns are assumed numeric here; whether a given table actually
    /// stores numbers under that name is checked when binding.
    pub fn value_type(&self) -> Result<ValueType, TypeMismatch> {
        match self {
            Expr::Literal(_) | Expr::Column(_) => Ok(ValueType::Number),

            Expr::Unary { op, operand } => {
                let expected = match op {
                    UnaryOp::Neg => ValueType::Number,
                    UnaryOp::Not => ValueType::Boolean,
                };
                expect(operand, expected, op.as_str())?;
                Ok(expected)
            }

            Expr::Binary { op, left, right } => {
                expect(left, ValueType::Number, op.as_str())?;
                expect(right, ValueType::Number, op.as_str())?;
                Ok(ValueType::Number)
            }

            Expr::BoolOp { op, operands } => {
                for operand in operands {
                    expect(operand, ValueType::Boolean, op.as_str())?;
                }
                Ok(ValueType::Boolean)
            }

            Expr::Compare { op, left, right } => {
                if op.is_ordering() {
                    expect(left, ValueType::Number, op.as_str())?;
                    expect(right, ValueType::Number, op.as_str())?;
                } else {
                    let lhs = left.value_type()?;
                    expect(right, lhs, op.as_str())?;
                }
                Ok(ValueType::Boolean)
            }

            Expr::Call { func, args } => {
                for arg in args {
                    expect(arg, ValueType::Number, func.name())?;
                }
                Ok(ValueType::Number)
            }
        }
    }

    /// Binding strength used when rendering; higher binds tighter
    fn precedence(&self) -> u8 {
        match self {
            Expr::BoolOp { op: BoolOp::Or, .. } => 1,
            Expr::BoolOp { op: BoolOp::And, .. } => 2,
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => 3,
            Expr::Compare { .. } => 4,
            Expr::Binary { op, .. } => match op {
                BinaryOp::Add | BinaryOp::Sub => 5,
                BinaryOp::Mul | BinaryOp::Div => 6,
                BinaryOp::Pow => 8,
            },
            Expr::Unary {
                op: UnaryOp::Neg, ..
            } => 7,
            Expr::Literal(_) | Expr::Column(_) | Expr::Call { .. } => 9,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

fn expect(expr: &Expr, expected: ValueType, construct: &str) -> Result<(), TypeMismatch> {
    let found = expr.value_type()?;
    if found == expected {
        Ok(())
    } else {
        Err(TypeMismatch {
            construct: construct.to_string(),
            expected,
            found,
        })
    }
}

/// Renders the canonical, fully-parenthesised-where-needed form.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let own = self.precedence();
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Unary { op, operand } => {
                match op {
                    UnaryOp::Neg => write!(f, "-")?,
                    UnaryOp::Not => write!(f, "not ")?,
                }
                operand.fmt_child(f, own)
            }
            Expr::Binary { op, left, right } => {
                // `**` is right-associative, everything else left-associative
                let (lmin, rmin) = if *op == BinaryOp::Pow {
                    (own + 1, own)
                } else {
                    (own, own + 1)
                };
                left.fmt_child(f, lmin)?;
                write!(f, " {} ", op.as_str())?;
                right.fmt_child(f, rmin)
            }
            Expr::BoolOp { op, operands } => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.as_str())?;
                    }
                    operand.fmt_child(f, own + 1)?;
                }
                Ok(())
            }
            Expr::Compare { op, left, right } => {
                left.fmt_child(f, own + 1)?;
                write!(f, " {} ", op.as_str())?;
                right.fmt_child(f, own + 1)
            }
            Expr::Call { func, args } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Arithmetic negation (-)
    Neg,
    /// Logical negation (not)
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    /// Apply the operator with IEEE 754 semantics (x / 0.0 is inf or NaN)
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
}

impl CompareOp {
    /// Compare two numbers. Any NaN operand makes every operator,
    /// `!=` included, evaluate to false.
    pub fn evaluate(&self, lhs: f64, rhs: f64) -> bool {
        if lhs.is_nan() || rhs.is_nan() {
            return false;
        }
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
        }
    }

    /// Compare two booleans; only `==` and `!=` are meaningful
    pub fn evaluate_bool(&self, lhs: bool, rhs: bool) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            _ => false,
        }
    }

    /// True for `<`, `<=`, `>`, `>=`
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

/// Functions callable from an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    /// Absolute value
    Abs,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Abs => "abs",
        }
    }

    /// Exact number of positional arguments
    pub fn arity(&self) -> usize {
        match self {
            Function::Abs => 1,
        }
    }

    pub fn apply(&self, arg: f64) -> f64 {
        match self {
            Function::Abs => arg.abs(),
        }
    }
}

/// Static type of an expression node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Number,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Number => write!(f, "number"),
            ValueType::Boolean => write!(f, "boolean"),
        }
    }
}

/// A node whose operands have the wrong type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    /// Operator or function that rejected its operand
    pub construct: String,
    pub expected: ValueType,
    pub found: ValueType,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' expects {} operands, got {}",
            self.construct, self.expected, self.found
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gt(name: &str, value: f64) -> Expr {
        Expr::compare(CompareOp::Gt, Expr::column(name), Expr::Literal(value))
    }

    #[test]
    fn test_comparison_operators() {
        assert!(CompareOp::Lt.evaluate(1.0, 2.0));
        assert!(!CompareOp::Lt.evaluate(2.0, 1.0));
        assert!(CompareOp::Le.evaluate(1.0, 1.0));
        assert!(CompareOp::Gt.evaluate(2.0, 1.0));
        assert!(CompareOp::Eq.evaluate(1.0, 1.0));
        assert!(CompareOp::Ne.evaluate(1.0, 2.0));
    }

    #[test]
    fn test_nan_never_compares() {
        for op in [
            CompareOp::Lt,
            CompareOp::Le,
            CompareOp::Gt,
            CompareOp::Ge,
            CompareOp::Eq,
            CompareOp::Ne,
        ] {
            assert!(!op.evaluate(f64::NAN, 0.0), "{} with NaN lhs", op.as_str());
            assert!(!op.evaluate(0.0, f64::NAN), "{} with NaN rhs", op.as_str());
        }
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        assert_eq!(BinaryOp::Div.apply(1.0, 0.0), f64::INFINITY);
        assert_eq!(BinaryOp::Div.apply(-1.0, 0.0), f64::NEG_INFINITY);
        assert!(BinaryOp::Div.apply(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_columns_are_deduplicated() {
        let expr = Expr::BoolOp {
            op: BoolOp::And,
            operands: vec![gt("b", 0.0), gt("a", 1.0), gt("b", 2.0)],
        };
        let names: Vec<_> = expr.columns().into_iter().collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_value_type_rules() {
        assert_eq!(gt("x", 0.0).value_type(), Ok(ValueType::Boolean));

        let sum = Expr::binary(BinaryOp::Add, Expr::column("x"), Expr::column("y"));
        assert_eq!(sum.value_type(), Ok(ValueType::Number));

        let bad = Expr::binary(BinaryOp::Add, gt("x", 0.0), Expr::Literal(1.0));
        let err = bad.value_type().unwrap_err();
        assert_eq!(err.construct, "+");
        assert_eq!(err.found, ValueType::Boolean);

        let not_number = Expr::unary(UnaryOp::Not, Expr::column("x"));
        assert!(not_number.value_type().is_err());

        let bool_eq = Expr::compare(CompareOp::Eq, gt("x", 0.0), gt("y", 0.0));
        assert_eq!(bool_eq.value_type(), Ok(ValueType::Boolean));

        let bool_lt = Expr::compare(CompareOp::Lt, gt("x", 0.0), gt("y", 0.0));
        assert!(bool_lt.value_type().is_err());
    }

    #[test]
    fn test_display_parenthesises_by_precedence() {
        let expr = Expr::binary(
            BinaryOp::Mul,
            Expr::binary(BinaryOp::Add, Expr::column("a"), Expr::column("b")),
            Expr::Literal(2.0),
        );
        assert_eq!(expr.to_string(), "(a + b) * 2");

        let pow = Expr::binary(
            BinaryOp::Pow,
            Expr::binary(BinaryOp::Pow, Expr::column("a"), Expr::column("b")),
            Expr::column("c"),
        );
        assert_eq!(pow.to_string(), "(a ** b) ** c");

        let neg_pow = Expr::unary(
            UnaryOp::Neg,
            Expr::binary(BinaryOp::Pow, Expr::Literal(2.0), Expr::Literal(2.0)),
        );
        assert_eq!(neg_pow.to_string(), "-2 ** 2");
    }
}
