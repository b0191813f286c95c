//! The fixed set of operators and functions an expression may use
//!
//! Built once on first use and never mutated afterwards. Anything that
//! does not resolve through one of these lookups is rejected.

use crate::ast::{BinaryOp, BoolOp, CompareOp, Function, UnaryOp};
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    /// The process-wide whitelist
    pub static ref WHITELIST: Whitelist = Whitelist::standard();
}

/// Permitted operator spellings and call targets
#[derive(Debug)]
pub struct Whitelist {
    binary: HashMap<&'static str, BinaryOp>,
    unary: HashMap<&'static str, UnaryOp>,
    boolean: HashMap<&'static str, BoolOp>,
    compare: HashMap<&'static str, CompareOp>,
    functions: HashMap<&'static str, Function>,
}

impl Whitelist {
    fn standard() -> Self {
        let binary = [
            ("+", BinaryOp::Add),
            ("-", BinaryOp::Sub),
            ("*", BinaryOp::Mul),
            ("/", BinaryOp::Div),
            ("**", BinaryOp::Pow),
        ];
        let unary = [("-", UnaryOp::Neg), ("not", UnaryOp::Not)];
        let boolean = [("and", BoolOp::And), ("or", BoolOp::Or)];
        let compare = [
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Le),
            (">", CompareOp::Gt),
            (">=", CompareOp::Ge),
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
        ];
        let functions = [("abs", Function::Abs)];

        Self {
            binary: binary.into_iter().collect(),
            unary: unary.into_iter().collect(),
            boolean: boolean.into_iter().collect(),
            compare: compare.into_iter().collect(),
            functions: functions.into_iter().collect(),
        }
    }

    pub fn binary_op(&self, symbol: &str) -> Option<BinaryOp> {
        self.binary.get(symbol).copied()
    }

    pub fn unary_op(&self, symbol: &str) -> Option<UnaryOp> {
        self.unary.get(symbol).copied()
    }

    pub fn bool_op(&self, symbol: &str) -> Option<BoolOp> {
        self.boolean.get(symbol).copied()
    }

    pub fn compare_op(&self, symbol: &str) -> Option<CompareOp> {
        self.compare.get(symbol).copied()
    }

    pub fn function(&self, name: &str) -> Option<Function> {
        self.functions.get(name).copied()
    }

    /// Sorted names of the callable functions
    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permitted_symbols() {
        assert_eq!(WHITELIST.binary_op("**"), Some(BinaryOp::Pow));
        assert_eq!(WHITELIST.unary_op("-"), Some(UnaryOp::Neg));
        assert_eq!(WHITELIST.unary_op("not"), Some(UnaryOp::Not));
        assert_eq!(WHITELIST.bool_op("or"), Some(BoolOp::Or));
        assert_eq!(WHITELIST.compare_op("!="), Some(CompareOp::Ne));
        assert_eq!(WHITELIST.function("abs"), Some(Function::Abs));
    }

    #[test]
    fn test_rejected_symbols() {
        for symbol in ["//", "%", "@", "&", "|", "^", "<<", ">>"] {
            assert_eq!(WHITELIST.binary_op(symbol), None, "{}", symbol);
        }
        assert_eq!(WHITELIST.unary_op("+"), None);
        assert_eq!(WHITELIST.unary_op("~"), None);
        for symbol in ["in", "not in", "is", "is not"] {
            assert_eq!(WHITELIST.compare_op(symbol), None, "{}", symbol);
        }
        for name in ["eval", "exec", "open", "__import__", "getattr", "Abs"] {
            assert_eq!(WHITELIST.function(name), None, "{}", name);
        }
    }

    #[test]
    fn test_function_names() {
        assert_eq!(WHITELIST.function_names(), vec!["abs"]);
    }
}
