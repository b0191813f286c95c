//! In-memory column-oriented tables

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised when building or slicing a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Column '{name}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Mask has {actual} entries, table has {expected} rows")]
    MaskLength { expected: usize, actual: usize },
}

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Float64,
    Int64,
    Bool,
    Categorical,
}

impl ColumnType {
    /// Check if values of this type can take part in arithmetic
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnType::Categorical)
    }
}

/// A column of data
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    Categorical(Vec<String>),
}

impl Column {
    /// Get the column type
    pub fn dtype(&self) -> ColumnType {
        match self {
            Column::Float64(_) => ColumnType::Float64,
            Column::Int64(_) => ColumnType::Int64,
            Column::Bool(_) => ColumnType::Bool,
            Column::Categorical(_) => ColumnType::Categorical,
        }
    }

    /// Get the number of elements
    pub fn len(&self) -> usize {
        match self {
            Column::Float64(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    /// Check if the column is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the column as numbers; `None` for categorical data
    pub fn numeric(&self) -> Option<NumericColumn<'_>> {
        match self {
            Column::Float64(v) => Some(NumericColumn::Float64(v)),
            Column::Int64(v) => Some(NumericColumn::Int64(v)),
            Column::Bool(v) => Some(NumericColumn::Bool(v)),
            Column::Categorical(_) => None,
        }
    }

    /// Render a single cell as text; NaN renders empty and floats keep
    /// a decimal point so they read back as floats
    pub fn format_value(&self, row: usize) -> Option<String> {
        match self {
            Column::Float64(v) => v
                .get(row)
                .map(|x| if x.is_nan() { String::new() } else { format!("{:?}", x) }),
            Column::Int64(v) => v.get(row).map(|x| x.to_string()),
            Column::Bool(v) => v.get(row).map(|x| x.to_string()),
            Column::Categorical(v) => v.get(row).cloned(),
        }
    }

    /// Keep the entries whose mask bit is set, preserving order
    fn select(&self, mask: &[bool]) -> Column {
        fn keep<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter_map(|(v, &m)| if m { Some(v.clone()) } else { None })
                .collect()
        }

        match self {
            Column::Float64(v) => Column::Float64(keep(v, mask)),
            Column::Int64(v) => Column::Int64(keep(v, mask)),
            Column::Bool(v) => Column::Bool(keep(v, mask)),
            Column::Categorical(v) => Column::Categorical(keep(v, mask)),
        }
    }
}

/// Numeric view of a column; every value reads as `f64`
#[derive(Debug, Clone, Copy)]
pub enum NumericColumn<'a> {
    Float64(&'a [f64]),
    Int64(&'a [i64]),
    Bool(&'a [bool]),
}

impl NumericColumn<'_> {
    /// Value at `row` (booleans read as 1.0 / 0.0)
    #[inline]
    pub fn get(&self, row: usize) -> f64 {
        match self {
            NumericColumn::Float64(v) => v[row],
            NumericColumn::Int64(v) => v[row] as f64,
            NumericColumn::Bool(v) => {
                if v[row] {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// A named column with its data
#[derive(Debug, Clone, PartialEq)]
pub struct NamedColumn {
    pub name: String,
    pub data: Column,
}

/// An ordered set of equally long, uniquely named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<NamedColumn>,
    num_rows: usize,
}

impl Table {
    /// Build a table, checking names are unique and lengths agree
    pub fn new<S: Into<String>>(columns: Vec<(S, Column)>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        let mut named = Vec::with_capacity(columns.len());
        let mut num_rows = None;

        for (name, data) in columns {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(TableError::DuplicateColumn(name));
            }
            let expected = *num_rows.get_or_insert(data.len());
            if data.len() != expected {
                return Err(TableError::LengthMismatch {
                    name,
                    expected,
                    actual: data.len(),
                });
            }
            named.push(NamedColumn { name, data });
        }

        Ok(Self {
            columns: named,
            num_rows: num_rows.unwrap_or(0),
        })
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Get a column by name (case-sensitive)
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.data)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Get column names in table order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Iterate over columns in table order
    pub fn columns(&self) -> impl Iterator<Item = &NamedColumn> {
        self.columns.iter()
    }

    /// Rows whose mask entry is true, in their original order
    pub fn select(&self, mask: &[bool]) -> Result<Table, TableError> {
        if mask.len() != self.num_rows {
            return Err(TableError::MaskLength {
                expected: self.num_rows,
                actual: mask.len(),
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|c| NamedColumn {
                name: c.name.clone(),
                data: c.data.select(mask),
            })
            .collect();

        Ok(Table {
            columns,
            num_rows: mask.iter().filter(|&&m| m).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(vec![
            ("x", Column::Float64(vec![1.0, 2.0, 3.0])),
            ("n", Column::Int64(vec![10, 20, 30])),
            ("beam", Column::Categorical(vec!["gt1l".into(), "gt2l".into(), "gt3l".into()])),
        ])
        .unwrap()
    }

    #[test]
    fn test_column_lookup() {
        let table = sample();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_columns(), 3);
        assert_eq!(table.column_names(), vec!["x", "n", "beam"]);
        assert!(table.has_column("x"));
        assert!(!table.has_column("X"));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = Table::new(vec![
            ("x", Column::Float64(vec![1.0])),
            ("x", Column::Float64(vec![2.0])),
        ])
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("x".to_string()));
    }

    #[test]
    fn test_rejects_unequal_lengths() {
        let err = Table::new(vec![
            ("x", Column::Float64(vec![1.0, 2.0])),
            ("y", Column::Float64(vec![1.0])),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { .. }));
    }

    #[test]
    fn test_select_preserves_order() {
        let table = sample();
        let selected = table.select(&[true, false, true]).unwrap();
        assert_eq!(selected.num_rows(), 2);
        assert_eq!(selected.column("x"), Some(&Column::Float64(vec![1.0, 3.0])));
        assert_eq!(selected.column("n"), Some(&Column::Int64(vec![10, 30])));
        assert_eq!(
            selected.column("beam"),
            Some(&Column::Categorical(vec!["gt1l".into(), "gt3l".into()]))
        );
    }

    #[test]
    fn test_select_checks_mask_length() {
        let err = sample().select(&[true]).unwrap_err();
        assert_eq!(
            err,
            TableError::MaskLength {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn test_numeric_view() {
        let flags = Column::Bool(vec![true, false]);
        let view = flags.numeric().unwrap();
        assert_eq!(view.get(0), 1.0);
        assert_eq!(view.get(1), 0.0);
        assert!(Column::Categorical(vec![]).numeric().is_none());
        assert!(!ColumnType::Categorical.is_numeric());
    }
}
