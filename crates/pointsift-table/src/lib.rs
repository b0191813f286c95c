//! pointsift-table - Filtering point tables with safe expressions
//!
//! Binds a [`ValidatedExpr`](pointsift_expr::ValidatedExpr) to a
//! column-oriented [`Table`] and evaluates it row by row into a mask, the
//! selected rows and a [`FilterSummary`].
//!
//! # Examples
//!
//! ```
//! use pointsift_table::{filter_by_expr, Column, Table};
//!
//! let table = Table::new(vec![
//!     ("dem_h", Column::Float64(vec![10.0, 10.0, 5.0])),
//!     ("terrain_h_te_best_fit", Column::Float64(vec![8.0, 2.0, 5.0])),
//!     ("cloud_flag_atm", Column::Int64(vec![1, 1, 5])),
//! ])
//! .unwrap();
//!
//! let (kept, summary) = filter_by_expr(
//!     &table,
//!     "abs(dem_h - terrain_h_te_best_fit) <= 3 and cloud_flag_atm < 3",
//! )
//! .unwrap();
//! assert_eq!(kept.num_rows(), 1);
//! assert_eq!(summary.to_string(), "N_total=3 N_pass=1 pass_rate=0.333");
//! ```

pub mod config;
#[cfg(feature = "csv")]
pub mod csv_io;
pub mod error;
pub mod eval;
pub mod filter;
pub mod table;

pub use config::{ConfigError, FilterOptions, DEFAULT_PARALLEL_THRESHOLD};
#[cfg(feature = "csv")]
pub use csv_io::{read_table, write_table, IoError, IoResult};
pub use error::{FilterError, FilterResult};
pub use eval::{BoolExpr, NumExpr, Predicate};
pub use filter::{
    count_selected, filter_by_expr, filter_by_expr_with, filter_by_expression,
    filter_by_expression_with, selected_indices, FilterOutcome, FilterSummary,
};
pub use table::{Column, ColumnType, NamedColumn, NumericColumn, Table, TableError};
