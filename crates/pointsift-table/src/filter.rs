//! Filtering tables with validated expressions

use crate::config::FilterOptions;
use crate::error::FilterResult;
use crate::eval::Predicate;
use crate::table::Table;
use pointsift_expr::{parse_and_validate_with_limit, ValidatedExpr};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Row counts for one filtering call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSummary {
    /// Expression text as given by the caller
    pub expression: String,
    pub input_count: usize,
    pub output_count: usize,
    /// `output_count / input_count`, or 0.0 for an empty table
    pub pass_rate: f64,
}

impl FilterSummary {
    /// Summarise a mask
    pub fn from_mask(expression: impl Into<String>, mask: &[bool]) -> Self {
        let input_count = mask.len();
        let output_count = count_selected(mask);
        let pass_rate = if input_count > 0 {
            output_count as f64 / input_count as f64
        } else {
            0.0
        };
        Self {
            expression: expression.into(),
            input_count,
            output_count,
            pass_rate,
        }
    }
}

impl fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N_total={} N_pass={} pass_rate={:.3}",
            self.input_count, self.output_count, self.pass_rate
        )
    }
}

/// Everything a filtering call produces
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Rows whose mask entry is true, in input order
    pub table: Table,
    /// One entry per input row
    pub mask: Vec<bool>,
    pub summary: FilterSummary,
}

/// Filter `table` with default options
pub fn filter_by_expression(table: &Table, expr: &ValidatedExpr) -> FilterResult<FilterOutcome> {
    filter_by_expression_with(table, expr, &FilterOptions::default())
}

/// Filter `table`, producing the mask, the selected rows and a summary.
///
/// Column resolution and type checks happen before any row is
/// evaluated, so a failure never leaves a partial mask behind.
pub fn filter_by_expression_with(
    table: &Table,
    expr: &ValidatedExpr,
    options: &FilterOptions,
) -> FilterResult<FilterOutcome> {
    let predicate = Predicate::bind(expr, table)?;
    let mask = predicate.mask(options.parallel_threshold);
    let filtered = table.select(&mask)?;
    let summary = FilterSummary::from_mask(expr.source(), &mask);

    debug!(
        expression = %expr,
        input = summary.input_count,
        output = summary.output_count,
        "filtered table"
    );

    Ok(FilterOutcome {
        table: filtered,
        mask,
        summary,
    })
}

/// Validate `text` and filter `table` in one call
pub fn filter_by_expr(table: &Table, text: &str) -> FilterResult<(Table, FilterSummary)> {
    filter_by_expr_with(table, text, &FilterOptions::default())
}

/// Validate `text` under `options` and filter `table`
pub fn filter_by_expr_with(
    table: &Table,
    text: &str,
    options: &FilterOptions,
) -> FilterResult<(Table, FilterSummary)> {
    let expr = parse_and_validate_with_limit(text, options.max_expression_len)?;
    let outcome = filter_by_expression_with(table, &expr, options)?;
    Ok((outcome.table, outcome.summary))
}

/// Count selected rows
pub fn count_selected(mask: &[bool]) -> usize {
    mask.iter().filter(|&&b| b).count()
}

/// Get indices of selected rows
pub fn selected_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &b)| if b { Some(i) } else { None })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_pass_rate() {
        let summary = FilterSummary::from_mask("x > 0", &[true, false, false, true]);
        assert_eq!(summary.input_count, 4);
        assert_eq!(summary.output_count, 2);
        assert_eq!(summary.pass_rate, 0.5);
        assert_eq!(summary.to_string(), "N_total=4 N_pass=2 pass_rate=0.500");
    }

    #[test]
    fn test_empty_mask_has_zero_pass_rate() {
        let summary = FilterSummary::from_mask("x > 0", &[]);
        assert_eq!(summary.input_count, 0);
        assert_eq!(summary.pass_rate, 0.0);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let summary = FilterSummary::from_mask("x > 0", &[true, false]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["expression"], "x > 0");
        assert_eq!(json["output_count"], 1);
        assert_eq!(json["pass_rate"], 0.5);
    }

    #[test]
    fn test_mask_helpers() {
        let mask = [false, true, true, false, true];
        assert_eq!(count_selected(&mask), 3);
        assert_eq!(selected_indices(&mask), vec![1, 2, 4]);
    }
}
