//! Subcommand implementations

use crate::cli::{BatchArgs, CheckArgs, Cli, Commands, FilterArgs};
use crate::error::CliError;
use crate::settings::load_options;
use pointsift_expr::{parse_and_validate_with_limit, ExprCache, ValidatedExpr};
use pointsift_table::{
    filter_by_expr_with, filter_by_expression_with, read_table, write_table, FilterOptions,
    FilterSummary,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Run the selected subcommand
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let options = load_options(cli.config.as_deref())?;

    match &cli.command {
        Commands::Filter(args) => {
            filter(args, &options)?;
        }
        Commands::Check(args) => {
            check(args, &options)?;
        }
        Commands::Batch(args) => {
            let report = batch(args, &options)?;
            if !report.failures.is_empty() {
                return Err(CliError::BatchFailures {
                    failed: report.failures.len(),
                    total: report.total(),
                });
            }
        }
    }

    Ok(())
}

/// Filter one table and write the kept rows
pub fn filter(args: &FilterArgs, options: &FilterOptions) -> Result<FilterSummary, CliError> {
    let table = read_table(&args.input)?;
    let (kept, summary) = filter_by_expr_with(&table, &args.expr, options)?;
    write_table(&kept, &args.output)?;

    if args.summary {
        println!("[pointsift] filter summary: {}", summary);
    }
    if let Some(path) = &args.summary_json {
        write_json(path, &summary)?;
    }

    Ok(summary)
}

/// Validate an expression and print its canonical form and columns
pub fn check(args: &CheckArgs, options: &FilterOptions) -> Result<ValidatedExpr, CliError> {
    let expr = parse_and_validate_with_limit(&args.expr, options.max_expression_len)?;

    println!("{}", expr);
    let columns: Vec<&str> = expr.columns().iter().map(String::as_str).collect();
    println!("columns: {}", columns.join(", "));

    Ok(expr)
}

/// One line of the batch summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub file: String,
    #[serde(rename = "N_in")]
    pub n_in: usize,
    #[serde(rename = "N_out")]
    pub n_out: usize,
    pub pass_rate: f64,
    pub out_csv: String,
}

/// A table the batch could not process
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub file: String,
    pub message: String,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub rows: Vec<BatchRow>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    /// Number of tables attempted
    pub fn total(&self) -> usize {
        self.rows.len() + self.failures.len()
    }
}

/// Filter every `*.csv` table in `in_dir`, in name order.
///
/// The expression is validated once up front; a table that fails to
/// read, filter or write is reported and the batch moves on.
pub fn batch(args: &BatchArgs, options: &FilterOptions) -> Result<BatchReport, CliError> {
    let cache = ExprCache::with_max_len(options.max_expression_len);
    cache.get_or_compile(&args.expr)?;

    let files = list_tables(&args.in_dir)?;
    info!(count = files.len(), dir = %args.in_dir.display(), "starting batch");

    let mut report = BatchReport::default();
    for path in files {
        let name = file_name(&path);
        match process_one(&path, args, &cache, options) {
            Ok(row) => {
                info!(file = %row.file, n_in = row.n_in, n_out = row.n_out, "filtered table");
                report.rows.push(row);
            }
            Err(err) => {
                warn!(file = %name, error = %err, "skipping table");
                eprintln!("[pointsift] {} error: {}: {}", err.kind(), name, err);
                report.failures.push(BatchFailure {
                    file: name,
                    message: err.to_string(),
                });
            }
        }
    }

    if let Some(path) = &args.summary_csv {
        write_summary_csv(path, &report.rows)?;
    }
    if args.print_summary {
        print_summary(&report.rows);
    }

    Ok(report)
}

fn process_one(
    path: &Path,
    args: &BatchArgs,
    cache: &ExprCache,
    options: &FilterOptions,
) -> Result<BatchRow, CliError> {
    let expr = cache.get_or_compile(&args.expr)?;
    let table = read_table(path)?;
    let outcome = filter_by_expression_with(&table, &expr, options)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out_path = args.out_dir.join(format!("{}{}.csv", stem, args.suffix));
    write_table(&outcome.table, &out_path)?;

    Ok(BatchRow {
        file: file_name(path),
        n_in: outcome.summary.input_count,
        n_out: outcome.summary.output_count,
        pass_rate: outcome.summary.pass_rate,
        out_csv: out_path.display().to_string(),
    })
}

/// Sorted `*.csv` files directly inside `dir`
fn list_tables(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let read_err = |e: std::io::Error| CliError::ReadFile {
        path: dir.display().to_string(),
        message: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn create_parent(path: &Path) -> Result<(), CliError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| write_error(path, e))
        }
        _ => Ok(()),
    }
}

fn write_error(path: &Path, err: impl std::fmt::Display) -> CliError {
    CliError::WriteFile {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn write_json(path: &Path, summary: &FilterSummary) -> Result<(), CliError> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(summary).map_err(|e| write_error(path, e))?;
    fs::write(path, json).map_err(|e| write_error(path, e))
}

fn write_summary_csv(path: &Path, rows: &[BatchRow]) -> Result<(), CliError> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| write_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| write_error(path, e))?;
    }
    writer.flush().map_err(|e| write_error(path, e))
}

fn print_summary(rows: &[BatchRow]) {
    println!("{:<40} {:>10} {:>10} {:>9}", "file", "N_in", "N_out", "pass_rate");
    for row in rows {
        println!(
            "{:<40} {:>10} {:>10} {:>9.3}",
            row.file, row.n_in, row.n_out, row.pass_rate
        );
    }
}
