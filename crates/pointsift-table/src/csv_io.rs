//! CSV/TSV table reader and writer with type inference

use crate::table::{Column, ColumnType, Table, TableError};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// I/O errors
#[derive(Debug, Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0} (expected .csv or .tsv)")]
    UnsupportedFormat(String),

    #[error("Invalid CSV: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl From<csv::Error> for IoError {
    fn from(err: csv::Error) -> Self {
        IoError::Csv(err.to_string())
    }
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;

/// Field delimiter implied by the file extension
fn delimiter_for(path: &Path) -> IoResult<u8> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => Ok(b','),
        Some("tsv") => Ok(b'\t'),
        _ => Err(IoError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Read a delimited file with a header row into a table
pub fn read_table(path: impl AsRef<Path>) -> IoResult<Table> {
    let path = path.as_ref();
    let delimiter = delimiter_for(path)?;
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let mut values: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in reader.records() {
        let record = result?;
        for (column, value) in values.iter_mut().zip(record.iter()) {
            column.push(value.trim().to_string());
        }
    }

    let columns: Vec<(String, Column)> = headers
        .into_iter()
        .zip(values)
        .map(|(name, raw)| {
            let column = parse_column(&raw, infer_type(&raw));
            (name, column)
        })
        .collect();

    let table = Table::new(columns)?;
    debug!(
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "read table"
    );
    Ok(table)
}

/// Write a table with a header row, creating parent directories
pub fn write_table(table: &Table, path: impl AsRef<Path>) -> IoResult<()> {
    let path = path.as_ref();
    let delimiter = delimiter_for(path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(BufWriter::new(file));

    writer.write_record(table.column_names())?;
    for row in 0..table.num_rows() {
        writer.write_record(
            table
                .columns()
                .map(|c| c.data.format_value(row).unwrap_or_default()),
        )?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = table.num_rows(), "wrote table");
    Ok(())
}

/// Infer a column type from every value in the column
fn infer_type(values: &[String]) -> ColumnType {
    let non_empty: Vec<&str> = values
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    // Nothing to go on; treat as missing numbers
    if non_empty.is_empty() {
        return ColumnType::Float64;
    }

    if non_empty.iter().all(|s| s.parse::<i64>().is_ok()) {
        // Integers cannot hold a missing value
        return if non_empty.len() == values.len() {
            ColumnType::Int64
        } else {
            ColumnType::Float64
        };
    }

    if non_empty.iter().all(|s| s.parse::<f64>().is_ok()) {
        return ColumnType::Float64;
    }

    if non_empty
        .iter()
        .all(|s| matches!(s.to_ascii_lowercase().as_str(), "true" | "false"))
    {
        return ColumnType::Bool;
    }

    ColumnType::Categorical
}

/// Parse column values into a Column
fn parse_column(values: &[String], dtype: ColumnType) -> Column {
    match dtype {
        ColumnType::Float64 => Column::Float64(
            values
                .iter()
                .map(|s| s.parse().unwrap_or(f64::NAN))
                .collect(),
        ),
        ColumnType::Int64 => Column::Int64(values.iter().map(|s| s.parse().unwrap_or(0)).collect()),
        ColumnType::Bool => Column::Bool(
            values
                .iter()
                .map(|s| s.eq_ignore_ascii_case("true"))
                .collect(),
        ),
        ColumnType::Categorical => Column::Categorical(values.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_infer_type() {
        assert_eq!(infer_type(&strings(&["1", "2", "3"])), ColumnType::Int64);
        assert_eq!(infer_type(&strings(&["1", "", "3"])), ColumnType::Float64);
        assert_eq!(infer_type(&strings(&["1.5", "2", "-3e2"])), ColumnType::Float64);
        assert_eq!(infer_type(&strings(&["True", "false"])), ColumnType::Bool);
        assert_eq!(infer_type(&strings(&["gt1l", "gt2r"])), ColumnType::Categorical);
        assert_eq!(infer_type(&strings(&["", ""])), ColumnType::Float64);
    }

    #[test]
    fn test_parse_missing_floats_as_nan() {
        let column = parse_column(&strings(&["1", "", "3"]), ColumnType::Float64);
        match column {
            Column::Float64(v) => {
                assert_eq!(v[0], 1.0);
                assert!(v[1].is_nan());
                assert_eq!(v[2], 3.0);
            }
            other => panic!("Expected Float64, got {:?}", other),
        }
    }

    #[test]
    fn test_delimiter_from_extension() {
        assert_eq!(delimiter_for(Path::new("a.csv")).unwrap(), b',');
        assert_eq!(delimiter_for(Path::new("a.TSV")).unwrap(), b'\t');
        assert!(matches!(
            delimiter_for(Path::new("a.parquet")),
            Err(IoError::UnsupportedFormat(_))
        ));
    }
}
