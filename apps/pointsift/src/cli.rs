//! Command-line arguments

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pointsift")]
#[command(version, about = "Filter point tables with safe expressions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a TOML options file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter one table with an expression
    Filter(FilterArgs),

    /// Validate an expression without reading any table
    Check(CheckArgs),

    /// Filter every CSV table in a directory with one expression
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Input table (.csv or .tsv)
    #[arg(long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// Output table (.csv or .tsv)
    #[arg(long = "out", value_name = "FILE")]
    pub output: PathBuf,

    /// Filter expression, e.g. "abs(dem_h - h_te_best_fit) <= 3"
    #[arg(long)]
    pub expr: String,

    /// Print the row counts after filtering
    #[arg(long)]
    pub summary: bool,

    /// Write the summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Expression to validate
    #[arg(long)]
    pub expr: String,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Folder containing the input CSV tables
    #[arg(long, value_name = "DIR")]
    pub in_dir: PathBuf,

    /// Folder for the filtered tables
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Filter expression applied to every table
    #[arg(long)]
    pub expr: String,

    /// Appended to each input file stem to name its output
    #[arg(long, default_value = "_filtered")]
    pub suffix: String,

    /// Write the per-file summary table to this CSV file
    #[arg(long, value_name = "FILE")]
    pub summary_csv: Option<PathBuf>,

    /// Print the per-file summary table to stdout
    #[arg(long)]
    pub print_summary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_filter() {
        let cli = Cli::try_parse_from([
            "pointsift", "-vv", "filter", "--in", "a.csv", "--out", "b.csv", "--expr", "x > 0",
            "--summary",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Filter(args) => {
                assert_eq!(args.input, PathBuf::from("a.csv"));
                assert_eq!(args.expr, "x > 0");
                assert!(args.summary);
                assert!(args.summary_json.is_none());
            }
            other => panic!("Expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_defaults() {
        let cli = Cli::try_parse_from([
            "pointsift", "batch", "--in-dir", "in", "--out-dir", "out", "--expr", "x > 0",
        ])
        .unwrap();
        match cli.command {
            Commands::Batch(args) => {
                assert_eq!(args.suffix, "_filtered");
                assert!(!args.print_summary);
            }
            other => panic!("Expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_expr_is_rejected() {
        assert!(Cli::try_parse_from(["pointsift", "check"]).is_err());
    }
}
