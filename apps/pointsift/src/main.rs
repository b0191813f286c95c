//! pointsift - Filter point tables with safe expressions

use clap::Parser;
use pointsift::cli::Cli;
use pointsift::{commands, settings};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    settings::init_logging(cli.verbose);

    match commands::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[pointsift] {} error: {}", err.kind(), err);
            ExitCode::from(err.exit_code())
        }
    }
}
