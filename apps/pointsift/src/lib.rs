//! pointsift - command-line filtering of point tables
//!
//! The binary is a thin wrapper; subcommands live here so they can be
//! driven directly from tests.

pub mod cli;
pub mod commands;
pub mod error;
pub mod settings;

pub use error::CliError;
