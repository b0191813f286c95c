//! Options file discovery and logging setup

use crate::error::CliError;
use pointsift_table::FilterOptions;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Default options file: `<config_dir>/pointsift/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pointsift").join("config.toml"))
}

/// Load options from `explicit`, else the default file when it exists,
/// else built-in defaults.
pub fn load_options(explicit: Option<&Path>) -> Result<FilterOptions, CliError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.is_file()),
    };

    let options = match path {
        Some(path) => {
            let text = fs::read_to_string(&path).map_err(|e| CliError::ReadFile {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            debug!(path = %path.display(), "loading options");
            FilterOptions::from_toml(&text)?
        }
        None => FilterOptions::default(),
    };

    options.validate()?;
    Ok(options)
}

/// Install the stderr log subscriber. `-v` selects debug and `-vv`
/// trace; without it `RUST_LOG` applies, defaulting to warnings only.
pub fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_env_filter(filter)
        .init();
}
