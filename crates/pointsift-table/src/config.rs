//! Filter options

use pointsift_expr::DEFAULT_MAX_EXPRESSION_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tables with at least this many rows are evaluated on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 65_536;

/// Tunables for validating and evaluating filter expressions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Row count at which mask evaluation switches to parallel
    pub parallel_threshold: usize,

    /// Longest expression text accepted, in bytes
    pub max_expression_len: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            max_expression_len: DEFAULT_MAX_EXPRESSION_LEN,
        }
    }
}

impl FilterOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a TOML string; missing keys keep their defaults
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize options to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate option values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_expression_len == 0 {
            return Err(ConfigError::OutOfRange(
                "max_expression_len must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = FilterOptions::default();
        assert_eq!(options.parallel_threshold, 65_536);
        assert_eq!(options.max_expression_len, 4096);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let options = FilterOptions {
            parallel_threshold: 10,
            max_expression_len: 128,
        };
        let text = options.to_toml().unwrap();
        assert_eq!(FilterOptions::from_toml(&text).unwrap(), options);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options = FilterOptions::from_toml("parallel_threshold = 1000\n").unwrap();
        assert_eq!(options.parallel_threshold, 1000);
        assert_eq!(options.max_expression_len, DEFAULT_MAX_EXPRESSION_LEN);
    }

    #[test]
    fn test_invalid_toml() {
        let err = FilterOptions::from_toml("parallel_threshold = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_length_limit_is_rejected() {
        let options = FilterOptions {
            max_expression_len: 0,
            ..FilterOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
