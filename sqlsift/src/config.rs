//! Compiler and diagnostics configuration.
//!
//! Configuration is constructed once and passed by reference. Every field has
//! a default, so a partial TOML document only overrides what it names:
//!
//! ```
//! use sqlsift::Config;
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     [compiler]
//!     max_limit = 50
//!
//!     [diagnostics]
//!     slow_query_threshold_ms = 250
//!     "#,
//! ).unwrap();
//!
//! assert_eq!(config.compiler.max_limit, 50);
//! assert_eq!(config.compiler.max_in_values, 1000);
//! assert_eq!(config.diagnostics.slow_query_threshold_ms, 250);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Filter compilation and pagination limits.
    pub compiler: CompilerConfig,
    /// Slow-query logging.
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

/// Limits applied while compiling filters and building pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Maximum number of values accepted by `$in`.
    pub max_in_values: usize,
    /// Maximum nesting depth of a filter tree.
    pub max_depth: usize,
    /// Largest page size a caller may request.
    pub max_limit: u64,
    /// Page size used when the caller does not ask for one.
    pub default_limit: u64,
    /// Execution time annotation attached to every SELECT.
    pub query_timeout_ms: Option<u64>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_in_values: 1000,
            max_depth: 32,
            max_limit: 100,
            default_limit: 25,
            query_timeout_ms: None,
        }
    }
}

/// Slow-query detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Queries slower than this are logged.
    pub slow_query_threshold_ms: u64,
    /// Run `EXPLAIN` on slow queries and warn about full table scans.
    pub explain_slow_queries: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 500,
            explain_slow_queries: false,
        }
    }
}
