//! Pipeline settings
//!
//! Settings can be built in code or loaded from TOML:
//!
//! ```
//! use conforma::PipelineConfig;
//!
//! let config = PipelineConfig::from_toml_str(r#"
//!     aggregate_message = "Invalid form"
//!     mx_timeout_ms = 1500
//! "#).unwrap();
//!
//! assert_eq!(config.aggregate_message, "Invalid form");
//! assert!(config.catch_panics);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Message of the aggregate error when none is configured.
pub const DEFAULT_AGGREGATE_MESSAGE: &str = "You have an error on validate data";

/// Tunables of a [`Conforma`](crate::Conforma) pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Message of the [`StructuralError`](crate::StructuralError) returned by
    /// a failed run.
    pub aggregate_message: String,

    /// Deadline of a single `emailMx` lookup, in milliseconds.
    pub mx_timeout_ms: u64,

    /// Report panicking validators as failures instead of unwinding.
    pub catch_panics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aggregate_message: DEFAULT_AGGREGATE_MESSAGE.to_string(),
            mx_timeout_ms: 5000,
            catch_panics: true,
        }
    }
}

impl PipelineConfig {
    /// Parses settings from TOML; missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Config(format!("TOML error: {e}")))
    }

    /// Sets the aggregate error message.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_aggregate_message(mut self, message: impl Into<String>) -> Self {
        self.aggregate_message = message.into();
        self
    }

    /// Sets the MX lookup deadline.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_mx_timeout(mut self, timeout: Duration) -> Self {
        self.mx_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets whether panicking validators are caught.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// The MX lookup deadline as a [`Duration`].
    pub fn mx_timeout(&self) -> Duration {
        Duration::from_millis(self.mx_timeout_ms)
    }
}
