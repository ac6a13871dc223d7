//! Configuration for the HTTPProxy solver.
//!
//! Configuration is written in KDL:
//!
//! ```kdl
//! solver {
//!     listen-port 8089
//!     generate-name "cm-acme-http-solver-"
//!     ingress-class "contour-public"
//!     survivor "oldest"
//! }
//! store {
//!     path "/var/lib/httpproxy-solver"
//! }
//! logging {
//!     level "info"
//!     format "pretty"
//! }
//! ```
//!
//! Every block and setting is optional. `ingress-class #null` turns the
//! ingress class annotation off.

pub mod kdl;
mod solver;
pub mod validate;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use solver::{
    LoggingConfig, SolverSettings, StoreSettings, SurvivorPolicy, ACME_SOLVER_LISTEN_PORT,
    DEFAULT_GENERATE_NAME, DEFAULT_INGRESS_CLASS,
};
pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub solver: SolverSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a KDL file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        let config = Self::from_kdl_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from KDL text
    pub fn from_kdl_str(content: &str) -> Result<Self> {
        crate::kdl::parse_document(content)
    }

    /// Validate the configuration, logging lint warnings.
    ///
    /// Returns an error listing every blocking problem.
    pub fn validate(&self) -> Result<()> {
        let mut result = validate::validate_config(self);
        result.merge(validate::lint_config(self));

        for warning in &result.warnings {
            warn!("{}", warning.message);
        }

        if result.is_ok() {
            return Ok(());
        }

        let messages: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
        Err(anyhow!(
            "Configuration has {} error(s):\n  {}",
            messages.len(),
            messages.join("\n  ")
        ))
    }
}
