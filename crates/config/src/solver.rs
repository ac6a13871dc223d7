//! Solver, store and logging configuration types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solver_common::LogFormat;

/// Port the ACME HTTP-01 solver pod listens on
pub const ACME_SOLVER_LISTEN_PORT: u16 = 8089;

/// Name prefix for generated HTTPProxy objects
pub const DEFAULT_GENERATE_NAME: &str = "cm-acme-http-solver-";

/// Ingress class annotation value written on created HTTPProxy objects
pub const DEFAULT_INGRESS_CLASS: &str = "contour-public";

/// How the locator picks the HTTPProxy that survives duplicate cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivorPolicy {
    /// Keep the object with the earliest creation timestamp, ties broken by name
    #[default]
    Oldest,
    /// Keep whatever the store listed first
    First,
}

impl FromStr for SurvivorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oldest" => Ok(Self::Oldest),
            "first" => Ok(Self::First),
            other => Err(format!(
                "Invalid survivor policy '{}'. Valid policies: oldest, first",
                other
            )),
        }
    }
}

impl fmt::Display for SurvivorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oldest => write!(f, "oldest"),
            Self::First => write!(f, "first"),
        }
    }
}

/// Settings that shape the HTTPProxy objects the solver writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Backend port of the solver service
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// `metadata.generateName` for created objects
    #[serde(default = "default_generate_name")]
    pub generate_name: String,

    /// `kubernetes.io/ingress.class` annotation, omitted when `None`
    #[serde(default = "default_ingress_class")]
    pub ingress_class: Option<String>,

    /// Duplicate cleanup policy
    #[serde(default)]
    pub survivor: SurvivorPolicy,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            generate_name: default_generate_name(),
            ingress_class: default_ingress_class(),
            survivor: SurvivorPolicy::default(),
        }
    }
}

pub(crate) fn default_listen_port() -> u16 {
    ACME_SOLVER_LISTEN_PORT
}

pub(crate) fn default_generate_name() -> String {
    DEFAULT_GENERATE_NAME.to_string()
}

pub(crate) fn default_ingress_class() -> Option<String> {
    Some(DEFAULT_INGRESS_CLASS.to_string())
}

/// Object store settings used by the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Root directory of the file-backed store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

pub(crate) fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/httpproxy-solver")
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
