//! Configuration validation
//!
//! Errors make the configuration unusable; warnings are reported but do not
//! stop the solver from running.

mod lint;

use std::fmt;

pub use lint::lint_config;

use crate::Config;

/// Maximum length of a Kubernetes object name
const MAX_NAME_LENGTH: usize = 253;

/// Length of the random suffix appended to `generate-name`
const GENERATED_SUFFIX_LENGTH: usize = 5;

/// Area of the configuration a validation error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Solver,
    Store,
    Logging,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solver => write!(f, "solver"),
            Self::Store => write!(f, "store"),
            Self::Logging => write!(f, "logging"),
        }
    }
}

/// A blocking configuration problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// A non-blocking configuration remark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Collected validation outcome
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check the configuration for values the solver cannot work with
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    let solver = &config.solver;

    if solver.listen_port == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Solver,
            "listen-port must be between 1 and 65535",
        ));
    }

    if let Err(reason) = check_generate_name(&solver.generate_name) {
        result.add_error(ValidationError::new(
            ErrorCategory::Solver,
            format!("generate-name '{}' {}", solver.generate_name, reason),
        ));
    }

    if let Some(class) = &solver.ingress_class {
        if class.trim().is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Solver,
                "ingress-class must not be empty (remove the setting to use the default)",
            ));
        }
    }

    if config.store.path.as_os_str().is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Store,
            "store path must not be empty",
        ));
    }

    if config.logging.level.trim().is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Logging,
            "logging level must not be empty",
        ));
    }

    result
}

/// `generate-name` plus the random suffix must form a valid DNS subdomain
fn check_generate_name(prefix: &str) -> Result<(), &'static str> {
    if prefix.is_empty() {
        return Err("must not be empty");
    }
    if prefix.len() + GENERATED_SUFFIX_LENGTH > MAX_NAME_LENGTH {
        return Err("is too long");
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err("may only contain lowercase letters, digits, '-' and '.'");
    }
    if !prefix
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err("must start with a lowercase letter or digit");
    }
    Ok(())
}
