//! Configuration linting for best practices
//!
//! Flags settings that work but tend to surprise operators.

use super::{ValidationResult, ValidationWarning};
use crate::{Config, SurvivorPolicy, ACME_SOLVER_LISTEN_PORT};

/// Lint configuration for best practices
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.solver.survivor == SurvivorPolicy::First {
        result.add_warning(ValidationWarning::new(
            "survivor \"first\" keeps whichever duplicate the store lists first; \
             listing order is not stable across calls",
        ));
    }

    if config.solver.ingress_class.is_none() {
        result.add_warning(ValidationWarning::new(
            "No ingress-class configured: created HTTPProxy objects carry no \
             kubernetes.io/ingress.class annotation",
        ));
    }

    if config.solver.listen_port != ACME_SOLVER_LISTEN_PORT {
        result.add_warning(ValidationWarning::new(format!(
            "listen-port {} differs from the solver pod port {}",
            config.solver.listen_port, ACME_SOLVER_LISTEN_PORT
        )));
    }

    if !config.solver.generate_name.ends_with('-') {
        result.add_warning(ValidationWarning::new(format!(
            "generate-name '{}' does not end with '-'; generated names will run into the random suffix",
            config.solver.generate_name
        )));
    }

    result
}
