//! KDL configuration parsing.

mod helpers;
mod solver;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::Config;

pub use solver::{parse_logging_config, parse_solver_config, parse_store_config};

/// Parse a complete configuration document.
///
/// Every top-level block is optional; missing blocks keep their defaults.
pub fn parse_document(content: &str) -> Result<Config> {
    let doc: kdl::KdlDocument = content
        .parse()
        .map_err(|e: kdl::KdlError| anyhow!("Invalid KDL: {}", e))?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "solver" => config.solver = parse_solver_config(node)?,
            "store" => config.store = parse_store_config(node)?,
            "logging" => config.logging = parse_logging_config(node)?,
            other => {
                return Err(anyhow!(
                    "Unknown configuration block '{}'. Valid blocks: solver, store, logging",
                    other
                ));
            }
        }
    }

    debug!(
        listen_port = config.solver.listen_port,
        survivor = %config.solver.survivor,
        "Parsed configuration document"
    );

    Ok(config)
}
