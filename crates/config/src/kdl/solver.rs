//! Solver, store and logging KDL parsing.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::trace;

use solver_common::LogFormat;

use crate::solver::*;

use super::helpers::{
    ensure_known_children, get_int_entry, get_nullable_string_entry, get_string_entry,
};

/// Parse solver configuration block
pub fn parse_solver_config(node: &kdl::KdlNode) -> Result<SolverSettings> {
    trace!("Parsing solver configuration block");
    ensure_known_children(
        node,
        &["listen-port", "generate-name", "ingress-class", "survivor"],
    )?;

    let listen_port = match get_int_entry(node, "listen-port")? {
        Some(v) => u16::try_from(v)
            .map_err(|_| anyhow!("listen-port {} is out of range (1-65535)", v))?,
        None => default_listen_port(),
    };

    let survivor = match get_string_entry(node, "survivor")? {
        Some(s) => s.parse::<SurvivorPolicy>().map_err(|e| anyhow!(e))?,
        None => SurvivorPolicy::default(),
    };

    // `#null` disables the annotation; an empty string is kept so validation can reject it
    let ingress_class = match get_nullable_string_entry(node, "ingress-class")? {
        Some(class) => class,
        None => default_ingress_class(),
    };

    let settings = SolverSettings {
        listen_port,
        generate_name: get_string_entry(node, "generate-name")?
            .unwrap_or_else(default_generate_name),
        ingress_class,
        survivor,
    };

    trace!(
        listen_port = settings.listen_port,
        generate_name = %settings.generate_name,
        ingress_class = ?settings.ingress_class,
        survivor = %settings.survivor,
        "Parsed solver configuration"
    );

    Ok(settings)
}

/// Parse store configuration block
pub fn parse_store_config(node: &kdl::KdlNode) -> Result<StoreSettings> {
    trace!("Parsing store configuration block");
    ensure_known_children(node, &["path"])?;

    let settings = StoreSettings {
        path: get_string_entry(node, "path")?
            .map(PathBuf::from)
            .unwrap_or_else(default_store_path),
    };

    trace!(path = %settings.path.display(), "Parsed store configuration");
    Ok(settings)
}

/// Parse logging configuration block
pub fn parse_logging_config(node: &kdl::KdlNode) -> Result<LoggingConfig> {
    trace!("Parsing logging configuration block");
    ensure_known_children(node, &["level", "format"])?;

    let format = match get_string_entry(node, "format")? {
        Some(s) => s.parse::<LogFormat>()?,
        None => LogFormat::default(),
    };

    Ok(LoggingConfig {
        level: get_string_entry(node, "level")?.unwrap_or_else(default_log_level),
        format,
    })
}
