//! Shared building blocks for the HTTPProxy solver crates.

pub mod ids;
pub mod observability;

pub use ids::{ObjectKey, ReconcileId};
pub use observability::{init_tracing, LogFormat};
