//! HTTPProxy solver for ACME HTTP-01 challenges.
//!
//! For every pending challenge the solver keeps exactly one Contour
//! `HTTPProxy` that routes `/.well-known/acme-challenge/<token>` on the
//! challenge domain to the solver service.
//!
//! # Convergence
//!
//! [`HttpProxySolver::ensure`] is the single entry point and is safe to call
//! repeatedly:
//!
//! 1. List objects carrying the challenge's correlation labels
//! 2. None: create one with a generated name and a controller reference
//! 3. One: compare its spec to the desired spec; update only on drift
//! 4. Several: keep one, delete the rest, return
//!    [`SolverError::AmbiguousState`] so the caller retries
//!
//! Removal is left to the garbage collector acting on the controller
//! reference; [`HttpProxySolver::cleanup`] deliberately does nothing.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use httpproxy_solver::{Challenge, HttpProxySolver, MemoryStore};
//! use solver_config::SolverSettings;
//!
//! let solver = HttpProxySolver::new(Arc::new(MemoryStore::new()), SolverSettings::default());
//! let challenge = Challenge::new("ns1", "ch-1", "example.com", "tok123");
//! let proxy = solver.ensure(&challenge, &solver.backend_for("cm-acme-http-solver")).await?;
//! ```

pub mod challenge;
pub mod codec;
pub mod desired;
pub mod error;
pub mod httpproxy;
pub mod labels;
pub mod locator;
pub mod meta;
pub mod object;
pub mod solver;
pub mod store;

pub use challenge::Challenge;
pub use desired::{BackendTarget, ACME_CHALLENGE_PREFIX};
pub use error::{ConversionError, SolverError, SolverResult, StoreError};
pub use httpproxy::{HttpProxy, HttpProxySpec};
pub use labels::{labels_for, LabelSelector};
pub use object::GenericObject;
pub use solver::HttpProxySolver;
pub use store::{FileStore, MemoryStore, StoreClient, StoreStats};
