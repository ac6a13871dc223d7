//! Error types for the HTTPProxy solver.

use solver_common::ObjectKey;
use thiserror::Error;

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Errors returned by [`HttpProxySolver`](crate::HttpProxySolver).
///
/// Nothing here is retried inside the solver; the caller decides when to
/// reconcile again.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The object store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An object could not be translated between its generic and typed form.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// More than one HTTPProxy matched the challenge. The extras have been
    /// deleted; the next reconcile observes the survivor.
    #[error(
        "multiple HTTPProxies found for challenge {challenge}: kept {survivor}, deleted {}",
        deleted.join(", ")
    )]
    AmbiguousState {
        challenge: ObjectKey,
        survivor: String,
        deleted: Vec<String>,
    },
}

impl SolverError {
    /// Duplicate cleanup happened and a retry will see a single object
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousState { .. })
    }

    /// The store refused a write because the object changed underneath us
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict { .. }))
    }
}

/// Object store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object does not exist.
    #[error("object {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// An object with the same name already exists.
    #[error("object {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    /// Optimistic concurrency check failed.
    #[error(
        "object {namespace}/{name} has been modified: expected resourceVersion {expected}, found {actual}"
    )]
    Conflict {
        namespace: String,
        name: String,
        expected: String,
        actual: String,
    },

    /// The request itself was malformed (missing name, namespace mismatch).
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Filesystem error in a file-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored object could not be read or written as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport or backend failure reported by a remote store.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Generic/typed translation errors.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Field shapes do not match the typed HTTPProxy.
    #[error("invalid HTTPProxy object: {0}")]
    Json(#[from] serde_json::Error),

    /// `apiVersion` or `kind` names a different resource.
    #[error("unexpected {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The encoded value was not a JSON object.
    #[error("object is not a JSON map")]
    NotAnObject,

    /// A listed object has no `metadata.name`.
    #[error("object in namespace {0} has no metadata.name")]
    MissingName(String),
}
