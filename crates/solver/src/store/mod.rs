//! Object store implementations.
//!
//! The solver only needs namespaced list/create/update/delete with label
//! selection and optimistic concurrency. [`StoreClient`] is that contract;
//! the API server of a real cluster is the production implementation and
//! lives outside this crate.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, StoreStats};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::error::StoreError;
use crate::labels::LabelSelector;
use crate::object::GenericObject;

/// Characters used for generated name suffixes (no vowels, no look-alikes)
const NAME_SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Length of generated name suffixes
const NAME_SUFFIX_LENGTH: usize = 5;

/// Namespaced object store with label selection.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Objects in `namespace` whose labels match `selector`.
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<GenericObject>, StoreError>;

    /// Store a new object, assigning its name from `generateName` if needed.
    async fn create(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError>;

    /// Replace an existing object.
    ///
    /// Fails with [`StoreError::Conflict`] when the object carries a
    /// `resourceVersion` that is no longer current.
    async fn update(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError>;

    /// Remove an object by name.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: StoreClient + ?Sized> StoreClient for Arc<S> {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<GenericObject>, StoreError> {
        (**self).list(namespace, selector).await
    }

    async fn create(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        (**self).create(namespace, object).await
    }

    async fn update(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        (**self).update(namespace, object).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        (**self).delete(namespace, name).await
    }
}

/// Random suffix appended to `generateName`
pub(crate) fn generate_name_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..NAME_SUFFIX_LENGTH)
        .map(|_| NAME_SUFFIX_ALPHABET[rng.gen_range(0..NAME_SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Check the request namespace and fill in server-owned metadata for a new
/// object. Returns the object's final name.
pub(crate) fn prepare_create(
    namespace: &str,
    object: &mut GenericObject,
    resource_version: String,
) -> Result<String, StoreError> {
    check_namespace(namespace, object)?;

    let name = match (object.name(), object.generate_name()) {
        (Some(name), _) if !name.is_empty() => name.to_string(),
        (_, Some(prefix)) if !prefix.is_empty() => {
            format!("{}{}", prefix, generate_name_suffix())
        }
        _ => {
            return Err(StoreError::Invalid(
                "metadata.name or metadata.generateName is required".to_string(),
            ))
        }
    };

    object.set_name(name.clone());
    object.set_namespace(namespace);
    object.set_uid(uuid::Uuid::new_v4().to_string());
    object.set_creation_timestamp(Utc::now());
    object.set_resource_version(resource_version);

    Ok(name)
}

/// Check an update against the stored object and carry server-owned
/// metadata over.
pub(crate) fn prepare_update(
    namespace: &str,
    object: &mut GenericObject,
    current: &GenericObject,
    resource_version: String,
) -> Result<(), StoreError> {
    check_namespace(namespace, object)?;

    let name = object.name().unwrap_or_default().to_string();
    let actual = current.resource_version().unwrap_or_default();
    if let Some(expected) = object.resource_version() {
        if expected != actual {
            return Err(StoreError::Conflict {
                namespace: namespace.to_string(),
                name,
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }

    object.set_namespace(namespace);
    if let Some(uid) = current.uid() {
        object.set_uid(uid);
    }
    if let Some(created) = current.creation_timestamp() {
        object.set_creation_timestamp(created);
    }
    object.set_resource_version(resource_version);

    Ok(())
}

/// Name an update or delete refers to
pub(crate) fn require_name(object: &GenericObject) -> Result<String, StoreError> {
    match object.name() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(StoreError::Invalid("metadata.name is required".to_string())),
    }
}

fn check_namespace(namespace: &str, object: &GenericObject) -> Result<(), StoreError> {
    match object.namespace() {
        Some(ns) if ns != namespace => Err(StoreError::Invalid(format!(
            "object namespace '{}' does not match request namespace '{}'",
            ns, namespace
        ))),
        _ => Ok(()),
    }
}
