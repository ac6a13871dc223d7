//! In-memory object store with call accounting.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use solver_common::ObjectKey;
use tracing::trace;

use super::{prepare_create, prepare_update, require_name, StoreClient};
use crate::error::StoreError;
use crate::labels::LabelSelector;
use crate::object::GenericObject;

/// Number of calls a store has served, by operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub lists: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl StoreStats {
    /// Calls that changed (or tried to change) the store
    pub fn writes(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

#[derive(Debug, Default)]
struct Counters {
    lists: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

/// In-memory store.
///
/// Objects are kept ordered by namespace and name, so listings come back
/// sorted by name. Every call is counted, including failed ones.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<ObjectKey, GenericObject>>,
    last_version: AtomicU64,
    counters: Counters,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Call counts so far
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            lists: self.counters.lists.load(Ordering::Relaxed),
            creates: self.counters.creates.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
        }
    }

    /// Every object in `namespace`, without counting a list call
    pub fn objects(&self, namespace: &str) -> Vec<GenericObject> {
        self.objects
            .read()
            .iter()
            .filter(|(key, _)| key.namespace() == namespace)
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// Total number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn next_version(&self) -> String {
        (self.last_version.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<GenericObject>, StoreError> {
        self.counters.lists.fetch_add(1, Ordering::Relaxed);

        let found: Vec<GenericObject> = self
            .objects
            .read()
            .iter()
            .filter(|(key, obj)| key.namespace() == namespace && selector.matches(&obj.labels()))
            .map(|(_, obj)| obj.clone())
            .collect();

        trace!(namespace = %namespace, selector = %selector, count = found.len(), "Listed objects");
        Ok(found)
    }

    async fn create(
        &self,
        namespace: &str,
        mut object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        self.counters.creates.fetch_add(1, Ordering::Relaxed);

        let name = prepare_create(namespace, &mut object, self.next_version())?;
        let key = ObjectKey::new(namespace, name.as_str());

        let mut objects = self.objects.write();
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                namespace: namespace.to_string(),
                name,
            });
        }
        objects.insert(key, object.clone());

        trace!(namespace = %namespace, name = %name, "Created object");
        Ok(object)
    }

    async fn update(
        &self,
        namespace: &str,
        mut object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        self.counters.updates.fetch_add(1, Ordering::Relaxed);

        let name = require_name(&object)?;
        let key = ObjectKey::new(namespace, name.as_str());

        let mut objects = self.objects.write();
        let Some(current) = objects.get(&key) else {
            return Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                name,
            });
        };
        prepare_update(namespace, &mut object, current, self.next_version())?;
        objects.insert(key, object.clone());

        trace!(namespace = %namespace, name = %name, "Updated object");
        Ok(object)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);

        let key = ObjectKey::new(namespace, name);
        if self.objects.write().remove(&key).is_none() {
            return Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        trace!(namespace = %namespace, name = %name, "Deleted object");
        Ok(())
    }
}
