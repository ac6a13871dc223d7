//! File-backed object store
//!
//! Keeps one JSON document per object so the CLI can reconcile across runs.
//!
//! # Directory Structure
//!
//! ```text
//! root/
//! └── <namespace>/
//!     ├── cm-acme-http-solver-x7k2p.json
//!     └── cm-acme-http-solver-b4d9q.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use super::{prepare_create, prepare_update, require_name, StoreClient};
use crate::error::StoreError;
use crate::labels::LabelSelector;
use crate::object::GenericObject;

const OBJECT_EXTENSION: &str = "json";
const TMP_EXTENSION: &str = "json.tmp";

/// Object store rooted at a directory.
///
/// Writes inside one process are serialized, which makes the
/// resourceVersion check and the write a single step. Separate processes
/// sharing a directory are not coordinated.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store at `root`, creating the directory if needed
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        info!(store_path = %root.display(), "Opened file object store");

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_path(&self, namespace: &str) -> Result<PathBuf, StoreError> {
        check_segment("namespace", namespace)?;
        Ok(self.root.join(namespace))
    }

    fn object_path(&self, namespace: &str, name: &str) -> Result<PathBuf, StoreError> {
        check_segment("name", name)?;
        Ok(self
            .namespace_path(namespace)?
            .join(format!("{}.{}", name, OBJECT_EXTENSION)))
    }

    async fn read_object(&self, path: &Path) -> Result<GenericObject, StoreError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the full document next to `path`; readers skip the tmp extension
    async fn write_tmp(&self, path: &Path, object: &GenericObject) -> Result<PathBuf, StoreError> {
        let content = serde_json::to_vec_pretty(object)?;
        let tmp_path = path.with_extension(TMP_EXTENSION);
        if let Err(e) = fs::write(&tmp_path, content).await {
            discard(&tmp_path).await;
            return Err(e.into());
        }
        Ok(tmp_path)
    }

    /// Replace the object at `path` in one step
    async fn write_object(&self, path: &Path, object: &GenericObject) -> Result<(), StoreError> {
        let tmp_path = self.write_tmp(path, object).await?;
        if let Err(e) = fs::rename(&tmp_path, path).await {
            discard(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Highest resourceVersion in the namespace plus one
    async fn next_version(&self, namespace: &str) -> Result<String, StoreError> {
        let mut highest = 0u64;
        for object in self.read_namespace(namespace).await? {
            if let Some(version) = object.resource_version().and_then(|v| v.parse::<u64>().ok()) {
                highest = highest.max(version);
            }
        }
        Ok((highest + 1).to_string())
    }

    async fn read_namespace(&self, namespace: &str) -> Result<Vec<GenericObject>, StoreError> {
        let dir = self.namespace_path(namespace)?;

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(namespace = %namespace, "Namespace directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(OBJECT_EXTENSION) {
                continue;
            }
            match self.read_object(&path).await {
                Ok(object) => objects.push(object),
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    // Removed between read_dir and read
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable object file");
                    return Err(e);
                }
            }
        }

        objects.sort_by(|a, b| a.name().cmp(&b.name()));
        Ok(objects)
    }
}

#[async_trait]
impl StoreClient for FileStore {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<GenericObject>, StoreError> {
        let found: Vec<GenericObject> = self
            .read_namespace(namespace)
            .await?
            .into_iter()
            .filter(|obj| selector.matches(&obj.labels()))
            .collect();

        trace!(namespace = %namespace, selector = %selector, count = found.len(), "Listed objects");
        Ok(found)
    }

    async fn create(
        &self,
        namespace: &str,
        mut object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        let _guard = self.write_lock.lock().await;

        let version = self.next_version(namespace).await?;
        let name = prepare_create(namespace, &mut object, version)?;
        let path = self.object_path(namespace, &name)?;
        fs::create_dir_all(self.namespace_path(namespace)?).await?;

        // A hard link publishes the complete file and fails if the name is taken
        let tmp_path = self.write_tmp(&path, &object).await?;
        let linked = fs::hard_link(&tmp_path, &path).await;
        discard(&tmp_path).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists {
                    namespace: namespace.to_string(),
                    name,
                });
            }
            Err(e) => return Err(e.into()),
        }

        debug!(namespace = %namespace, name = %name, "Created object file");
        Ok(object)
    }

    async fn update(
        &self,
        namespace: &str,
        mut object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        let _guard = self.write_lock.lock().await;

        let name = require_name(&object)?;
        let path = self.object_path(namespace, &name)?;

        let current = match self.read_object(&path).await {
            Ok(current) => current,
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    namespace: namespace.to_string(),
                    name,
                });
            }
            Err(e) => return Err(e),
        };

        let version = self.next_version(namespace).await?;
        prepare_update(namespace, &mut object, &current, version)?;
        self.write_object(&path, &object).await?;

        debug!(namespace = %namespace, name = %name, "Updated object file");
        Ok(object)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let path = self.object_path(namespace, name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(namespace = %namespace, name = %name, "Deleted object file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

async fn discard(tmp_path: &Path) {
    if let Err(e) = fs::remove_file(tmp_path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %tmp_path.display(), error = %e, "Failed to remove temporary object file");
        }
    }
}

/// Namespaces and names become path segments; keep them to one segment
fn check_segment(what: &str, value: &str) -> Result<(), StoreError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!(
            "{} '{}' cannot be stored as a file",
            what, value
        )))
    }
}
