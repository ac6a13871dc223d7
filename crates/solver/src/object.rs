//! Untyped object representation exchanged with the store.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use kube::core::{DynamicObject, TypeMeta};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConversionError;
use crate::meta::{ObjectMeta, Time};

/// Type fields, metadata and remaining top-level fields of an object
pub type ObjectParts = (Option<TypeMeta>, ObjectMeta, Map<String, Value>);

/// A store object: type fields, full metadata, and every other top-level
/// field as opaque JSON.
///
/// Stores only understand metadata; the rest is interpreted by the codec.
/// Nothing is dropped on the way through, so fields the solver does not
/// model survive a read-modify-write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenericObject(DynamicObject);

impl GenericObject {
    /// Assemble an object from its parts. `data` holds the top-level fields
    /// other than `apiVersion`, `kind` and `metadata`.
    pub fn from_parts(
        types: Option<TypeMeta>,
        metadata: ObjectMeta,
        data: Map<String, Value>,
    ) -> Self {
        Self(DynamicObject {
            types,
            metadata,
            data: Value::Object(data),
        })
    }

    /// Split into type fields, metadata and the remaining top-level fields
    pub fn into_parts(self) -> Result<ObjectParts, ConversionError> {
        let data = match self.0.data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ConversionError::NotAnObject),
        };
        Ok((self.0.types, self.0.metadata, data))
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.0.metadata
    }

    /// Top-level field other than the type fields and metadata
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.data.get(key)
    }

    /// Set a top-level field other than the type fields and metadata
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        if !self.0.data.is_object() {
            self.0.data = Value::Object(Map::new());
        }
        if let Value::Object(data) = &mut self.0.data {
            data.insert(key.into(), value);
        }
    }

    pub fn api_version(&self) -> Option<&str> {
        self.0.types.as_ref().map(|t| t.api_version.as_str())
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.types.as_ref().map(|t| t.kind.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.0.metadata.name.as_deref()
    }

    pub fn generate_name(&self) -> Option<&str> {
        self.0.metadata.generate_name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.metadata.namespace.as_deref()
    }

    pub fn uid(&self) -> Option<&str> {
        self.0.metadata.uid.as_deref()
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.0.metadata.resource_version.as_deref()
    }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.0.metadata.creation_timestamp.as_ref().map(|ts| ts.0)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.0.metadata.labels.clone().unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.0.metadata.name = Some(name.into());
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.0.metadata.namespace = Some(namespace.into());
    }

    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.0.metadata.uid = Some(uid.into());
    }

    pub fn set_resource_version(&mut self, version: impl Into<String>) {
        self.0.metadata.resource_version = Some(version.into());
    }

    /// Timestamps are stored at whole-second precision, as serialized
    pub fn set_creation_timestamp(&mut self, ts: DateTime<Utc>) {
        self.0.metadata.creation_timestamp = Some(Time(ts.trunc_subsecs(0)));
    }
}

impl PartialEq for GenericObject {
    fn eq(&self, other: &Self) -> bool {
        self.api_version() == other.api_version()
            && self.kind() == other.kind()
            && self.0.metadata == other.0.metadata
            && self.0.data == other.0.data
    }
}

impl TryFrom<Value> for GenericObject {
    type Error = ConversionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(ConversionError::NotAnObject);
        }
        Ok(Self(serde_json::from_value(value)?))
    }
}
