//! Typed Contour `HTTPProxy` resource.
//!
//! The fields the solver writes are modelled; everything else on the spec,
//! its virtual host, routes, conditions and services is kept in `extra`.
//! Unmodelled fields therefore take part in drift detection and survive an
//! update.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use solver_common::ObjectKey;

use crate::meta::ObjectMeta;

/// Fields of an object the typed model does not name
pub type Extra = Map<String, Value>;

/// A Contour HTTPProxy object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpProxy {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: HttpProxySpec,

    #[serde(default, skip_serializing_if = "HttpProxyStatus::is_empty")]
    pub status: HttpProxyStatus,
}

impl HttpProxy {
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// `namespace/name` key, empty segments for unsaved objects
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(
            self.metadata.namespace.as_deref().unwrap_or_default(),
            self.name().unwrap_or_default(),
        )
    }
}

/// Routing configuration, the part of the object the solver converges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpProxySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtualhost: Option<VirtualHost>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualHost {
    pub fqdn: String,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<MatchCondition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,

    /// Serve the route over plain HTTP even when the virtual host has TLS
    #[serde(default, skip_serializing_if = "is_false")]
    pub permit_insecure: bool,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Upstream service of a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub port: u16,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Status reported by Contour; carried through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl HttpProxyStatus {
    pub fn is_empty(&self) -> bool {
        self.current_status.is_none() && self.description.is_none() && self.extra.is_empty()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
