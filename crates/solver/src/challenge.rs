//! ACME challenge, the parent of every HTTPProxy the solver manages.

use serde::{Deserialize, Serialize};
use solver_common::ObjectKey;

use crate::meta::{controller_reference, ObjectMeta, OwnerReference};

/// API version of cert-manager ACME challenges
pub const CHALLENGE_API_VERSION: &str = "acme.cert-manager.io/v1";

/// Kind of cert-manager ACME challenges
pub const CHALLENGE_KIND: &str = "Challenge";

/// A pending HTTP-01 authorization.
///
/// Read-only input: the solver derives labels, owner references and the
/// desired routing from it and never writes it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ChallengeSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSpec {
    /// Domain being authorized
    pub dns_name: String,
    /// Token served under `/.well-known/acme-challenge/`
    pub token: String,
    #[serde(default)]
    pub solver: ChallengeSolver,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSolver {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http01: Option<Http01Solver>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Http01Solver {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<HttpProxySolverConfig>,
}

/// Per-challenge HTTPProxy solver options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProxySolverConfig {
    /// Ingress class annotation to use instead of the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl Challenge {
    /// Build a challenge with the fields the solver reads
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        dns_name: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(namespace.into()),
                ..Default::default()
            },
            spec: ChallengeSpec {
                dns_name: dns_name.into(),
                token: token.into(),
                solver: ChallengeSolver::default(),
            },
        }
    }

    /// Set the object UID recorded in owner references
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.metadata.uid = Some(uid.into());
        self
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// `namespace/name` key for log fields and errors
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace(), self.name())
    }

    /// Ingress class requested on the challenge's solver config, if any
    pub fn ingress_class(&self) -> Option<&str> {
        self.spec
            .solver
            .http01
            .as_ref()?
            .http_proxy
            .as_ref()?
            .class
            .as_deref()
    }

    /// Controller owner reference pointing back at this challenge
    pub fn controller_ref(&self) -> OwnerReference {
        controller_reference(
            CHALLENGE_API_VERSION,
            CHALLENGE_KIND,
            self.name(),
            self.metadata.uid.as_deref().unwrap_or_default(),
        )
    }
}
