//! Desired HTTPProxy routing for a challenge.
//!
//! [`build`] is pure and deterministic. Drift detection compares its output
//! to the stored spec with `==`, so identical inputs must always produce an
//! identical spec, including list order.

use std::fmt;

use solver_config::ACME_SOLVER_LISTEN_PORT;

use crate::challenge::Challenge;
use crate::httpproxy::{HttpProxySpec, MatchCondition, Route, Service, VirtualHost};

/// HTTP-01 challenge path prefix
pub const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

/// Service the challenge route forwards to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendTarget {
    pub service: String,
    pub port: u16,
}

impl BackendTarget {
    pub fn new(service: impl Into<String>, port: u16) -> Self {
        Self {
            service: service.into(),
            port,
        }
    }

    /// Solver service on the standard solver port
    pub fn solver_service(service: impl Into<String>) -> Self {
        Self::new(service, ACME_SOLVER_LISTEN_PORT)
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.port)
    }
}

/// Path the ACME server requests for `token`
pub fn challenge_path(token: &str) -> String {
    format!("{}{}", ACME_CHALLENGE_PREFIX, token)
}

/// Desired spec: the challenge domain as virtual host, and one insecure
/// route sending the challenge path to the backend.
pub fn build(challenge: &Challenge, backend: &BackendTarget) -> HttpProxySpec {
    HttpProxySpec {
        virtualhost: Some(VirtualHost {
            fqdn: challenge.spec.dns_name.clone(),
            ..Default::default()
        }),
        routes: vec![Route {
            conditions: vec![MatchCondition {
                prefix: Some(challenge_path(&challenge.spec.token)),
                ..Default::default()
            }],
            services: vec![Service {
                name: backend.service.clone(),
                port: backend.port,
                ..Default::default()
            }],
            // HTTP-01 validation is always plain HTTP
            permit_insecure: true,
            ..Default::default()
        }],
        ..Default::default()
    }
}
