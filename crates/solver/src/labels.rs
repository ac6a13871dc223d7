//! Correlation labels linking a challenge to its HTTPProxy.
//!
//! The label set is the only lookup key: the solver never stores object
//! names, it re-derives the labels from the challenge on every call.

use std::collections::BTreeMap;
use std::fmt;

use crate::challenge::Challenge;

/// Label carrying the Adler-32 of the challenge domain
pub const DOMAIN_LABEL_KEY: &str = "acme.cert-manager.io/http-domain";

/// Label carrying the Adler-32 of the challenge token
pub const TOKEN_LABEL_KEY: &str = "acme.cert-manager.io/http-token";

/// Label marking objects created by an HTTP-01 solver
pub const SOLVER_IDENTIFICATION_LABEL_KEY: &str = "acme.cert-manager.io/http01-solver";

/// Correlation labels for a challenge.
///
/// Values are decimal Adler-32 checksums so they always fit label value
/// length and character rules, whatever the domain or token contains.
pub fn labels_for(challenge: &Challenge) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            DOMAIN_LABEL_KEY.to_string(),
            checksum(&challenge.spec.dns_name),
        ),
        (TOKEN_LABEL_KEY.to_string(), checksum(&challenge.spec.token)),
        (
            SOLVER_IDENTIFICATION_LABEL_KEY.to_string(),
            "true".to_string(),
        ),
    ])
}

fn checksum(value: &str) -> String {
    let mut hasher = adler::Adler32::new();
    hasher.write_slice(value.as_bytes());
    hasher.checksum().to_string()
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new(match_labels: BTreeMap<String, String>) -> Self {
        Self { match_labels }
    }

    /// Selector matching the correlation labels of `challenge`
    pub fn for_challenge(challenge: &Challenge) -> Self {
        Self::new(labels_for(challenge))
    }

    /// Every required label is present with the required value.
    ///
    /// An empty selector matches everything.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }

    pub fn match_labels(&self) -> &BTreeMap<String, String> {
        &self.match_labels
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }
}

impl From<BTreeMap<String, String>> for LabelSelector {
    fn from(match_labels: BTreeMap<String, String>) -> Self {
        Self::new(match_labels)
    }
}

/// Renders as `key=value,key=value`, the string form list calls accept
impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.match_labels {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}
