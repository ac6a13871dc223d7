//! Finding the HTTPProxy that belongs to a challenge.
//!
//! At most one object may match a challenge's correlation labels. When
//! several do (two reconciles raced on create, or someone copied an object
//! by hand) the locator keeps one, deletes the rest and reports
//! [`SolverError::AmbiguousState`] instead of acting on the listing it just
//! invalidated.

use std::cmp::Ordering;

use solver_config::SurvivorPolicy;
use tracing::{debug, info, trace};

use crate::challenge::Challenge;
use crate::codec;
use crate::error::{ConversionError, SolverError};
use crate::httpproxy::HttpProxy;
use crate::labels::LabelSelector;
use crate::object::GenericObject;
use crate::store::StoreClient;

/// Look up the challenge's HTTPProxy.
///
/// Returns `Ok(None)` when there is none yet. A failed duplicate delete
/// aborts the cleanup and is returned as a store error; the remaining
/// duplicates are handled on the next call.
pub async fn locate<S>(
    store: &S,
    challenge: &Challenge,
    policy: SurvivorPolicy,
) -> Result<Option<HttpProxy>, SolverError>
where
    S: StoreClient + ?Sized,
{
    let namespace = challenge.namespace();
    let selector = LabelSelector::for_challenge(challenge);
    trace!(namespace = %namespace, selector = %selector, "Listing HTTPProxies");

    let mut found = store.list(namespace, &selector).await?;

    match found.len() {
        0 => Ok(None),
        1 => {
            let proxy = codec::decode(found.remove(0))?;
            trace!(name = ?proxy.name(), "Found HTTPProxy");
            Ok(Some(proxy))
        }
        count => {
            let survivor = found.remove(select_survivor(&found, policy));
            let survivor_name = object_name(namespace, &survivor)?;

            info!(
                count = count,
                survivor = %survivor_name,
                policy = %policy,
                "Multiple HTTPProxies found, deleting duplicates"
            );

            let mut deleted = Vec::with_capacity(found.len());
            for duplicate in &found {
                let name = object_name(namespace, duplicate)?;
                debug!(name = %name, "Deleting duplicate HTTPProxy");
                store.delete(namespace, &name).await?;
                deleted.push(name);
            }

            Err(SolverError::AmbiguousState {
                challenge: challenge.key(),
                survivor: survivor_name,
                deleted,
            })
        }
    }
}

/// Index of the object that survives duplicate cleanup
pub fn select_survivor(objects: &[GenericObject], policy: SurvivorPolicy) -> usize {
    match policy {
        SurvivorPolicy::First => 0,
        SurvivorPolicy::Oldest => objects
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| creation_order(a, b))
            .map(|(index, _)| index)
            .unwrap_or(0),
    }
}

/// Older first; objects without a timestamp after those with one; then name
fn creation_order(a: &GenericObject, b: &GenericObject) -> Ordering {
    let by_time = match (a.creation_timestamp(), b.creation_timestamp()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.name().cmp(&b.name()))
}

fn object_name(namespace: &str, object: &GenericObject) -> Result<String, ConversionError> {
    object
        .name()
        .map(str::to_string)
        .ok_or_else(|| ConversionError::MissingName(namespace.to_string()))
}
