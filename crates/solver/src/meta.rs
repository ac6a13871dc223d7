//! Object metadata shared by challenges and HTTPProxy objects.

pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};

/// Controller reference: the owner manages the object and blocks its own
/// deletion until the object is gone.
///
/// This is a record for the garbage collector, not a handle: the solver
/// writes it and never follows it.
pub fn controller_reference(
    api_version: impl Into<String>,
    kind: impl Into<String>,
    name: impl Into<String>,
    uid: impl Into<String>,
) -> OwnerReference {
    OwnerReference {
        api_version: api_version.into(),
        kind: kind.into(),
        name: name.into(),
        uid: uid.into(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_controller_reference_wire_form() {
        let owner = controller_reference("acme.cert-manager.io/v1", "Challenge", "ch-1", "uid-1");
        assert_eq!(
            serde_json::to_value(&owner).unwrap(),
            json!({
                "apiVersion": "acme.cert-manager.io/v1",
                "kind": "Challenge",
                "name": "ch-1",
                "uid": "uid-1",
                "controller": true,
                "blockOwnerDeletion": true
            })
        );
    }

    #[test]
    fn test_unmodelled_metadata_survives() {
        let meta: ObjectMeta = serde_json::from_value(json!({
            "name": "p",
            "finalizers": ["keep-me"],
            "managedFields": [{"manager": "kubectl", "operation": "Update"}]
        }))
        .unwrap();

        assert_eq!(meta.finalizers, Some(vec!["keep-me".to_string()]));
        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["managedFields"][0]["manager"], "kubectl");
    }
}
