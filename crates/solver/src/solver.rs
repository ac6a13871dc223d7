//! Convergence of a challenge's HTTPProxy.

use std::collections::BTreeMap;
use std::sync::Arc;

use solver_common::ReconcileId;
use solver_config::SolverSettings;
use tracing::{debug, debug_span, info, Instrument};

use crate::challenge::Challenge;
use crate::codec;
use crate::desired::{self, BackendTarget};
use crate::error::SolverError;
use crate::httpproxy::{HttpProxy, HttpProxySpec};
use crate::labels::labels_for;
use crate::locator;
use crate::meta::ObjectMeta;
use crate::store::StoreClient;

/// Annotation selecting the Contour instance that serves the HTTPProxy
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Keeps exactly one HTTPProxy per challenge, routed to the solver service.
///
/// Holds no state between calls and no locks. Calls for different
/// challenges never touch the same objects; concurrent calls for the same
/// challenge may both create, which the next call cleans up.
pub struct HttpProxySolver<S: ?Sized> {
    store: Arc<S>,
    settings: SolverSettings,
}

impl<S: StoreClient + ?Sized> HttpProxySolver<S> {
    pub fn new(store: Arc<S>, settings: SolverSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Backend target for `service` on the configured solver port
    pub fn backend_for(&self, service: impl Into<String>) -> BackendTarget {
        BackendTarget::new(service, self.settings.listen_port)
    }

    /// Current HTTPProxy of the challenge, cleaning up duplicates
    pub async fn locate(&self, challenge: &Challenge) -> Result<Option<HttpProxy>, SolverError> {
        locator::locate(self.store.as_ref(), challenge, self.settings.survivor).await
    }

    /// Make sure the challenge has exactly one HTTPProxy routing to `backend`.
    ///
    /// Creates it when absent, rewrites its spec when it drifted, and issues
    /// no write at all when it already matches.
    pub async fn ensure(
        &self,
        challenge: &Challenge,
        backend: &BackendTarget,
    ) -> Result<HttpProxy, SolverError> {
        let span = debug_span!(
            "ensure_httpproxy",
            challenge = %challenge.key(),
            reconcile_id = %ReconcileId::new(),
        );

        self.converge(challenge, backend).instrument(span).await
    }

    async fn converge(
        &self,
        challenge: &Challenge,
        backend: &BackendTarget,
    ) -> Result<HttpProxy, SolverError> {
        let desired = desired::build(challenge, backend);

        match self.locate(challenge).await? {
            None => {
                info!(backend = %backend, "Creating HTTPProxy");
                let proxy = self.create(challenge, desired).await?;
                info!(name = ?proxy.name(), "Created HTTPProxy");
                Ok(proxy)
            }
            Some(existing) => {
                debug!(name = ?existing.name(), "Found HTTPProxy");
                self.check_and_update(challenge, existing, desired).await
            }
        }
    }

    /// Nothing to delete: the HTTPProxy carries a controller reference to the
    /// challenge and the garbage collector removes it with the challenge.
    pub async fn cleanup(&self, challenge: &Challenge) -> Result<(), SolverError> {
        debug!(challenge = %challenge.key(), "Leaving HTTPProxy removal to the garbage collector");
        Ok(())
    }

    async fn create(
        &self,
        challenge: &Challenge,
        spec: HttpProxySpec,
    ) -> Result<HttpProxy, SolverError> {
        let proxy = self.new_proxy(challenge, spec);
        let created = self
            .store
            .create(challenge.namespace(), codec::encode(&proxy)?)
            .await?;
        Ok(codec::decode(created)?)
    }

    /// Replace the spec when it differs from `desired` in any field, including
    /// ones the typed model does not name. Metadata is written back as read.
    async fn check_and_update(
        &self,
        challenge: &Challenge,
        mut existing: HttpProxy,
        desired: HttpProxySpec,
    ) -> Result<HttpProxy, SolverError> {
        if existing.spec == desired {
            return Ok(existing);
        }

        info!(name = ?existing.name(), "Updating HTTPProxy");

        existing.spec = desired;
        let updated = self
            .store
            .update(challenge.namespace(), codec::encode(&existing)?)
            .await?;
        Ok(codec::decode(updated)?)
    }

    fn new_proxy(&self, challenge: &Challenge, spec: HttpProxySpec) -> HttpProxy {
        let ingress_class = challenge
            .ingress_class()
            .or(self.settings.ingress_class.as_deref());

        let annotations = ingress_class
            .map(|class| BTreeMap::from([(INGRESS_CLASS_ANNOTATION.to_string(), class.to_string())]));

        HttpProxy {
            metadata: ObjectMeta {
                generate_name: Some(self.settings.generate_name.clone()),
                namespace: Some(challenge.namespace().to_string()),
                labels: Some(labels_for(challenge)),
                annotations,
                owner_references: Some(vec![challenge.controller_ref()]),
                ..Default::default()
            },
            spec,
            status: Default::default(),
        }
    }
}

impl<S: ?Sized> Clone for HttpProxySolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for HttpProxySolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProxySolver")
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeSolver, Http01Solver, HttpProxySolverConfig};
    use crate::store::MemoryStore;

    fn solver() -> HttpProxySolver<MemoryStore> {
        HttpProxySolver::new(Arc::new(MemoryStore::new()), SolverSettings::default())
    }

    fn challenge() -> Challenge {
        Challenge::new("ns1", "ch-1", "example.com", "tok123").with_uid("uid-1")
    }

    #[tokio::test]
    async fn test_created_metadata() {
        let solver = solver();
        let proxy = solver
            .ensure(&challenge(), &solver.backend_for("svc"))
            .await
            .unwrap();

        let meta = &proxy.metadata;
        assert!(meta.name.as_deref().unwrap().starts_with("cm-acme-http-solver-"));
        assert_eq!(meta.namespace.as_deref(), Some("ns1"));
        assert_eq!(meta.labels, Some(labels_for(&challenge())));
        assert_eq!(
            meta.annotations.as_ref().unwrap()[INGRESS_CLASS_ANNOTATION],
            "contour-public"
        );
        assert_eq!(meta.owner_references, Some(vec![challenge().controller_ref()]));
        assert!(meta.resource_version.is_some());
    }

    #[tokio::test]
    async fn test_challenge_class_overrides_settings() {
        let solver = solver();
        let mut ch = challenge();
        ch.spec.solver = ChallengeSolver {
            http01: Some(Http01Solver {
                http_proxy: Some(HttpProxySolverConfig {
                    class: Some("contour-internal".to_string()),
                }),
            }),
        };

        let proxy = solver.ensure(&ch, &solver.backend_for("svc")).await.unwrap();
        assert_eq!(
            proxy.metadata.annotations.unwrap()[INGRESS_CLASS_ANNOTATION],
            "contour-internal"
        );
    }

    #[tokio::test]
    async fn test_no_class_no_annotation() {
        let settings = SolverSettings {
            ingress_class: None,
            ..Default::default()
        };
        let solver = HttpProxySolver::new(Arc::new(MemoryStore::new()), settings);

        let proxy = solver
            .ensure(&challenge(), &solver.backend_for("svc"))
            .await
            .unwrap();
        assert!(proxy.metadata.annotations.is_none());
    }

    #[tokio::test]
    async fn test_backend_uses_configured_port() {
        let settings = SolverSettings {
            listen_port: 9000,
            ..Default::default()
        };
        let solver = HttpProxySolver::new(Arc::new(MemoryStore::new()), settings);
        assert_eq!(solver.backend_for("svc"), BackendTarget::new("svc", 9000));
    }

    #[tokio::test]
    async fn test_update_keeps_metadata() {
        let solver = solver();
        let ch = challenge();
        let created = solver.ensure(&ch, &solver.backend_for("svc-a")).await.unwrap();
        let updated = solver.ensure(&ch, &solver.backend_for("svc-b")).await.unwrap();

        assert_eq!(updated.metadata.name, created.metadata.name);
        assert_eq!(updated.metadata.uid, created.metadata.uid);
        assert_eq!(updated.metadata.labels, created.metadata.labels);
        assert_eq!(updated.metadata.annotations, created.metadata.annotations);
        assert_ne!(
            updated.metadata.resource_version,
            created.metadata.resource_version
        );
        assert_eq!(updated.spec.routes[0].services[0].name, "svc-b");
    }

    #[tokio::test]
    async fn test_cleanup_touches_nothing() {
        let solver = solver();
        let ch = challenge();
        solver.ensure(&ch, &solver.backend_for("svc")).await.unwrap();
        let before = solver.store().stats();

        solver.cleanup(&ch).await.unwrap();

        assert_eq!(solver.store().stats(), before);
        assert_eq!(solver.store().len(), 1);
    }

    #[tokio::test]
    async fn test_dyn_store() {
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStore::new());
        let solver = HttpProxySolver::new(store, SolverSettings::default());
        let cloned = solver.clone();

        let first = solver
            .ensure(&challenge(), &solver.backend_for("svc"))
            .await
            .unwrap();
        let second = cloned
            .ensure(&challenge(), &cloned.backend_for("svc"))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_drift_in_unmodelled_field_corrected() {
        let solver = solver();
        let ch = challenge();
        let backend = solver.backend_for("svc");
        solver.ensure(&ch, &backend).await.unwrap();

        let store = solver.store();
        let mut stored = store.objects("ns1").remove(0);
        let mut spec = stored.field("spec").cloned().unwrap();
        spec["virtualhost"]["tls"] = serde_json::json!({"secretName": "x"});
        spec["routes"][0]["timeoutPolicy"] = serde_json::json!({"response": "1s"});
        stored.set_field("spec", spec);
        store.update("ns1", stored).await.unwrap();
        let before = store.stats();

        let proxy = solver.ensure(&ch, &backend).await.unwrap();

        assert_eq!(store.stats().updates, before.updates + 1);
        assert_eq!(proxy.spec, desired::build(&ch, &backend));
        let stored_spec = store.objects("ns1").remove(0).field("spec").cloned().unwrap();
        assert!(stored_spec["virtualhost"].get("tls").is_none());
        assert!(stored_spec["routes"][0].get("timeoutPolicy").is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_unmodelled_metadata() {
        let solver = solver();
        let ch = challenge();
        solver.ensure(&ch, &solver.backend_for("svc-a")).await.unwrap();

        let store = solver.store();
        let mut stored = store.objects("ns1").remove(0);
        stored.metadata_mut().finalizers = Some(vec!["keep-me".to_string()]);
        store.update("ns1", stored).await.unwrap();

        let updated = solver.ensure(&ch, &solver.backend_for("svc-b")).await.unwrap();

        let keep = Some(vec!["keep-me".to_string()]);
        assert_eq!(updated.metadata.finalizers, keep);
        assert_eq!(store.objects("ns1")[0].metadata().finalizers, keep);
        assert_eq!(updated.spec.routes[0].services[0].name, "svc-b");
    }

    /// Lists without `metadata.namespace`, like some list responses
    struct NamespacelessStore(MemoryStore);

    #[async_trait::async_trait]
    impl StoreClient for NamespacelessStore {
        async fn list(
            &self,
            namespace: &str,
            selector: &crate::labels::LabelSelector,
        ) -> Result<Vec<crate::object::GenericObject>, crate::error::StoreError> {
            let mut found = self.0.list(namespace, selector).await?;
            for object in &mut found {
                object.metadata_mut().namespace = None;
            }
            Ok(found)
        }

        async fn create(
            &self,
            namespace: &str,
            object: crate::object::GenericObject,
        ) -> Result<crate::object::GenericObject, crate::error::StoreError> {
            self.0.create(namespace, object).await
        }

        async fn update(
            &self,
            namespace: &str,
            object: crate::object::GenericObject,
        ) -> Result<crate::object::GenericObject, crate::error::StoreError> {
            self.0.update(namespace, object).await
        }

        async fn delete(&self, namespace: &str, name: &str) -> Result<(), crate::error::StoreError> {
            self.0.delete(namespace, name).await
        }
    }

    #[tokio::test]
    async fn test_update_targets_challenge_namespace() {
        let store = Arc::new(NamespacelessStore(MemoryStore::new()));
        let solver = HttpProxySolver::new(Arc::clone(&store), SolverSettings::default());
        let ch = challenge();

        solver.ensure(&ch, &solver.backend_for("svc-a")).await.unwrap();
        let updated = solver.ensure(&ch, &solver.backend_for("svc-b")).await.unwrap();

        assert_eq!(updated.metadata.namespace.as_deref(), Some("ns1"));
        assert_eq!(updated.spec.routes[0].services[0].name, "svc-b");
        assert_eq!(store.0.stats().updates, 1);
        assert_eq!(store.0.objects("ns1").len(), 1);
    }
}
