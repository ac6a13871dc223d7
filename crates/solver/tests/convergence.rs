//! End-to-end convergence behavior against the in-memory and file stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use httpproxy_solver::meta::ObjectMeta;
use httpproxy_solver::{
    codec, desired, labels_for, BackendTarget, Challenge, FileStore, GenericObject, HttpProxy,
    HttpProxySolver, LabelSelector, MemoryStore, SolverError, StoreClient, StoreError,
};
use solver_config::SolverSettings;
use tempfile::TempDir;
use tokio::sync::Barrier;

fn memory_solver() -> HttpProxySolver<MemoryStore> {
    HttpProxySolver::new(Arc::new(MemoryStore::new()), SolverSettings::default())
}

fn challenge() -> Challenge {
    Challenge::new("ns1", "example-com-1", "example.com", "tok123").with_uid("ch-uid")
}

/// Child for `challenge` as if created by hand, with a fixed name
fn stray_child(challenge: &Challenge, name: &str, service: &str) -> HttpProxy {
    HttpProxy {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(challenge.namespace().to_string()),
            labels: Some(labels_for(challenge)),
            ..Default::default()
        },
        spec: desired::build(challenge, &BackendTarget::new(service, 8089)),
        status: Default::default(),
    }
}

#[tokio::test]
async fn creates_one_child_routed_to_the_backend() {
    let solver = memory_solver();
    let ch = challenge();

    let proxy = solver
        .ensure(&ch, &BackendTarget::new("svc", 8089))
        .await
        .unwrap();

    let store = solver.store();
    assert_eq!(store.len(), 1);
    assert_eq!(store.stats().creates, 1);

    let route = &proxy.spec.routes[0];
    assert_eq!(proxy.spec.virtualhost.as_ref().unwrap().fqdn, "example.com");
    assert_eq!(
        route.conditions[0].prefix.as_deref(),
        Some("/.well-known/acme-challenge/tok123")
    );
    assert_eq!(route.services[0].name, "svc");
    assert_eq!(route.services[0].port, 8089);
    assert!(route.permit_insecure);

    let stored = store.objects("ns1").remove(0);
    assert_eq!(stored.kind(), Some("HTTPProxy"));
    assert_eq!(stored.api_version(), Some("projectcontour.io/v1"));
    assert_eq!(codec::decode(stored).unwrap(), proxy);
}

#[tokio::test]
async fn second_ensure_issues_no_write() {
    let solver = memory_solver();
    let ch = challenge();
    let backend = solver.backend_for("svc");

    let first = solver.ensure(&ch, &backend).await.unwrap();
    let writes = solver.store().stats().writes();

    let second = solver.ensure(&ch, &backend).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(solver.store().stats().writes(), writes);
    assert_eq!(solver.store().stats().lists, 2);
}

#[tokio::test]
async fn drifted_child_is_updated_once() {
    let solver = memory_solver();
    let ch = challenge();

    solver.ensure(&ch, &solver.backend_for("svc-a")).await.unwrap();
    let before = solver.store().stats();

    let backend_b = solver.backend_for("svc-b");
    let updated = solver.ensure(&ch, &backend_b).await.unwrap();

    let after = solver.store().stats();
    assert_eq!(after.updates - before.updates, 1);
    assert_eq!(after.creates, before.creates);
    assert_eq!(after.deletes, before.deletes);
    assert_eq!(updated.spec, desired::build(&ch, &backend_b));
    assert_eq!(solver.store().len(), 1);
}

#[tokio::test]
async fn duplicates_are_removed_then_converged() {
    let solver = memory_solver();
    let ch = challenge();
    let store = solver.store();

    for (name, service) in [("proxy-a", "svc-old"), ("proxy-b", "svc"), ("proxy-c", "svc")] {
        let object = codec::encode(&stray_child(&ch, name, service)).unwrap();
        store.create("ns1", object).await.unwrap();
    }

    let backend = solver.backend_for("svc");
    let err = solver.ensure(&ch, &backend).await.unwrap_err();
    assert!(err.is_ambiguous());
    match &err {
        SolverError::AmbiguousState { deleted, .. } => assert_eq!(deleted.len(), 2),
        other => panic!("expected ambiguous state, got {other}"),
    }
    assert_eq!(store.len(), 1);
    assert_eq!(store.stats().deletes, 2);
    assert_eq!(store.stats().updates, 0);

    let proxy = solver.ensure(&ch, &backend).await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(proxy.spec, desired::build(&ch, &backend));
    assert_eq!(store.stats().creates, 3);
}

#[tokio::test]
async fn challenges_do_not_see_each_other() {
    let solver = memory_solver();
    let ch_a = Challenge::new("ns1", "ch-a", "example.com", "token-a");
    let ch_b = Challenge::new("ns1", "ch-b", "example.com", "token-b");

    let proxy_a = solver.ensure(&ch_a, &solver.backend_for("svc-a")).await.unwrap();
    let proxy_b = solver.ensure(&ch_b, &solver.backend_for("svc-b")).await.unwrap();
    assert_ne!(proxy_a.metadata.name, proxy_b.metadata.name);

    // Changing one challenge's backend leaves the other alone
    solver.ensure(&ch_a, &solver.backend_for("svc-c")).await.unwrap();
    let again_b = solver.ensure(&ch_b, &solver.backend_for("svc-b")).await.unwrap();
    assert_eq!(again_b, proxy_b);

    let only_a = solver
        .store()
        .list("ns1", &LabelSelector::for_challenge(&ch_a))
        .await
        .unwrap();
    assert_eq!(only_a.len(), 1);
    assert_eq!(only_a[0].name(), proxy_a.name());
    assert_eq!(solver.store().len(), 2);
}

#[tokio::test]
async fn concurrent_ensures_for_distinct_challenges() {
    let solver = memory_solver();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let solver = solver.clone();
            tokio::spawn(async move {
                let ch = Challenge::new("ns1", format!("ch-{i}"), "example.com", format!("tok-{i}"));
                solver.ensure(&ch, &solver.backend_for("svc")).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(solver.store().len(), 8);
}

#[tokio::test]
async fn file_store_converges_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let ch = challenge();

    let first = {
        let store = FileStore::open(temp_dir.path()).await.unwrap();
        let solver = HttpProxySolver::new(Arc::new(store), SolverSettings::default());
        solver.ensure(&ch, &solver.backend_for("svc-a")).await.unwrap()
    };

    let store = FileStore::open(temp_dir.path()).await.unwrap();
    let solver = HttpProxySolver::new(Arc::new(store), SolverSettings::default());

    let unchanged = solver.ensure(&ch, &solver.backend_for("svc-a")).await.unwrap();
    assert_eq!(unchanged, first);

    let updated = solver.ensure(&ch, &solver.backend_for("svc-b")).await.unwrap();
    assert_eq!(updated.metadata.name, first.metadata.name);
    assert_eq!(updated.spec.routes[0].services[0].name, "svc-b");
}

/// Bumps the stored object between the solver's read and its write, so
/// every update carries a stale resourceVersion.
struct RacingWriterStore {
    inner: MemoryStore,
    updates: AtomicUsize,
}

#[async_trait]
impl StoreClient for RacingWriterStore {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<GenericObject>, StoreError> {
        self.inner.list(namespace, selector).await
    }

    async fn create(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        self.inner.create(namespace, object).await
    }

    async fn update(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);

        let mut current = self.inner.objects(namespace).remove(0);
        current.metadata_mut().finalizers = Some(vec!["other-writer".to_string()]);
        self.inner.update(namespace, current).await?;

        self.inner.update(namespace, object).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.inner.delete(namespace, name).await
    }
}

#[tokio::test]
async fn concurrent_modification_surfaces_as_conflict() {
    let store = Arc::new(RacingWriterStore {
        inner: MemoryStore::new(),
        updates: AtomicUsize::new(0),
    });
    let solver = HttpProxySolver::new(Arc::clone(&store), SolverSettings::default());
    let ch = challenge();

    solver.ensure(&ch, &solver.backend_for("svc-a")).await.unwrap();
    let err = solver
        .ensure(&ch, &solver.backend_for("svc-b"))
        .await
        .unwrap_err();

    assert!(err.is_conflict(), "expected conflict, got {err}");
    assert!(matches!(err, SolverError::Store(StoreError::Conflict { .. })));
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);

    let stored = codec::decode(store.inner.objects("ns1").remove(0)).unwrap();
    assert_eq!(stored.spec.routes[0].services[0].name, "svc-a");
}

/// Holds the first two listings until both have been served, so two
/// reconciles of one challenge both observe "no HTTPProxy yet".
struct GatedListStore {
    inner: MemoryStore,
    gate: Barrier,
    gated: AtomicUsize,
}

#[async_trait]
impl StoreClient for GatedListStore {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<GenericObject>, StoreError> {
        let found = self.inner.list(namespace, selector).await?;
        if self.gated.fetch_add(1, Ordering::SeqCst) < 2 {
            self.gate.wait().await;
        }
        Ok(found)
    }

    async fn create(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        self.inner.create(namespace, object).await
    }

    async fn update(
        &self,
        namespace: &str,
        object: GenericObject,
    ) -> Result<GenericObject, StoreError> {
        self.inner.update(namespace, object).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.inner.delete(namespace, name).await
    }
}

#[tokio::test]
async fn racing_creates_for_one_challenge_are_corrected() {
    let store = Arc::new(GatedListStore {
        inner: MemoryStore::new(),
        gate: Barrier::new(2),
        gated: AtomicUsize::new(0),
    });
    let solver = HttpProxySolver::new(Arc::clone(&store), SolverSettings::default());
    let ch = challenge();
    let backend = solver.backend_for("svc");

    let (first, second) = tokio::join!(solver.ensure(&ch, &backend), solver.ensure(&ch, &backend));
    first.unwrap();
    second.unwrap();
    assert_eq!(store.inner.len(), 2);
    assert_eq!(store.inner.stats().creates, 2);

    let err = solver.ensure(&ch, &backend).await.unwrap_err();
    assert!(err.is_ambiguous());
    assert_eq!(store.inner.len(), 1);

    let proxy = solver.ensure(&ch, &backend).await.unwrap();
    assert_eq!(proxy.spec, desired::build(&ch, &backend));
    assert_eq!(store.inner.len(), 1);
    assert_eq!(store.inner.stats().creates, 2);
}
