use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashboard_controller::{Context, ControllerOptions, Reconciler, Request};
use dashboard_core::{Object, Organization, ProjectNamespace, ResourceKind};
use dashboard_db_memory::InMemoryStore;
use dashboard_server::project::{Component, ProjectError, ProjectReconciler, project_controller};
use dashboard_server::{AppConfig, ProjectNamespaceValidator};
use dashboard_storage::{
    AdmittingStore, DynStore, ListParams, ObjectList, ObjectStore, StoreError, WatchStream,
};
use tokio::sync::watch;

const CONTROLLER: &str = "project-controller.dashboard.presslabs.com";

fn options() -> ControllerOptions {
    ControllerOptions {
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(50),
        schema_poll_interval: Duration::from_millis(5),
        cache_sync_timeout: Duration::from_secs(2),
        ..AppConfig::default().controller_options()
    }
}

fn stack() -> (Arc<InMemoryStore>, DynStore) {
    let backend = Arc::new(InMemoryStore::new());
    let store: DynStore = Arc::new(
        AdmittingStore::new(backend.clone()).with_hook(Arc::new(ProjectNamespaceValidator::new())),
    );
    (backend, store)
}

async fn create_org(store: &DynStore, slug: &str) {
    store
        .create(Organization::new(slug, "", "user:1").as_object())
        .await
        .unwrap();
}

async fn create_project(store: &DynStore, org: &str, project: &str) {
    store
        .create(ProjectNamespace::new(org, project, "user:1").as_object())
        .await
        .unwrap();
}

async fn derived(store: &DynStore, namespace: &str, component: Component) -> Option<Object> {
    store
        .get(component.kind(), Some(namespace), component.object_name())
        .await
        .unwrap()
}

async fn materialized_count(store: &DynStore, namespace: &str) -> usize {
    let mut count = 0;
    for component in Component::ALL {
        if derived(store, namespace, component).await.is_some() {
            count += 1;
        }
    }
    count
}

async fn wait_for_catalog(store: &DynStore, namespace: &str) {
    for _ in 0..400 {
        if materialized_count(store, namespace).await == Component::ALL.len() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("catalog for {namespace} was never materialized");
}

/// Waits until the store has not been written for a while.
async fn wait_for_quiet(backend: &InMemoryStore) -> u64 {
    let mut last = backend.current_version();
    loop {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let now = backend.current_version();
        if now == last {
            return now;
        }
        last = now;
    }
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn expected_labels(component: Component) -> BTreeMap<String, String> {
    labels_for(component, "web", "acme")
}

fn labels_for(component: Component, project: &str, organization: &str) -> BTreeMap<String, String> {
    let base = [
        ("presslabs.com/project", project),
        ("presslabs.com/organization", organization),
        ("app.kubernetes.io/managed-by", CONTROLLER),
    ];
    let extra: &[(&str, &str)] = match component {
        Component::ResourceQuota | Component::LimitRange => &[],
        Component::Prometheus => &[
            ("app.kubernetes.io/name", "prometheus"),
            ("app.kubernetes.io/version", "v2.3.2"),
        ],
        Component::GiteaDeployment => &[
            ("app.kubernetes.io/name", "gitea"),
            ("app.kubernetes.io/component", "web"),
            ("app.kubernetes.io/version", "1.5.2"),
        ],
        _ => &[
            ("app.kubernetes.io/name", "gitea"),
            ("app.kubernetes.io/component", "web"),
        ],
    };
    labels(&[&base[..], extra].concat())
}

#[tokio::test]
async fn materializes_catalog_with_exact_labels_and_settles() {
    let (backend, store) = stack();
    create_org(&store, "acme").await;
    create_project(&store, "acme", "web").await;

    let controller = project_controller(store.clone(), CONTROLLER, options());
    let cache = controller.cache();
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    wait_for_catalog(&store, "proj-web").await;
    for component in Component::ALL {
        let obj = derived(&store, "proj-web", component).await.unwrap();
        assert_eq!(obj.metadata.labels, expected_labels(component), "{component:?}");
        assert_eq!(
            obj.controller_owner().map(|o| o.name.as_str()),
            Some("proj-web")
        );
    }

    // Once settled, another run on the unchanged project writes nothing.
    let before = wait_for_quiet(&backend).await;
    let ctx = Context {
        store: store.clone(),
        cache,
    };
    ProjectReconciler::new(CONTROLLER)
        .reconcile(&Request::cluster("proj-web"), &ctx)
        .await
        .unwrap();
    assert_eq!(backend.current_version(), before);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn label_drift_is_repaired() {
    let (backend, store) = stack();
    create_org(&store, "acme").await;
    create_project(&store, "acme", "web").await;

    let controller = project_controller(store.clone(), CONTROLLER, options());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));
    wait_for_catalog(&store, "proj-web").await;
    wait_for_quiet(&backend).await;

    let mut service = derived(&store, "proj-web", Component::GiteaService)
        .await
        .unwrap();
    service.set_label("tampered", "yes");
    service
        .metadata
        .labels
        .remove("app.kubernetes.io/component");
    store.update(&service).await.unwrap();

    let mut repaired = false;
    for _ in 0..400 {
        let live = derived(&store, "proj-web", Component::GiteaService)
            .await
            .unwrap();
        if live.metadata.labels == expected_labels(Component::GiteaService) {
            repaired = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(repaired, "service labels were not restored");

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn waits_for_the_organization() {
    let (_backend, store) = stack();
    create_project(&store, "acme", "web").await;

    let controller = project_controller(store.clone(), CONTROLLER, options());
    let cache = controller.cache();
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    // Give the controller time to try and fail.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(materialized_count(&store, "proj-web").await, 0);

    let ctx = Context {
        store: store.clone(),
        cache,
    };
    let err = ProjectReconciler::new(CONTROLLER)
        .reconcile(&Request::cluster("proj-web"), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProjectError::DependencyMissing { .. }));

    // The organization showing up brings its projects back to the queue.
    create_org(&store, "acme").await;
    wait_for_catalog(&store, "proj-web").await;

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn deleted_projects_are_a_no_op() {
    let (_backend, store) = stack();
    let ctx = Context {
        store: store.clone(),
        cache: dashboard_controller::Cache::new(),
    };
    ProjectReconciler::new(CONTROLLER)
        .reconcile(&Request::cluster("proj-gone"), &ctx)
        .await
        .unwrap();
    assert!(
        store
            .list(ResourceKind::Secret, None, &Default::default())
            .await
            .unwrap()
            .items
            .is_empty()
    );
}

#[tokio::test]
async fn admitted_label_values_need_not_be_slugs() {
    let (_backend, store) = stack();
    create_org(&store, "acme").await;
    let project = Object::new(ResourceKind::Namespace, "proj-web-app")
        .with_labels([
            ("presslabs.com/kind", "project"),
            ("presslabs.com/organization", "acme"),
            ("presslabs.com/project", "Web_App"),
        ])
        .with_annotations([("presslabs.com/created-by", "user:1")]);
    store.create(&project).await.unwrap();

    let controller = project_controller(store.clone(), CONTROLLER, options());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    wait_for_catalog(&store, "proj-web-app").await;
    for component in Component::ALL {
        let obj = derived(&store, "proj-web-app", component).await.unwrap();
        assert_eq!(obj.metadata.labels, labels_for(component, "Web_App", "acme"), "{component:?}");
    }

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

/// Answers the first `remaining` writes of one kind with `Conflict`.
struct Conflicting {
    inner: DynStore,
    kind: ResourceKind,
    remaining: AtomicUsize,
}

impl Conflicting {
    fn take_conflict(&self, obj: &Object) -> Result<(), StoreError> {
        if obj.kind != self.kind {
            return Ok(());
        }
        let hit = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            return Err(StoreError::conflict(obj.key(), "stale", "fresh"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for Conflicting {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Object>, StoreError> {
        self.inner.get(kind, namespace, name).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<ObjectList, StoreError> {
        self.inner.list(kind, namespace, params).await
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        since: Option<&str>,
    ) -> Result<WatchStream, StoreError> {
        self.inner.watch(kind, params, since).await
    }

    async fn create(&self, obj: &Object) -> Result<Object, StoreError> {
        self.take_conflict(obj)?;
        self.inner.create(obj).await
    }

    async fn update(&self, obj: &Object) -> Result<Object, StoreError> {
        self.take_conflict(obj)?;
        self.inner.update(obj).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        self.inner.delete(kind, namespace, name).await
    }

    fn backend_name(&self) -> &'static str {
        "conflicting"
    }
}

#[tokio::test]
async fn catalog_converges_after_write_conflicts() {
    let (_backend, store) = stack();
    create_org(&store, "acme").await;
    create_project(&store, "acme", "web").await;

    let conflicting = Arc::new(Conflicting {
        inner: store.clone(),
        kind: ResourceKind::Deployment,
        remaining: AtomicUsize::new(3),
    });
    let controller = project_controller(conflicting.clone(), CONTROLLER, options());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    wait_for_catalog(&store, "proj-web").await;
    assert_eq!(conflicting.remaining.load(Ordering::SeqCst), 0);
    for component in Component::ALL {
        let obj = derived(&store, "proj-web", component).await.unwrap();
        assert_eq!(obj.metadata.labels, expected_labels(component), "{component:?}");
    }

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
