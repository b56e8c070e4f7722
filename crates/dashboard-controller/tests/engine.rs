use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashboard_controller::{
    Context, Controller, ControllerError, ControllerOptions, ErrorPolicy, Reconciler, Request,
};
use dashboard_core::{Object, ResourceKind, SchemaDescriptor};
use dashboard_db_memory::{InMemoryStore, StoreOptions};
use dashboard_storage::{
    DynStore, ListParams, ObjectList, ObjectStore, StoreError, WatchStream,
};
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

fn fast_options() -> ControllerOptions {
    ControllerOptions {
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(20),
        cache_sync_timeout: Duration::from_secs(2),
        schema_poll_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[derive(Debug, Clone, thiserror::Error)]
enum TestError {
    #[error("transient")]
    Transient,
    #[error("permanent")]
    Permanent,
}

/// Counts runs per request and optionally fails or blocks.
#[derive(Default)]
struct Recorder {
    runs: Mutex<HashMap<Request, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    finished: AtomicUsize,
    fail_with: Option<TestError>,
    gate: Option<Arc<Notify>>,
    delay: Option<Duration>,
}

impl Recorder {
    fn runs(&self, name: &str) -> usize {
        self.runs
            .lock()
            .get(&Request::cluster(name))
            .copied()
            .unwrap_or(0)
    }

    fn started(&self) -> usize {
        self.runs.lock().values().sum()
    }
}

struct Recording(Arc<Recorder>);

#[async_trait]
impl Reconciler for Recording {
    type Error = TestError;

    fn name(&self) -> &str {
        "recorder"
    }

    async fn reconcile(&self, request: &Request, _ctx: &Context) -> Result<(), TestError> {
        let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_in_flight.fetch_max(now, Ordering::SeqCst);
        *self.0.runs.lock().entry(request.clone()).or_default() += 1;

        if let Some(gate) = &self.0.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.0.delay {
            tokio::time::sleep(delay).await;
        }
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.finished.fetch_add(1, Ordering::SeqCst);

        match &self.0.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn error_policy(&self, error: &TestError) -> ErrorPolicy {
        match error {
            TestError::Transient => ErrorPolicy::Requeue,
            TestError::Permanent => ErrorPolicy::Drop,
        }
    }
}

async fn seeded_store(names: &[&str]) -> DynStore {
    let store: DynStore = Arc::new(InMemoryStore::new());
    for name in names {
        store
            .create(&Object::new(ResourceKind::Namespace, *name))
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn reconciles_every_object_once_and_settles() {
    let store = seeded_store(&["proj-a", "proj-b"]).await;
    let recorder = Arc::new(Recorder::default());
    let controller = Controller::new(store.clone(), Recording(recorder.clone()), fast_options())
        .for_kind(ResourceKind::Namespace);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    assert!(eventually(|| recorder.runs("proj-a") == 1 && recorder.runs("proj-b") == 1).await);

    store
        .create(&Object::new(ResourceKind::Namespace, "proj-c"))
        .await
        .unwrap();
    assert!(eventually(|| recorder.runs("proj-c") == 1).await);

    // Nothing changes, so nothing is reconciled again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.runs("proj-a"), 1);
    assert_eq!(recorder.runs("proj-b"), 1);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn enqueues_during_a_run_collapse_into_one_follow_up() {
    let store = seeded_store(&["proj-a"]).await;
    let gate = Arc::new(Notify::new());
    let recorder = Arc::new(Recorder {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let controller = Controller::new(store, Recording(recorder.clone()), fast_options())
        .for_kind(ResourceKind::Namespace);
    let queue = controller.queue();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    assert!(eventually(|| recorder.runs("proj-a") == 1).await);
    for _ in 0..10 {
        queue.add(Request::cluster("proj-a"));
    }
    gate.notify_one();

    assert!(eventually(|| recorder.runs("proj-a") == 2).await);
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(recorder.runs("proj-a"), 2);
    assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 1);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_lets_in_flight_runs_finish_and_dequeues_nothing_new() {
    let names: Vec<String> = (0..8).map(|i| format!("proj-{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let store = seeded_store(&refs).await;
    let recorder = Arc::new(Recorder {
        delay: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    let options = ControllerOptions {
        workers: 2,
        ..fast_options()
    };
    let controller = Controller::new(store, Recording(recorder.clone()), options)
        .for_kind(ResourceKind::Namespace);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    assert!(eventually(|| recorder.started() >= 2).await);
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let started = recorder.started();
    assert_eq!(started, recorder.finished.load(Ordering::SeqCst));
    assert!(started < 8, "started {started} of 8 after shutdown");

    // Workers are gone: nothing else starts later.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(recorder.started(), started);
}

#[tokio::test]
async fn transient_failures_stop_after_retry_budget() {
    let store = seeded_store(&["proj-a"]).await;
    let recorder = Arc::new(Recorder {
        fail_with: Some(TestError::Transient),
        ..Default::default()
    });
    let options = ControllerOptions {
        max_retries: 3,
        ..fast_options()
    };
    let controller = Controller::new(store, Recording(recorder.clone()), options)
        .for_kind(ResourceKind::Namespace);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    // First attempt plus three retries.
    assert!(eventually(|| recorder.runs("proj-a") == 4).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.runs("proj-a"), 4);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let store = seeded_store(&["proj-a"]).await;
    let recorder = Arc::new(Recorder {
        fail_with: Some(TestError::Permanent),
        ..Default::default()
    });
    let controller = Controller::new(store, Recording(recorder.clone()), fast_options())
        .for_kind(ResourceKind::Namespace);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(rx));

    assert!(eventually(|| recorder.runs("proj-a") == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.runs("proj-a"), 1);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn unestablished_schema_blocks_startup() {
    let store: DynStore = Arc::new(InMemoryStore::with_options(StoreOptions {
        auto_establish_schemas: false,
        ..Default::default()
    }));
    let recorder = Arc::new(Recorder::default());
    let options = ControllerOptions {
        schemas: vec![SchemaDescriptor::project()],
        schema_timeout: Duration::from_millis(50),
        ..fast_options()
    };
    let controller = Controller::new(store.clone(), Recording(recorder.clone()), options)
        .for_kind(ResourceKind::Namespace);

    let (_tx, rx) = watch::channel(false);
    let err = controller.run(rx).await.unwrap_err();
    assert!(matches!(err, ControllerError::SchemaTimeout { .. }));
    assert!(recorder.runs.lock().is_empty());

    // Installed even though it never became established.
    assert!(
        store
            .get(ResourceKind::CustomResourceDefinition, None, "projects.dashboard.presslabs.com")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn wait_only_mode_does_not_install() {
    let store: DynStore = Arc::new(InMemoryStore::new());
    let options = ControllerOptions {
        install_schemas: false,
        schemas: vec![SchemaDescriptor::project()],
        schema_timeout: Duration::from_millis(30),
        ..fast_options()
    };
    let controller = Controller::new(store.clone(), Recording(Arc::new(Recorder::default())), options)
        .for_kind(ResourceKind::Namespace);

    let (_tx, rx) = watch::channel(false);
    let err = controller.run(rx).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(
        store
            .get(ResourceKind::CustomResourceDefinition, None, "projects.dashboard.presslabs.com")
            .await
            .unwrap()
            .is_none()
    );
}

/// A store that can never complete a listing.
struct Unlistable(InMemoryStore);

#[async_trait]
impl ObjectStore for Unlistable {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Object>, StoreError> {
        self.0.get(kind, namespace, name).await
    }

    async fn list(
        &self,
        _kind: ResourceKind,
        _namespace: Option<&str>,
        _params: &ListParams,
    ) -> Result<ObjectList, StoreError> {
        Err(StoreError::connection("connection refused"))
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        since: Option<&str>,
    ) -> Result<WatchStream, StoreError> {
        self.0.watch(kind, params, since).await
    }

    async fn create(&self, obj: &Object) -> Result<Object, StoreError> {
        self.0.create(obj).await
    }

    async fn update(&self, obj: &Object) -> Result<Object, StoreError> {
        self.0.update(obj).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        self.0.delete(kind, namespace, name).await
    }

    fn backend_name(&self) -> &'static str {
        "unlistable"
    }
}

#[tokio::test]
async fn cache_sync_timeout_is_returned_not_dispatched() {
    let store: DynStore = Arc::new(Unlistable(InMemoryStore::new()));
    let recorder = Arc::new(Recorder::default());
    let options = ControllerOptions {
        cache_sync_timeout: Duration::from_millis(50),
        ..fast_options()
    };
    let controller = Controller::new(store, Recording(recorder.clone()), options)
        .for_kind(ResourceKind::Namespace);

    let (_tx, rx) = watch::channel(false);
    let err = controller.run(rx).await.unwrap_err();
    match err {
        ControllerError::CacheSyncTimeout { kinds, .. } => {
            assert_eq!(kinds, vec![ResourceKind::Namespace]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(recorder.runs.lock().is_empty());
}
