//! The controller: schema gate, informers, and a worker pool over the queue.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashboard_core::{Object, ResourceKind, SchemaDescriptor};
use dashboard_storage::{DynStore, WatchEvent};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::Cache;
use crate::error::ControllerError;
use crate::informer::{EventHandler, Informer};
use crate::queue::WorkQueue;
use crate::schema::{install_schemas, wait_until_established};

/// Identity of an object to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Request {
    pub namespace: Option<String>,
    pub name: String,
}

impl Request {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self::new(None, name)
    }

    pub fn from_object(obj: &Object) -> Self {
        Self::new(obj.namespace(), obj.name())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// What the engine does with a failed reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Retry with backoff until the retry budget is spent.
    Requeue,
    /// Permanent failure: log and forget.
    Drop,
}

/// What a reconciler sees besides the request.
#[derive(Clone)]
pub struct Context {
    pub store: DynStore,
    pub cache: Cache,
}

/// An idempotent function from an object identity to "live matches desired".
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name used in logs.
    fn name(&self) -> &str;

    async fn reconcile(&self, request: &Request, ctx: &Context) -> Result<(), Self::Error>;

    fn error_policy(&self, _error: &Self::Error) -> ErrorPolicy {
        ErrorPolicy::Requeue
    }
}

/// Maps a changed object to the requests it affects.
pub type Mapper = Arc<dyn Fn(&Object, &Cache) -> Vec<Request> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub workers: usize,
    pub max_retries: u32,
    /// Register `schemas` before waiting for them; otherwise only wait.
    pub install_schemas: bool,
    pub schemas: Vec<SchemaDescriptor>,
    pub schema_timeout: Duration,
    pub schema_poll_interval: Duration,
    pub cache_sync_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            max_retries: 5,
            install_schemas: true,
            schemas: Vec::new(),
            schema_timeout: Duration::from_secs(60),
            schema_poll_interval: Duration::from_millis(250),
            cache_sync_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(5),
            backoff_max: Duration::from_secs(1000),
        }
    }
}

pub struct Controller<R: Reconciler> {
    reconciler: Arc<R>,
    store: DynStore,
    cache: Cache,
    queue: WorkQueue<Request>,
    options: ControllerOptions,
    watches: Vec<(ResourceKind, Mapper)>,
}

impl<R: Reconciler> Controller<R> {
    pub fn new(store: DynStore, reconciler: R, options: ControllerOptions) -> Self {
        let queue = WorkQueue::new(options.backoff_base, options.backoff_max);
        Self {
            reconciler: Arc::new(reconciler),
            store,
            cache: Cache::new(),
            queue,
            options,
            watches: Vec::new(),
        }
    }

    /// Reconciles every object of `kind` under its own identity.
    pub fn for_kind(self, kind: ResourceKind) -> Self {
        self.watches(kind, Arc::new(|obj: &Object, _: &Cache| vec![Request::from_object(obj)]))
    }

    /// Watches `kind`, enqueueing whatever `mapper` returns for each change.
    pub fn watches(mut self, kind: ResourceKind, mapper: Mapper) -> Self {
        self.watches.push((kind, mapper));
        self
    }

    /// Watches `kind` and enqueues the controlling owner of each change.
    pub fn owns(self, kind: ResourceKind) -> Self {
        self.watches(
            kind,
            Arc::new(|obj: &Object, _: &Cache| {
                obj.controller_owner()
                    .map(|owner| {
                        let namespace = if owner.kind.is_namespaced() {
                            obj.namespace()
                        } else {
                            None
                        };
                        Request::new(namespace, owner.name.clone())
                    })
                    .into_iter()
                    .collect::<Vec<_>>()
            }),
        )
    }

    /// Handle for enqueueing requests from outside the watch path.
    pub fn queue(&self) -> WorkQueue<Request> {
        self.queue.clone()
    }

    /// Read-only view of the shared cache.
    pub fn cache(&self) -> Cache {
        self.cache.clone()
    }

    /// Runs until `shutdown` turns `true`.
    ///
    /// Startup is gated: schemas are installed (if configured) and
    /// established, then every watched kind must complete an initial listing
    /// before the first request is dispatched. Any gate failure is returned
    /// without dispatching anything.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ControllerError> {
        let name = self.reconciler.name().to_string();
        let opts = &self.options;

        if !opts.schemas.is_empty() {
            if opts.install_schemas {
                install_schemas(&*self.store, &opts.schemas).await?;
            }
            wait_until_established(
                &*self.store,
                &opts.schemas,
                opts.schema_timeout,
                opts.schema_poll_interval,
            )
            .await?;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut informers = JoinSet::new();
        let mut synced = Vec::new();
        for (kind, mappers) in self.mappers_by_kind() {
            let handler = self.event_handler(mappers);
            let (informer, synced_rx) =
                Informer::new(kind, self.store.clone(), self.cache.clone(), handler);
            informers.spawn(informer.run(stop_rx.clone()));
            synced.push((kind, synced_rx));
        }

        let kinds: Vec<ResourceKind> = synced.iter().map(|(kind, _)| *kind).collect();
        let wait_synced = async {
            for (_, rx) in synced.iter_mut() {
                // The sender lives as long as its informer; a closed channel
                // means it exited, which only happens on stop.
                let _ = rx.wait_for(|s| *s).await;
            }
        };
        tokio::select! {
            result = tokio::time::timeout(opts.cache_sync_timeout, wait_synced) => {
                if result.is_err() {
                    let _ = stop_tx.send(true);
                    informers.join_all().await;
                    return Err(ControllerError::CacheSyncTimeout {
                        kinds,
                        timeout: opts.cache_sync_timeout,
                    });
                }
            }
            _ = stopped(&mut shutdown) => {
                let _ = stop_tx.send(true);
                informers.join_all().await;
                return Ok(());
            }
        }
        info!(controller = %name, workers = opts.workers, kinds = ?kinds, "Caches synced, starting workers");

        let ctx = Context {
            store: self.store.clone(),
            cache: self.cache.clone(),
        };
        let mut workers = JoinSet::new();
        for id in 0..opts.workers.max(1) {
            workers.spawn(worker(
                id,
                self.reconciler.clone(),
                self.queue.clone(),
                ctx.clone(),
                opts.max_retries,
            ));
        }

        stopped(&mut shutdown).await;
        info!(controller = %name, "Shutting down");
        self.queue.shut_down();
        let _ = stop_tx.send(true);
        workers.join_all().await;
        informers.join_all().await;
        info!(controller = %name, "Stopped");
        Ok(())
    }

    fn mappers_by_kind(&self) -> BTreeMap<ResourceKind, Vec<Mapper>> {
        let mut by_kind: BTreeMap<ResourceKind, Vec<Mapper>> = BTreeMap::new();
        for (kind, mapper) in &self.watches {
            by_kind.entry(*kind).or_default().push(mapper.clone());
        }
        by_kind
    }

    fn event_handler(&self, mappers: Vec<Mapper>) -> EventHandler {
        let queue = self.queue.clone();
        let cache = self.cache.clone();
        Arc::new(move |event: &WatchEvent| {
            for mapper in &mappers {
                for request in mapper(event.object(), &cache) {
                    queue.add(request);
                }
            }
        })
    }
}

/// Resolves once `shutdown` is `true` or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|s| *s).await;
}

async fn worker<R: Reconciler>(
    id: usize,
    reconciler: Arc<R>,
    queue: WorkQueue<Request>,
    ctx: Context,
    max_retries: u32,
) {
    debug!(worker = id, "Worker started");
    while let Some(request) = queue.get().await {
        process(&*reconciler, &queue, &ctx, &request, max_retries).await;
        queue.done(&request);
    }
    debug!(worker = id, "Worker stopped");
}

async fn process<R: Reconciler>(
    reconciler: &R,
    queue: &WorkQueue<Request>,
    ctx: &Context,
    request: &Request,
    max_retries: u32,
) {
    let error = match reconciler.reconcile(request, ctx).await {
        Ok(()) => {
            queue.forget(request);
            debug!(controller = %reconciler.name(), %request, "Reconciled");
            return;
        }
        Err(e) => e,
    };

    match reconciler.error_policy(&error) {
        ErrorPolicy::Drop => {
            queue.forget(request);
            error!(
                controller = %reconciler.name(),
                %request,
                error = %error,
                "Reconcile failed permanently, dropping request"
            );
        }
        ErrorPolicy::Requeue => {
            let retries = queue.num_requeues(request);
            if retries < max_retries {
                warn!(
                    controller = %reconciler.name(),
                    %request,
                    retries,
                    error = %error,
                    "Reconcile failed, retry scheduled"
                );
                queue.add_rate_limited(request.clone());
            } else {
                queue.forget(request);
                error!(
                    controller = %reconciler.name(),
                    %request,
                    retries,
                    error = %error,
                    "Dropping request after max retries"
                );
            }
        }
    }
}
