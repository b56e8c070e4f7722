use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::Router;
use dashboard_db_memory::{InMemoryStore, StoreOptions};
use dashboard_storage::{AdmittingStore, DeadlineStore, DynStore};
use tokio::sync::watch;

use crate::admission::ProjectNamespaceValidator;
use crate::api::{ApiState, build_router};
use crate::config::AppConfig;
use crate::organization::OrganizationService;
use crate::project::project_controller;

/// How often terminating namespaces are swept from the in-memory store.
const PURGE_INTERVAL: Duration = Duration::from_secs(1);

/// The store stack every component talks to: the backend behind admission
/// and a per-request deadline.
pub fn build_store(config: &AppConfig) -> (Arc<InMemoryStore>, DynStore) {
    let backend = Arc::new(InMemoryStore::with_options(StoreOptions {
        event_log_capacity: config.store.event_log_capacity,
        ..Default::default()
    }));
    let admitting = AdmittingStore::new(backend.clone())
        .with_hook(Arc::new(ProjectNamespaceValidator::new()));
    let store: DynStore = Arc::new(DeadlineStore::new(admitting, config.request_timeout()));
    (backend, store)
}

pub fn build_app(config: &AppConfig, store: DynStore) -> Result<Router, String> {
    let state = ApiState::new(OrganizationService::new(store), &config.api.subject_header)?;
    Ok(build_router(state))
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn build(self) -> Result<DashboardServer, String> {
        self.config.validate()?;
        let (backend, store) = build_store(&self.config);
        let app = if self.config.api.enabled {
            Some(build_app(&self.config, store.clone())?)
        } else {
            None
        };
        Ok(DashboardServer {
            addr: self.config.addr(),
            config: self.config,
            backend,
            store,
            app,
        })
    }
}

pub struct DashboardServer {
    addr: SocketAddr,
    config: AppConfig,
    backend: Arc<InMemoryStore>,
    store: DynStore,
    app: Option<Router>,
}

impl DashboardServer {
    pub fn store(&self) -> DynStore {
        self.store.clone()
    }

    /// Runs until Ctrl+C.
    pub async fn run(self) -> anyhow::Result<()> {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = tx.send(true);
        });
        self.run_until(rx).await
    }

    /// Runs the controller and the API until `shutdown` turns `true`.
    ///
    /// A controller startup failure stops the API and is returned.
    pub async fn run_until(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        // Internal stop: fires on external shutdown or on controller failure.
        let (stop_tx, stop_rx) = watch::channel(false);
        let forward = {
            let stop_tx = stop_tx.clone();
            let mut shutdown = shutdown;
            tokio::spawn(async move {
                stopped(&mut shutdown).await;
                let _ = stop_tx.send(true);
            })
        };

        let purge = tokio::spawn(purge_loop(self.backend.clone(), stop_rx.clone()));

        let api = match self.app {
            Some(app) => {
                let listener = tokio::net::TcpListener::bind(self.addr)
                    .await
                    .with_context(|| format!("failed to bind {}", self.addr))?;
                tracing::info!("listening on {}", self.addr);
                let mut stop = stop_rx.clone();
                Some(tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move { stopped(&mut stop).await })
                        .await
                }))
            }
            None => {
                tracing::info!("API disabled");
                None
            }
        };

        let controller = project_controller(
            self.store.clone(),
            &self.config.controller.name,
            self.config.controller_options(),
        );
        let result = controller.run(stop_rx).await;
        if let Err(ref e) = result {
            tracing::error!(error = %e, "Project controller failed");
        }

        let _ = stop_tx.send(true);
        forward.abort();
        if let Some(api) = api {
            api.await.context("API task panicked")??;
        }
        let _ = purge.await;

        result.context("project controller")
    }
}

/// Emulates the namespace controller: removes terminating namespaces and
/// their contents.
async fn purge_loop(backend: Arc<InMemoryStore>, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let purged = backend.purge_terminating_namespaces();
                if purged > 0 {
                    tracing::debug!(purged, "Purged terminating namespaces");
                }
            }
            _ = stopped(&mut stop) => break,
        }
    }
}

/// Resolves once `stop` is `true` or its sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|s| *s).await;
}

pub async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
