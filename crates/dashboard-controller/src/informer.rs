//! Keeps one kind of the shared cache in sync with the store.
//!
//! Each cycle lists the kind, swaps the listing into the cache, then watches
//! from the listing's version. Any watch failure, `Expired` included, starts a
//! new cycle.

use std::sync::Arc;
use std::time::Duration;

use dashboard_core::ResourceKind;
use dashboard_storage::{DynStore, ListParams, WatchEvent};
use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Pause between relist attempts after a failure.
const RELIST_BACKOFF: Duration = Duration::from_millis(100);

pub(crate) type EventHandler = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

pub(crate) struct Informer {
    kind: ResourceKind,
    store: DynStore,
    cache: Cache,
    handler: EventHandler,
    synced: watch::Sender<bool>,
}

impl Informer {
    pub fn new(
        kind: ResourceKind,
        store: DynStore,
        cache: Cache,
        handler: EventHandler,
    ) -> (Self, watch::Receiver<bool>) {
        let (synced, synced_rx) = watch::channel(false);
        (
            Self {
                kind,
                store,
                cache,
                handler,
                synced,
            },
            synced_rx,
        )
    }

    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let kind = self.kind;
        let params = ListParams::new();

        loop {
            if *stop.borrow() {
                break;
            }

            let list = match self.store.list(kind, None, &params).await {
                Ok(list) => list,
                Err(e) => {
                    warn!(%kind, error = %e, "List failed, retrying");
                    if pause_or_stop(&mut stop).await {
                        break;
                    }
                    continue;
                }
            };

            let removed = self.cache.replace(kind, &list.items);
            for obj in removed {
                (self.handler)(&WatchEvent::Deleted(obj));
            }
            let count = list.items.len();
            for obj in list.items {
                (self.handler)(&WatchEvent::Added(obj));
            }
            if !self.synced.send_replace(true) {
                info!(%kind, objects = count, "Cache synced");
            } else {
                debug!(%kind, objects = count, version = %list.resource_version, "Relisted");
            }

            let mut stream = match self
                .store
                .watch(kind, &params, Some(&list.resource_version))
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(%kind, error = %e, "Watch failed, relisting");
                    if pause_or_stop(&mut stop).await {
                        break;
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    item = stream.next() => match item {
                        Some(Ok(event)) => {
                            self.cache.apply(&event);
                            (self.handler)(&event);
                        }
                        Some(Err(e)) if e.is_expired() => {
                            warn!(%kind, error = %e, "Watch expired, relisting");
                            break;
                        }
                        Some(Err(e)) => {
                            warn!(%kind, error = %e, "Watch error, relisting");
                            break;
                        }
                        None => {
                            debug!(%kind, "Watch closed, relisting");
                            break;
                        }
                    },
                    _ = stop.changed() => {
                        debug!(%kind, "Informer stopping");
                        return;
                    }
                }
            }

            if pause_or_stop(&mut stop).await {
                break;
            }
        }
        debug!(%kind, "Informer stopped");
    }
}

/// Sleeps before the next cycle. Returns `true` if asked to stop meanwhile.
async fn pause_or_stop(stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(RELIST_BACKOFF) => *stop.borrow(),
        _ = stop.changed() => true,
    }
}
