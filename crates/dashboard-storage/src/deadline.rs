//! DeadlineStore - bounds every store request with a timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashboard_core::{Object, ResourceKind};
use tracing::warn;

use crate::error::StoreError;
use crate::traits::ObjectStore;
use crate::types::{ListParams, ObjectList, WatchStream};

/// A store wrapper that fails any request exceeding `timeout`.
///
/// The deadline applies to opening a watch, not to the lifetime of the
/// returned stream.
pub struct DeadlineStore<S: ObjectStore> {
    inner: S,
    timeout: Duration,
}

impl<S: ObjectStore> DeadlineStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(operation, timeout_ms = millis, "Store request deadline exceeded");
                Err(StoreError::timeout(operation, millis))
            }
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for DeadlineStore<S> {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Object>, StoreError> {
        self.bounded("get", self.inner.get(kind, namespace, name))
            .await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<ObjectList, StoreError> {
        self.bounded("list", self.inner.list(kind, namespace, params))
            .await
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        since: Option<&str>,
    ) -> Result<WatchStream, StoreError> {
        self.bounded("watch", self.inner.watch(kind, params, since))
            .await
    }

    async fn create(&self, obj: &Object) -> Result<Object, StoreError> {
        self.bounded("create", self.inner.create(obj)).await
    }

    async fn update(&self, obj: &Object) -> Result<Object, StoreError> {
        self.bounded("update", self.inner.update(obj)).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        self.bounded("delete", self.inner.delete(kind, namespace, name))
            .await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
