//! Admission hooks and the store wrapper that enforces them.
//!
//! Hooks run synchronously before an object is persisted. A negative decision
//! turns into [`StoreError::Rejected`] and nothing reaches the inner store.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashboard_core::{Object, ResourceKind};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::ObjectStore;
use crate::types::{ListParams, ObjectList, WatchStream};

/// Every rule an object violated, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdmissionError {
    violations: Vec<String>,
}

impl AdmissionError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: impl Into<String>) {
        self.violations.push(violation.into());
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.violations.join("; "))
    }
}

impl std::error::Error for AdmissionError {}

/// Decision returned by an [`AdmissionHook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionResponse {
    pub allowed: bool,
    pub reason: String,
    pub error: Option<AdmissionError>,
}

impl AdmissionResponse {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            error: None,
        }
    }

    pub fn deny(reason: impl Into<String>, error: AdmissionError) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            error: Some(error),
        }
    }
}

/// A synchronous validation step run on every create of a matching kind.
pub trait AdmissionHook: Send + Sync {
    /// Name used in logs and rejection errors.
    fn name(&self) -> &str;

    fn applies_to(&self, kind: ResourceKind) -> bool;

    fn validate(&self, obj: &Object) -> AdmissionResponse;
}

/// A store wrapper that runs admission hooks before every create.
///
/// Reads, updates and deletes are delegated untouched.
pub struct AdmittingStore<S: ObjectStore> {
    inner: S,
    hooks: Vec<Arc<dyn AdmissionHook>>,
}

impl<S: ObjectStore> AdmittingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            hooks: Vec::new(),
        }
    }

    /// Registers a hook. Hooks run in registration order; the first denial wins.
    pub fn with_hook(mut self, hook: Arc<dyn AdmissionHook>) -> Self {
        debug!(hook = %hook.name(), "Registered admission hook");
        self.hooks.push(hook);
        self
    }

    /// Get a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    fn admit(&self, obj: &Object) -> Result<(), StoreError> {
        for hook in self.hooks.iter().filter(|h| h.applies_to(obj.kind)) {
            let response = hook.validate(obj);
            if !response.allowed {
                let message = response
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!(
                    hook = %hook.name(),
                    kind = %obj.kind,
                    name = %obj.name(),
                    reason = %response.reason,
                    error = %message,
                    "Admission denied"
                );
                return Err(StoreError::rejected(hook.name(), response.reason, message));
            }
            debug!(
                hook = %hook.name(),
                kind = %obj.kind,
                name = %obj.name(),
                reason = %response.reason,
                "Admission allowed"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for AdmittingStore<S> {
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
        self.admit(obj)?;
        self.inner.create(obj).await
    }

    async fn update(&self, obj: &Object) -> Result<Object, StoreError> {
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
        self.inner.backend_name()
    }
}
