//! The object store contract consumed by every dashboard component.

use std::sync::Arc;

use async_trait::async_trait;
use dashboard_core::{Object, ResourceKind};

use crate::error::StoreError;
use crate::types::{ListParams, ObjectList, WatchStream};

/// A strongly consistent object store with optimistic concurrency and watch.
///
/// Implementations must be thread-safe (`Send + Sync`). Every mutation
/// returns the stored object carrying a fresh `resource_version`.
///
/// # Example
///
/// ```ignore
/// use dashboard_storage::{ObjectStore, StoreError};
///
/// async fn get_org(store: &dyn ObjectStore, slug: &str) -> Result<Object, StoreError> {
///     let key = ObjectKey::cluster(ResourceKind::Namespace, format!("org-{slug}"));
///     store
///         .get(ResourceKind::Namespace, None, &key.name)
///         .await?
///         .ok_or_else(|| StoreError::not_found(key))
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads one object.
    ///
    /// Returns `None` if the object does not exist. Terminating objects are
    /// still returned.
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Object>, StoreError>;

    /// Lists objects of `kind`, optionally restricted to one namespace.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<ObjectList, StoreError>;

    /// Streams changes to objects of `kind` matching `params`.
    ///
    /// With `since`, replays every change newer than that version first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Expired` if `since` is older than the retained history.
    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        since: Option<&str>,
    ) -> Result<WatchStream, StoreError>;

    /// Persists a new object.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if an object with the same key exists.
    /// Returns `StoreError::Invalid` if the object cannot be stored where addressed.
    async fn create(&self, obj: &Object) -> Result<Object, StoreError>;

    /// Replaces an existing object.
    ///
    /// If `obj` carries a resource version, it must match the stored one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the object does not exist.
    /// Returns `StoreError::Conflict` on a version mismatch.
    async fn update(&self, obj: &Object) -> Result<Object, StoreError>;

    /// Requests deletion.
    ///
    /// Objects guarded by finalizers, and namespaces, transition to
    /// `Terminating` instead of disappearing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the object does not exist.
    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Object>, StoreError> {
        (**self).get(kind, namespace, name).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<ObjectList, StoreError> {
        (**self).list(kind, namespace, params).await
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        since: Option<&str>,
    ) -> Result<WatchStream, StoreError> {
        (**self).watch(kind, params, since).await
    }

    async fn create(&self, obj: &Object) -> Result<Object, StoreError> {
        (**self).create(obj).await
    }

    async fn update(&self, obj: &Object) -> Result<Object, StoreError> {
        (**self).update(obj).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        (**self).delete(kind, namespace, name).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that ObjectStore is object-safe
    fn _assert_store_object_safe(_: &dyn ObjectStore) {}
}
