//! In-memory object store backend for the dashboard control plane.
//!
//! This crate provides an in-memory implementation of the `ObjectStore` trait
//! from `dashboard-storage`, using a papaya lock-free HashMap for reads and a
//! bounded change log for watch resumption. It stands in for the cluster
//! control plane in tests and single-process deployments.
//!
//! # Example
//!
//! ```ignore
//! use dashboard_db_memory::InMemoryStore;
//! use dashboard_storage::ObjectStore;
//!
//! let store = InMemoryStore::new();
//! let ns = Object::new(ResourceKind::Namespace, "org-acme");
//! let created = store.create(&ns).await?;
//! assert_eq!(created.resource_version(), Some("1"));
//! ```

mod event_log;
pub mod options;
pub mod store;

// Re-export the ObjectStore trait for convenience
pub use dashboard_storage::{ObjectStore, StoreError};

pub use options::{DEFAULT_EVENT_LOG_CAPACITY, StoreOptions};
pub use store::InMemoryStore;
