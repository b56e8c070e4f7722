//! # dashboard-storage
//!
//! Object store contract for the dashboard control plane.
//!
//! This crate defines the traits and types every store backend implements and
//! every dashboard component consumes. It contains no backend; the in-memory
//! one lives in `dashboard-db-memory`.
//!
//! ## Overview
//!
//! The main trait is [`ObjectStore`], which defines:
//! - get/list/create/update/delete on typed objects
//! - watch with resume-from-version
//! - optimistic concurrency through resource versions
//!
//! Two wrappers layer request policy over any store:
//! - [`AdmittingStore`] runs [`AdmissionHook`]s before every create
//! - [`DeadlineStore`] bounds every request with a timeout
//!
//! ## Example
//!
//! ```ignore
//! use dashboard_storage::{AdmittingStore, DeadlineStore, ObjectStore};
//!
//! let store = DeadlineStore::new(
//!     AdmittingStore::new(backend).with_hook(validator),
//!     Duration::from_secs(10),
//! );
//! let orgs = store.list(ResourceKind::Namespace, None, &params).await?;
//! ```

pub mod admission;
pub mod deadline;
mod error;
pub mod selector;
mod traits;
mod types;

pub use admission::{AdmissionError, AdmissionHook, AdmissionResponse, AdmittingStore};
pub use deadline::DeadlineStore;
pub use error::{ErrorCategory, StoreError};
pub use selector::{FieldSelector, LabelSelector, Requirement};
pub use traits::ObjectStore;
pub use types::{ListParams, ObjectList, WatchEvent, WatchStream};

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn ObjectStore>;
