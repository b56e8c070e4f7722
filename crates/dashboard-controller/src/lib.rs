//! Reconciliation engine for the dashboard control plane.
//!
//! A [`Controller`] keeps a shared [`Cache`] in sync with the store through
//! one informer per watched kind, turns every observed change into
//! [`Request`]s on a deduplicating [`WorkQueue`], and drains that queue with a
//! fixed pool of workers calling a [`Reconciler`].
//!
//! Guarantees:
//! - no request is dispatched before schemas are established and every
//!   watched kind completed its initial listing
//! - one identity is never reconciled by two workers at once
//! - failed requests are retried with per-identity exponential backoff up to
//!   a retry budget, then dropped with an error log
//!
//! ```ignore
//! let controller = Controller::new(store, ProjectReconciler::new(name), options)
//!     .for_kind(ResourceKind::Namespace)
//!     .owns(ResourceKind::Deployment);
//! controller.run(shutdown_rx).await?;
//! ```

pub mod cache;
pub mod controller;
pub mod error;
mod informer;
pub mod queue;
pub mod schema;

pub use cache::Cache;
pub use controller::{Context, Controller, ControllerOptions, ErrorPolicy, Mapper, Reconciler, Request};
pub use error::ControllerError;
pub use queue::{ExponentialBackoff, WorkQueue};
pub use schema::{install_schemas, wait_until_established};
