//! Dashboard server: the project controller, the project namespace admission
//! validator and the organization API, wired over one store.

pub mod admission;
pub mod api;
pub mod config;
pub mod observability;
pub mod organization;
pub mod project;
pub mod rpc;
pub mod server;

pub use admission::ProjectNamespaceValidator;
pub use config::AppConfig;
pub use observability::{apply_logging_level, init_tracing};
pub use organization::{OrganizationError, OrganizationService};
pub use project::{ProjectError, ProjectReconciler, project_controller};
pub use server::{DashboardServer, ServerBuilder, build_app, build_store};
