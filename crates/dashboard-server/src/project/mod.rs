//! Project materializer: keeps the derived resource catalog in place for
//! every active project namespace.

pub mod components;
pub mod desired;
pub mod reconciler;

use std::sync::Arc;

use dashboard_controller::{Controller, ControllerOptions};
use dashboard_storage::DynStore;

pub use components::Component;
pub use desired::{desired_labels, desired_objects};
pub use reconciler::{ProjectError, ProjectReconciler, namespace_requests};

/// Builds the project controller.
///
/// Namespaces are watched for projects and for the organizations they
/// depend on; every catalog kind is watched so that drift in a derived
/// object brings its project back to the queue.
pub fn project_controller(
    store: DynStore,
    controller_name: &str,
    options: ControllerOptions,
) -> Controller<ProjectReconciler> {
    let controller = Controller::new(store, ProjectReconciler::new(controller_name), options)
        .watches(
            dashboard_core::ResourceKind::Namespace,
            Arc::new(namespace_requests),
        );

    Component::ALL
        .iter()
        .fold(controller, |controller, component| controller.owns(component.kind()))
}
