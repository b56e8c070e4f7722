//! Pure computation of the objects a project namespace should contain.

use dashboard_core::labels::{MANAGED_BY_LABEL, ORGANIZATION_LABEL, PROJECT_LABEL};
use dashboard_core::{CoreError, Labels, Object, ProjectNamespace};

use super::components::Component;

/// Label set a derived object of `component` must carry, exactly.
pub fn desired_labels(
    component: Component,
    project: &str,
    organization: &str,
    controller_name: &str,
) -> Labels {
    let mut labels = Labels::new();
    labels.insert(PROJECT_LABEL.to_string(), project.to_string());
    labels.insert(ORGANIZATION_LABEL.to_string(), organization.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), controller_name.to_string());
    for (key, value) in component.component_labels() {
        labels.insert(key.to_string(), value.to_string());
    }
    labels
}

/// Every catalog object for `project`, owned by the project namespace.
///
/// Label values are copied verbatim; object names come from the catalog and
/// never depend on them. Fails only when the project label is missing.
pub fn desired_objects(
    project: &ProjectNamespace,
    organization: &str,
    controller_name: &str,
) -> Result<Vec<(Component, Object)>, CoreError> {
    let namespace = project.name();
    let project_slug = project
        .project()
        .ok_or_else(|| CoreError::invalid_object(namespace, format!("missing label {PROJECT_LABEL}")))?;

    let owner = project.as_object().controller_reference();
    let objects = Component::ALL
        .iter()
        .map(|&component| {
            let mut obj = Object::namespaced(component.kind(), namespace, component.object_name())
                .with_spec(component.body(project_slug, organization));
            obj.metadata.labels =
                desired_labels(component, project_slug, organization, controller_name);
            obj.metadata.owner_references.push(owner.clone());
            (component, obj)
        })
        .collect();
    Ok(objects)
}
