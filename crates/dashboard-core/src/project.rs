//! Projects are namespaces labeled with their organization and project slugs.

use crate::error::CoreError;
use crate::kind::ResourceKind;
use crate::labels::{CREATED_BY_ANNOTATION, KIND_LABEL, KIND_PROJECT, ORGANIZATION_LABEL, PROJECT_LABEL};
use crate::object::Object;

/// Prefix of the namespace backing a project.
pub const NAMESPACE_PREFIX: &str = "proj-";

/// Name of the namespace backing the project `slug`.
pub fn namespace_name(slug: &str) -> String {
    format!("{NAMESPACE_PREFIX}{slug}")
}

/// Typed view over a project namespace.
///
/// Accessors return `None` for missing metadata; admission is what guarantees
/// the labels are present on persisted projects.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectNamespace {
    namespace: Object,
}

impl ProjectNamespace {
    /// Builds a fully labeled, not yet persisted project namespace.
    pub fn new(organization: &str, project: &str, created_by: &str) -> Self {
        let namespace = Object::new(ResourceKind::Namespace, namespace_name(project))
            .with_labels([
                (KIND_LABEL, KIND_PROJECT),
                (ORGANIZATION_LABEL, organization),
                (PROJECT_LABEL, project),
            ])
            .with_annotations([(CREATED_BY_ANNOTATION, created_by)]);
        Self { namespace }
    }

    /// Wraps a namespace, checking it is labeled as a project.
    pub fn from_object(namespace: Object) -> Result<Self, CoreError> {
        if namespace.kind != ResourceKind::Namespace || !Self::is_project(&namespace) {
            return Err(CoreError::invalid_object(
                namespace.name(),
                "not a project namespace",
            ));
        }
        Ok(Self { namespace })
    }

    pub fn is_project(namespace: &Object) -> bool {
        namespace.label(KIND_LABEL) == Some(KIND_PROJECT)
    }

    /// Name of the namespace, which is also where derived objects live.
    pub fn name(&self) -> &str {
        self.namespace.name()
    }

    pub fn organization(&self) -> Option<&str> {
        self.namespace.label(ORGANIZATION_LABEL)
    }

    pub fn project(&self) -> Option<&str> {
        self.namespace.label(PROJECT_LABEL)
    }

    pub fn created_by(&self) -> Option<&str> {
        self.namespace.annotation(CREATED_BY_ANNOTATION)
    }

    pub fn is_active(&self) -> bool {
        self.namespace.is_active()
    }

    pub fn as_object(&self) -> &Object {
        &self.namespace
    }

    pub fn into_object(self) -> Object {
        self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_is_fully_labeled() {
        let project = ProjectNamespace::new("acme", "web", "user#1");
        assert_eq!(project.name(), "proj-web");
        assert_eq!(project.organization(), Some("acme"));
        assert_eq!(project.project(), Some("web"));
        assert_eq!(project.created_by(), Some("user#1"));
        assert!(ProjectNamespace::is_project(project.as_object()));
    }

    #[test]
    fn test_from_object_requires_project_kind() {
        let ns = Object::new(ResourceKind::Namespace, "default");
        assert!(ProjectNamespace::from_object(ns).is_err());

        let bare = Object::new(ResourceKind::Namespace, "proj-x").with_labels([(KIND_LABEL, KIND_PROJECT)]);
        let project = ProjectNamespace::from_object(bare).unwrap();
        assert_eq!(project.organization(), None);
        assert_eq!(project.project(), None);
    }
}
