//! Organizations are namespaces named `org-<slug>` labeled as organizations.
//!
//! Callers address them by their fully qualified name `orgs/<slug>`.

use crate::error::CoreError;
use crate::kind::ResourceKind;
use crate::labels::{
    CREATED_BY_ANNOTATION, DISPLAY_NAME_ANNOTATION, KIND_LABEL, KIND_ORGANIZATION,
    ORGANIZATION_LABEL,
};
use crate::object::Object;
use crate::slug::validate_slug;

/// Prefix of the public organization identity.
pub const NAME_PREFIX: &str = "orgs/";

/// Prefix of the namespace backing an organization.
pub const NAMESPACE_PREFIX: &str = "org-";

/// Name of the namespace backing the organization `slug`.
pub fn namespace_name(slug: &str) -> String {
    format!("{NAMESPACE_PREFIX}{slug}")
}

/// Public identity of the organization `slug`.
pub fn fully_qualified_name(slug: &str) -> String {
    format!("{NAME_PREFIX}{slug}")
}

/// Extracts and validates the slug from an `orgs/<slug>` name.
pub fn parse_name(name: &str) -> Result<&str, CoreError> {
    let slug = name
        .strip_prefix(NAME_PREFIX)
        .ok_or_else(|| CoreError::invalid_name(name, format!("must be of the form {NAME_PREFIX}<name>")))?;
    validate_slug(slug).map_err(|_| {
        CoreError::invalid_name(name, "organization name must be a non-empty lowercase slug")
    })?;
    Ok(slug)
}

/// Typed view over an organization namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    namespace: Object,
}

impl Organization {
    /// Builds a new, not yet persisted organization namespace.
    pub fn new(slug: &str, display_name: &str, created_by: &str) -> Self {
        let namespace = Object::new(ResourceKind::Namespace, namespace_name(slug))
            .with_labels([(KIND_LABEL, KIND_ORGANIZATION), (ORGANIZATION_LABEL, slug)])
            .with_annotations([(CREATED_BY_ANNOTATION, created_by)]);
        let mut org = Self { namespace };
        org.set_display_name(display_name);
        org
    }

    /// Wraps a namespace, checking it is labeled as an organization.
    pub fn from_object(namespace: Object) -> Result<Self, CoreError> {
        if namespace.kind != ResourceKind::Namespace {
            return Err(CoreError::invalid_object(
                namespace.name(),
                format!("expected a Namespace, got {}", namespace.kind),
            ));
        }
        if !Self::is_organization(&namespace) {
            return Err(CoreError::invalid_object(
                namespace.name(),
                "namespace is not labeled as an organization",
            ));
        }
        if namespace.label(ORGANIZATION_LABEL).is_none() {
            return Err(CoreError::invalid_object(
                namespace.name(),
                format!("missing label {ORGANIZATION_LABEL}"),
            ));
        }
        Ok(Self { namespace })
    }

    pub fn is_organization(namespace: &Object) -> bool {
        namespace.label(KIND_LABEL) == Some(KIND_ORGANIZATION)
    }

    pub fn slug(&self) -> &str {
        self.namespace.label(ORGANIZATION_LABEL).unwrap_or_default()
    }

    /// The public `orgs/<slug>` identity.
    pub fn name(&self) -> String {
        fully_qualified_name(self.slug())
    }

    /// Display name, falling back to the slug when unset.
    pub fn display_name(&self) -> &str {
        self.namespace
            .annotation(DISPLAY_NAME_ANNOTATION)
            .unwrap_or_else(|| self.slug())
    }

    /// Sets the display name; an empty value restores the slug.
    pub fn set_display_name(&mut self, display_name: &str) {
        let value = if display_name.is_empty() {
            self.slug().to_string()
        } else {
            display_name.to_string()
        };
        self.namespace.set_annotation(DISPLAY_NAME_ANNOTATION, value);
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
