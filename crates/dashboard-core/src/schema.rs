//! Custom object type registrations.
//!
//! A [`SchemaDescriptor`] is persisted as a `CustomResourceDefinition` object
//! whose body carries the descriptor and whose status carries the
//! `Established` condition once the store accepts objects of that type.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::kind::ResourceKind;
use crate::object::Object;

/// Condition reported by the store once a schema is served.
pub const ESTABLISHED_CONDITION: &str = "Established";

/// Group of the dashboard's own custom types.
pub const DASHBOARD_GROUP: &str = "dashboard.presslabs.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemaScope {
    #[default]
    Namespaced,
    Cluster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub singular: String,
    #[serde(default)]
    pub short_names: Vec<String>,
    #[serde(default)]
    pub scope: SchemaScope,
    #[serde(default)]
    pub validation: bool,
    #[serde(default)]
    pub status_subresource: bool,
}

impl SchemaDescriptor {
    /// The `Project` type served under the dashboard group.
    pub fn project() -> Self {
        Self {
            group: DASHBOARD_GROUP.to_string(),
            version: "v1alpha1".to_string(),
            kind: "Project".to_string(),
            plural: "projects".to_string(),
            singular: "project".to_string(),
            short_names: vec!["proj".to_string()],
            scope: SchemaScope::Namespaced,
            validation: true,
            status_subresource: true,
        }
    }

    /// Store name of the registration: `<plural>.<group>`.
    pub fn resource_name(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }

    /// Whether `other` may replace `self` in place.
    ///
    /// Identity fields must match; names, validation and subresources may differ.
    pub fn is_compatible_with(&self, other: &SchemaDescriptor) -> bool {
        self.group == other.group
            && self.version == other.version
            && self.kind == other.kind
            && self.plural == other.plural
            && self.scope == other.scope
    }

    pub fn to_object(&self) -> Result<Object, CoreError> {
        let spec = serde_json::to_value(self)?;
        Ok(Object::new(ResourceKind::CustomResourceDefinition, self.resource_name()).with_spec(spec))
    }

    pub fn from_object(obj: &Object) -> Result<Self, CoreError> {
        if obj.kind != ResourceKind::CustomResourceDefinition {
            return Err(CoreError::invalid_object(
                obj.name(),
                format!("expected a CustomResourceDefinition, got {}", obj.kind),
            ));
        }
        Ok(serde_json::from_value(obj.spec.clone())?)
    }

    /// Whether the stored registration reports the `Established` condition.
    pub fn is_established(obj: &Object) -> bool {
        obj.condition(ESTABLISHED_CONDITION)
            .is_some_and(|c| c.status)
    }
}
