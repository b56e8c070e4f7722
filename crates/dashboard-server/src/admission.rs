//! Admission validation for project namespaces.

use dashboard_core::labels::{CREATED_BY_ANNOTATION, ORGANIZATION_LABEL, PROJECT_LABEL};
use dashboard_core::{Object, ProjectNamespace, ResourceKind};
use dashboard_storage::{AdmissionError, AdmissionHook, AdmissionResponse};

pub const REASON_NOT_A_PROJECT: &str = "not a project, skipping validation";
pub const REASON_ALLOWED: &str = "allowed to be admitted";
pub const REASON_INVALID: &str = "validation failed";

/// Rejects project namespaces missing their ownership metadata.
///
/// Every missing item is reported, not just the first.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectNamespaceValidator;

impl ProjectNamespaceValidator {
    pub fn new() -> Self {
        Self
    }
}

impl AdmissionHook for ProjectNamespaceValidator {
    fn name(&self) -> &str {
        "namespace.validating.dashboard.presslabs.com"
    }

    fn applies_to(&self, kind: ResourceKind) -> bool {
        kind == ResourceKind::Namespace
    }

    fn validate(&self, obj: &Object) -> AdmissionResponse {
        if !ProjectNamespace::is_project(obj) {
            return AdmissionResponse::allow(REASON_NOT_A_PROJECT);
        }

        let mut error = AdmissionError::new();
        for label in [ORGANIZATION_LABEL, PROJECT_LABEL] {
            if obj.label(label).is_none() {
                error.push(format!("required label \"{label}\" is missing"));
            }
        }
        if obj.annotation(CREATED_BY_ANNOTATION).is_none() {
            error.push(format!(
                "required annotation \"{CREATED_BY_ANNOTATION}\" is missing"
            ));
        }

        if error.is_empty() {
            AdmissionResponse::allow(REASON_ALLOWED)
        } else {
            AdmissionResponse::deny(REASON_INVALID, error)
        }
    }
}
