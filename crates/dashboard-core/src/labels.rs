//! Label and annotation keys shared by the controllers and the API facade.

// ============================================================================
// Dashboard labels
// ============================================================================

/// Discriminates organization and project namespaces
pub const KIND_LABEL: &str = "presslabs.com/kind";

/// Slug of the organization a namespace belongs to
pub const ORGANIZATION_LABEL: &str = "presslabs.com/organization";

/// Slug of the project a namespace or derived object belongs to
pub const PROJECT_LABEL: &str = "presslabs.com/project";

/// Value of [`KIND_LABEL`] on organization namespaces
pub const KIND_ORGANIZATION: &str = "organization";

/// Value of [`KIND_LABEL`] on project namespaces
pub const KIND_PROJECT: &str = "project";

// ============================================================================
// Dashboard annotations
// ============================================================================

/// Opaque subject of the caller that created the object
pub const CREATED_BY_ANNOTATION: &str = "presslabs.com/created-by";

/// Human readable organization name
pub const DISPLAY_NAME_ANNOTATION: &str = "presslabs.com/display-name";

// ============================================================================
// Kubernetes standard labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// The tool managing the object
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Application name (e.g. "gitea")
pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Component within the application (e.g. "web")
pub const COMPONENT_LABEL: &str = "app.kubernetes.io/component";

/// Application version
pub const VERSION_LABEL: &str = "app.kubernetes.io/version";
