use async_trait::async_trait;
use dashboard_controller::{Cache, Context, ErrorPolicy, Reconciler, Request};
use dashboard_core::labels::{KIND_LABEL, KIND_ORGANIZATION, KIND_PROJECT, ORGANIZATION_LABEL};
use dashboard_core::{CoreError, Object, ProjectNamespace, ResourceKind};
use dashboard_storage::{LabelSelector, ObjectStore, StoreError};
use thiserror::Error;
use tracing::{debug, info};

use super::desired::desired_objects;

#[derive(Debug, Error)]
pub enum ProjectError {
    /// The owning organization is not (yet) in the cache.
    #[error("Organization {organization} of project {project} not found")]
    DependencyMissing { project: String, organization: String },

    #[error("Invalid project {project}: {reason}")]
    InvalidProject { project: String, reason: String },

    #[error("Invalid derived object: {0}")]
    InvalidDesired(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Materializes the derived resource catalog into every active project namespace.
pub struct ProjectReconciler {
    controller_name: String,
}

impl ProjectReconciler {
    pub fn new(controller_name: impl Into<String>) -> Self {
        Self {
            controller_name: controller_name.into(),
        }
    }

    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    /// Creates `desired` if absent, or rewrites its labels if they drifted.
    ///
    /// Returns whether a write happened.
    async fn apply(&self, ctx: &Context, desired: Object) -> Result<bool, ProjectError> {
        let kind = desired.kind;
        let namespace = desired.namespace().map(str::to_string);
        let name = desired.name().to_string();

        let live = match ctx.store.get(kind, namespace.as_deref(), &name).await? {
            Some(live) => live,
            None => match ctx.store.create(&desired).await {
                Ok(_) => {
                    debug!(%kind, namespace = ?namespace, %name, "Created derived object");
                    return Ok(true);
                }
                // Created by someone else since the read; compare against theirs.
                Err(e) if e.is_already_exists() => ctx
                    .store
                    .get(kind, namespace.as_deref(), &name)
                    .await?
                    .ok_or(e)?,
                Err(e) => return Err(e.into()),
            },
        };

        if live.metadata.labels == desired.metadata.labels {
            return Ok(false);
        }
        let mut updated = live;
        updated.metadata.labels = desired.metadata.labels;
        ctx.store.update(&updated).await?;
        debug!(%kind, namespace = ?namespace, %name, "Updated derived object labels");
        Ok(true)
    }
}

#[async_trait]
impl Reconciler for ProjectReconciler {
    type Error = ProjectError;

    fn name(&self) -> &str {
        &self.controller_name
    }

    async fn reconcile(&self, request: &Request, ctx: &Context) -> Result<(), ProjectError> {
        let Some(obj) = ctx.cache.get(ResourceKind::Namespace, None, &request.name) else {
            debug!(%request, "Project not found, assuming deleted");
            return Ok(());
        };
        if !ProjectNamespace::is_project(&obj) {
            return Ok(());
        }
        if obj.is_terminating() {
            debug!(%request, "Project is terminating, skipping");
            return Ok(());
        }

        let project = ProjectNamespace::from_object(Object::clone(&obj)).map_err(|e| {
            ProjectError::InvalidProject {
                project: request.name.clone(),
                reason: e.to_string(),
            }
        })?;
        let organization = project
            .organization()
            .ok_or_else(|| ProjectError::InvalidProject {
                project: project.name().to_string(),
                reason: format!("missing label {ORGANIZATION_LABEL}"),
            })?;

        let selector = LabelSelector::new()
            .equals(KIND_LABEL, KIND_ORGANIZATION)
            .equals(ORGANIZATION_LABEL, organization);
        if ctx.cache.list(ResourceKind::Namespace, &selector).is_empty() {
            return Err(ProjectError::DependencyMissing {
                project: project.name().to_string(),
                organization: organization.to_string(),
            });
        }

        let mut writes = 0usize;
        for (_, desired) in desired_objects(&project, organization, &self.controller_name)? {
            if self.apply(ctx, desired).await? {
                writes += 1;
            }
        }

        if writes > 0 {
            info!(project = %project.name(), %organization, writes, "Project reconciled");
        } else {
            debug!(project = %project.name(), "Project up to date");
        }
        Ok(())
    }

    fn error_policy(&self, error: &ProjectError) -> ErrorPolicy {
        match error {
            ProjectError::DependencyMissing { .. } => ErrorPolicy::Requeue,
            ProjectError::InvalidProject { .. } | ProjectError::InvalidDesired(_) => {
                ErrorPolicy::Drop
            }
            ProjectError::Store(e) if e.is_retryable() => ErrorPolicy::Requeue,
            ProjectError::Store(_) => ErrorPolicy::Drop,
        }
    }
}

/// Requests affected by a namespace change.
///
/// A project maps to itself; an organization maps to every cached project
/// that belongs to it.
pub fn namespace_requests(obj: &Object, cache: &Cache) -> Vec<Request> {
    if ProjectNamespace::is_project(obj) {
        return vec![Request::from_object(obj)];
    }
    if obj.label(KIND_LABEL) != Some(KIND_ORGANIZATION) {
        return Vec::new();
    }
    let Some(organization) = obj.label(ORGANIZATION_LABEL) else {
        return Vec::new();
    };
    let selector = LabelSelector::new()
        .equals(KIND_LABEL, KIND_PROJECT)
        .equals(ORGANIZATION_LABEL, organization);
    cache
        .list(ResourceKind::Namespace, &selector)
        .iter()
        .map(|project| Request::from_object(project))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_core::Organization;

    #[test]
    fn test_error_policy() {
        let reconciler = ProjectReconciler::new("test");
        let missing = ProjectError::DependencyMissing {
            project: "proj-web".into(),
            organization: "acme".into(),
        };
        assert_eq!(reconciler.error_policy(&missing), ErrorPolicy::Requeue);

        let invalid = ProjectError::InvalidProject {
            project: "proj-web".into(),
            reason: "missing label".into(),
        };
        assert_eq!(reconciler.error_policy(&invalid), ErrorPolicy::Drop);

        let conflict: ProjectError = StoreError::conflict(
            dashboard_core::ObjectKey::cluster(ResourceKind::Namespace, "proj-web"),
            "1",
            "2",
        )
        .into();
        assert_eq!(reconciler.error_policy(&conflict), ErrorPolicy::Requeue);

        let rejected: ProjectError = StoreError::rejected("hook", "validation failed", "bad").into();
        assert_eq!(reconciler.error_policy(&rejected), ErrorPolicy::Drop);
    }

    #[test]
    fn test_namespace_requests() {
        let project = ProjectNamespace::new("acme", "web", "user:1").into_object();
        let org = Organization::new("acme", "ACME", "user:1").into_object();
        let cache = Cache::new();

        assert_eq!(
            namespace_requests(&project, &cache),
            vec![Request::cluster("proj-web")]
        );
        // Nothing cached yet.
        assert!(namespace_requests(&org, &cache).is_empty());

        let plain = Object::new(ResourceKind::Namespace, "default");
        assert!(namespace_requests(&plain, &cache).is_empty());
    }
}
