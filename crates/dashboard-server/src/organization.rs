//! Organization lifecycle: synchronous CRUD over organization namespaces.
//!
//! Terminating organizations still exist in the store until cleanup finishes,
//! but every public operation treats them as not found.

use dashboard_core::labels::{KIND_LABEL, KIND_ORGANIZATION};
use dashboard_core::organization::{fully_qualified_name, namespace_name, parse_name};
use dashboard_core::{CoreError, Organization, ResourceKind, slugify, validate_slug};
use dashboard_storage::{DynStore, LabelSelector, ListParams, ObjectStore, StoreError};
use thiserror::Error;
use tracing::{debug, info};

/// Attempts made by [`OrganizationService::update`] when the write races
/// another writer.
const MAX_UPDATE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum OrganizationError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("organization {0} already exists")]
    AlreadyExists(String),

    #[error("organization {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrganizationError {
    fn invalid(err: CoreError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

#[derive(Clone)]
pub struct OrganizationService {
    store: DynStore,
}

impl OrganizationService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Creates an organization owned by `subject`.
    ///
    /// The slug comes from `requested_name` (`orgs/<slug>`) when given,
    /// otherwise from `display_name`.
    pub async fn create(
        &self,
        display_name: &str,
        requested_name: &str,
        subject: &str,
    ) -> Result<Organization, OrganizationError> {
        let slug = if requested_name.is_empty() {
            if display_name.is_empty() {
                return Err(OrganizationError::InvalidArgument(
                    "either a display name or a name is required".into(),
                ));
            }
            let slug = slugify(display_name);
            validate_slug(&slug).map_err(|_| {
                OrganizationError::InvalidArgument(format!(
                    "cannot derive an organization name from display name \"{display_name}\""
                ))
            })?;
            slug
        } else {
            parse_name(requested_name)
                .map_err(OrganizationError::invalid)?
                .to_string()
        };

        let org = Organization::new(&slug, display_name, subject);
        let stored = self.store.create(org.as_object()).await.map_err(|e| {
            if e.is_already_exists() {
                OrganizationError::AlreadyExists(org.name())
            } else {
                e.into()
            }
        })?;

        let org = Organization::from_object(stored).map_err(OrganizationError::invalid)?;
        info!(
            organization = %org.name(),
            display_name = %org.display_name(),
            subject,
            "Organization created"
        );
        Ok(org)
    }

    pub async fn get(&self, name: &str) -> Result<Organization, OrganizationError> {
        let slug = parse_name(name).map_err(OrganizationError::invalid)?;
        self.find_active(slug).await
    }

    /// Sets the display name; an empty value restores the default (the slug).
    pub async fn update(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<Organization, OrganizationError> {
        let slug = parse_name(name).map_err(OrganizationError::invalid)?;

        let mut attempt = 1;
        loop {
            let mut org = self.find_active(slug).await?;
            org.set_display_name(display_name);
            match self.store.update(org.as_object()).await {
                Ok(stored) => {
                    let org = Organization::from_object(stored).map_err(OrganizationError::invalid)?;
                    info!(
                        organization = %org.name(),
                        display_name = %org.display_name(),
                        "Organization updated"
                    );
                    return Ok(org);
                }
                Err(e) if e.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => {
                    debug!(organization = %name, attempt, error = %e, "Update conflicted, retrying");
                    attempt += 1;
                }
                Err(e) if e.is_not_found() => {
                    return Err(OrganizationError::NotFound(name.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Requests deletion. The organization turns Terminating and disappears
    /// from the public surface immediately.
    pub async fn delete(&self, name: &str) -> Result<(), OrganizationError> {
        let slug = parse_name(name).map_err(OrganizationError::invalid)?;
        let org = self.find_active(slug).await?;
        self.store
            .delete(ResourceKind::Namespace, None, org.as_object().name())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    OrganizationError::NotFound(name.to_string())
                } else {
                    e.into()
                }
            })?;
        info!(organization = %name, "Organization deleted");
        Ok(())
    }

    /// Active organizations created by `subject`. Ordering is unspecified.
    pub async fn list(&self, subject: &str) -> Result<Vec<Organization>, OrganizationError> {
        let params =
            ListParams::new().labels(LabelSelector::new().equals(KIND_LABEL, KIND_ORGANIZATION));
        let list = self
            .store
            .list(ResourceKind::Namespace, None, &params)
            .await?;

        let orgs = list
            .items
            .into_iter()
            .filter_map(|obj| Organization::from_object(obj).ok())
            .filter(|org| org.is_active() && org.created_by() == Some(subject))
            .collect();
        Ok(orgs)
    }

    async fn find_active(&self, slug: &str) -> Result<Organization, OrganizationError> {
        let not_found = || OrganizationError::NotFound(fully_qualified_name(slug));
        let obj = self
            .store
            .get(ResourceKind::Namespace, None, &namespace_name(slug))
            .await?
            .ok_or_else(not_found)?;

        let org = Organization::from_object(obj).map_err(|_| not_found())?;
        if !org.is_active() {
            debug!(organization = %org.name(), "Organization is terminating");
            return Err(not_found());
        }
        Ok(org)
    }
}
