//! Schema gate: register custom types and wait until the store serves them.

use std::time::Duration;

use dashboard_core::{Object, ObjectKey, ResourceKind, SchemaDescriptor};
use dashboard_storage::{ObjectStore, StoreError};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ControllerError;

/// Idempotently registers every descriptor.
///
/// Missing schemas are created, matching ones are left alone, compatible
/// ones are updated in place and incompatible ones fail the whole call.
pub async fn install_schemas(
    store: &dyn ObjectStore,
    descriptors: &[SchemaDescriptor],
) -> Result<(), ControllerError> {
    for desc in descriptors {
        install_one(store, desc).await?;
    }
    Ok(())
}

async fn install_one(store: &dyn ObjectStore, desc: &SchemaDescriptor) -> Result<(), ControllerError> {
    let name = desc.resource_name();
    let desired = desc
        .to_object()
        .map_err(|e| ControllerError::schema_conflict(&name, e.to_string()))?;

    let existing = match fetch(store, &name).await? {
        Some(existing) => existing,
        None => match store.create(&desired).await {
            Ok(_) => {
                info!(schema = %name, "Installed schema");
                return Ok(());
            }
            // Someone else registered it first; compare against theirs.
            Err(e) if e.is_already_exists() => fetch(store, &name).await?.ok_or_else(|| {
                StoreError::not_found(ObjectKey::cluster(ResourceKind::CustomResourceDefinition, &name))
            })?,
            Err(e) => return Err(e.into()),
        },
    };

    let current = SchemaDescriptor::from_object(&existing)
        .map_err(|e| ControllerError::schema_conflict(&name, e.to_string()))?;
    if current == *desc {
        debug!(schema = %name, "Schema already installed");
        return Ok(());
    }
    if !current.is_compatible_with(desc) {
        return Err(ControllerError::schema_conflict(
            &name,
            format!(
                "installed {}/{} {} ({:?}) cannot become {}/{} {} ({:?})",
                current.group,
                current.version,
                current.kind,
                current.scope,
                desc.group,
                desc.version,
                desc.kind,
                desc.scope
            ),
        ));
    }

    let mut updated = desired;
    updated.metadata = existing.metadata.clone();
    updated.status = existing.status.clone();
    store.update(&updated).await?;
    info!(schema = %name, "Updated schema in place");
    Ok(())
}

async fn fetch(store: &dyn ObjectStore, name: &str) -> Result<Option<Object>, StoreError> {
    store
        .get(ResourceKind::CustomResourceDefinition, None, name)
        .await
}

/// Polls until every descriptor reports `Established`.
///
/// Transient store errors count as "not yet"; anything else aborts.
pub async fn wait_until_established(
    store: &dyn ObjectStore,
    descriptors: &[SchemaDescriptor],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), ControllerError> {
    let deadline = Instant::now() + timeout;

    loop {
        let mut pending = Vec::new();
        for desc in descriptors {
            let name = desc.resource_name();
            match fetch(store, &name).await {
                Ok(Some(obj)) if SchemaDescriptor::is_established(&obj) => {}
                Ok(_) => pending.push(name),
                Err(e) if e.is_retryable() => {
                    debug!(schema = %name, error = %e, "Schema status not readable yet");
                    pending.push(name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if pending.is_empty() {
            info!(count = descriptors.len(), "All schemas established");
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ControllerError::SchemaTimeout { pending, timeout });
        }
        debug!(pending = ?pending, "Waiting for schemas to be established");
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
