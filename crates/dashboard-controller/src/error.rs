use std::time::Duration;

use dashboard_core::ResourceKind;
use dashboard_storage::StoreError;
use thiserror::Error;

/// Startup failures of the reconciliation engine.
///
/// All of them mean the engine refused to dispatch any work.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Schema {name} conflicts with the installed one: {reason}")]
    SchemaConflict { name: String, reason: String },

    #[error("Schemas not established within {timeout:?}: {}", .pending.join(", "))]
    SchemaTimeout {
        pending: Vec<String>,
        timeout: Duration,
    },

    #[error("Cache not synced within {timeout:?} for kinds {kinds:?}")]
    CacheSyncTimeout {
        kinds: Vec<ResourceKind>,
        timeout: Duration,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ControllerError {
    pub fn schema_conflict(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaConflict {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is one of the timeouts guarding startup.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::SchemaTimeout { .. } | Self::CacheSyncTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_timeout_lists_pending() {
        let err = ControllerError::SchemaTimeout {
            pending: vec!["projects.dashboard.presslabs.com".into(), "sites.example.com".into()],
            timeout: Duration::from_secs(1),
        };
        assert_eq!(
            err.to_string(),
            "Schemas not established within 1s: projects.dashboard.presslabs.com, sites.example.com"
        );
        assert!(err.is_timeout());
        assert!(!ControllerError::schema_conflict("x", "y").is_timeout());
    }
}
