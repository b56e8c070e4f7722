use thiserror::Error;

/// Core error types for dashboard object handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid resource kind: {0}")]
    InvalidKind(String),

    #[error("Invalid name \"{name}\": {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid object {name}: {message}")]
    InvalidObject { name: String, message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidKind error
    pub fn invalid_kind(kind: impl Into<String>) -> Self {
        Self::InvalidKind(kind.into())
    }

    /// Create a new InvalidName error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidObject error
    pub fn invalid_object(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidObject {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check if this error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKind(_) | Self::InvalidName { .. } | Self::InvalidObject { .. }
        )
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
