//! Store error types for the object store contract.

use std::fmt;

use dashboard_core::ObjectKey;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("Object not found: {key}")]
    NotFound {
        /// Identity of the missing object.
        key: ObjectKey,
    },

    /// Attempted to create an object that already exists.
    #[error("Object already exists: {key}")]
    AlreadyExists {
        /// Identity of the existing object.
        key: ObjectKey,
    },

    /// Optimistic concurrency collision on update.
    #[error("Conflict on {key}: expected version {expected}, found {actual}")]
    Conflict {
        key: ObjectKey,
        expected: String,
        actual: String,
    },

    /// The object is malformed or cannot be stored where it was addressed.
    #[error("Invalid object: {message}")]
    Invalid {
        /// Description of why the object is invalid.
        message: String,
    },

    /// An admission hook refused the write.
    #[error("Admission denied by {hook} ({reason}): {message}")]
    Rejected {
        /// Name of the rejecting hook.
        hook: String,
        /// Short decision reason.
        reason: String,
        /// Every violated rule, joined.
        message: String,
    },

    /// A watch resume version is older than the retained history.
    #[error("Resource version {version} is too old, relist required")]
    Expired {
        /// The version the caller tried to resume from.
        version: String,
    },

    /// The request did not complete within its deadline.
    #[error("Store request {operation} timed out after {millis}ms")]
    Timeout {
        /// Name of the timed out operation.
        operation: &'static str,
        /// The deadline that elapsed.
        millis: u64,
    },

    /// Failed to reach the store backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(key: ObjectKey) -> Self {
        Self::NotFound { key }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(key: ObjectKey) -> Self {
        Self::AlreadyExists { key }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(key: ObjectKey, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Conflict {
            key,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a new `Rejected` error.
    #[must_use]
    pub fn rejected(
        hook: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            hook: hook.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Expired` error.
    #[must_use]
    pub fn expired(version: impl Into<String>) -> Self {
        Self::Expired {
            version: version.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: &'static str, millis: u64) -> Self {
        Self::Timeout { operation, millis }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    /// Returns `true` when repeating the operation may succeed.
    ///
    /// Validation failures and admission denials are permanent until the
    /// object itself changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Invalid { .. } | Self::Rejected { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } | Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Invalid { .. } | Self::Rejected { .. } => ErrorCategory::Validation,
            Self::Expired { .. } => ErrorCategory::Watch,
            Self::Timeout { .. } | Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of store errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Watch,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Watch => write!(f, "watch"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
