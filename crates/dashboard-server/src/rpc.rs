//! Status codes surfaced by the organization facade.

use std::fmt;

use crate::organization::OrganizationError;

/// Canonical RPC status codes the facade distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    InvalidArgument,
    AlreadyExists,
    NotFound,
    Internal,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::Internal => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> axum::http::StatusCode {
        match self {
            StatusCode::InvalidArgument => axum::http::StatusCode::BAD_REQUEST,
            StatusCode::AlreadyExists => axum::http::StatusCode::CONFLICT,
            StatusCode::NotFound => axum::http::StatusCode::NOT_FOUND,
            StatusCode::Internal => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&OrganizationError> for StatusCode {
    fn from(err: &OrganizationError) -> Self {
        match err {
            OrganizationError::InvalidArgument(_) => StatusCode::InvalidArgument,
            OrganizationError::AlreadyExists(_) => StatusCode::AlreadyExists,
            OrganizationError::NotFound(_) => StatusCode::NotFound,
            OrganizationError::Store(_) => StatusCode::Internal,
        }
    }
}
