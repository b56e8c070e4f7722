//! HTTP/JSON facade over the organization lifecycle.
//!
//! `POST /v1/orgs`, `GET /v1/orgs`, `GET|PATCH|DELETE /v1/orgs/{slug}`. The
//! caller's subject is read from a configurable header.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{HeaderName, StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use dashboard_core::Organization;
use dashboard_core::organization::fully_qualified_name;

use crate::organization::{OrganizationError, OrganizationService};
use crate::rpc;

#[derive(Clone)]
pub struct ApiState {
    pub organizations: OrganizationService,
    pub subject_header: HeaderName,
}

impl ApiState {
    pub fn new(organizations: OrganizationService, subject_header: &str) -> Result<Self, String> {
        let subject_header = HeaderName::try_from(subject_header)
            .map_err(|e| format!("invalid subject header \"{subject_header}\": {e}"))?;
        Ok(Self {
            organizations,
            subject_header,
        })
    }
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/orgs", get(list_organizations).post(create_organization))
        .route(
            "/v1/orgs/{slug}",
            get(get_organization)
                .patch(update_organization)
                .delete(delete_organization),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Opaque identity of the caller.
#[derive(Debug, Clone)]
pub struct Subject(pub String);

impl FromRequestParts<ApiState> for Subject {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(&state.subject_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Subject(value.to_string()))
            .ok_or(ApiError::Unauthenticated)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationView {
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl From<&Organization> for OrganizationView {
    fn from(org: &Organization) -> Self {
        Self {
            name: org.name(),
            display_name: org.display_name().to_string(),
            created_by: org.created_by().map(str::to_string),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[serde(default)]
    pub display_name: String,
    /// Fully qualified `orgs/<slug>`; derived from the display name when empty.
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListOrganizationsResponse {
    pub organizations: Vec<OrganizationView>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    Organization(OrganizationError),
}

impl From<OrganizationError> for ApiError {
    fn from(err: OrganizationError) -> Self {
        Self::Organization(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "caller subject is missing".to_string(),
            ),
            Self::Organization(err) => {
                let code = rpc::StatusCode::from(err);
                if code == rpc::StatusCode::Internal {
                    tracing::error!(error = %err, "Organization request failed");
                }
                (code.http_status(), code.as_str(), err.to_string())
            }
        };
        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_organization(
    State(state): State<ApiState>,
    Subject(subject): Subject,
    Json(body): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationView>), ApiError> {
    let org = state
        .organizations
        .create(&body.display_name, &body.name, &subject)
        .await?;
    Ok((StatusCode::CREATED, Json(OrganizationView::from(&org))))
}

async fn list_organizations(
    State(state): State<ApiState>,
    Subject(subject): Subject,
) -> Result<Json<ListOrganizationsResponse>, ApiError> {
    let organizations = state
        .organizations
        .list(&subject)
        .await?
        .iter()
        .map(OrganizationView::from)
        .collect();
    Ok(Json(ListOrganizationsResponse { organizations }))
}

async fn get_organization(
    State(state): State<ApiState>,
    _subject: Subject,
    Path(slug): Path<String>,
) -> Result<Json<OrganizationView>, ApiError> {
    let org = state.organizations.get(&fully_qualified_name(&slug)).await?;
    Ok(Json(OrganizationView::from(&org)))
}

async fn update_organization(
    State(state): State<ApiState>,
    _subject: Subject,
    Path(slug): Path<String>,
    Json(body): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationView>, ApiError> {
    let org = state
        .organizations
        .update(&fully_qualified_name(&slug), &body.display_name)
        .await?;
    Ok(Json(OrganizationView::from(&org)))
}

async fn delete_organization(
    State(state): State<ApiState>,
    _subject: Subject,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .organizations
        .delete(&fully_qualified_name(&slug))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
