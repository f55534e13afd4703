//! Organization API handlers.
//!
//! # Purpose
//! Organization CRUD and watch, gated on the caller's membership.
use crate::api::error::ApiError;
use crate::api::identity::caller_identity;
use crate::api::tenants::{self, TenantResource};
use crate::api::types::{ListResponse, WatchParams};
use crate::api::watch::watch_visible;
use crate::app::AppState;
use crate::model::{Kind, ObjectKey, Organization};
use crate::namespaces::{NamespaceNameError, organization_namespace_name};
use crate::store::WatchFilter;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

impl TenantResource for Organization {
    const RESOURCE: &'static str = "organizations";

    fn backing_namespace(_: Option<&str>, name: &str) -> Result<String, NamespaceNameError> {
        organization_namespace_name(name)
    }
}

fn key(name: String) -> ObjectKey {
    ObjectKey::cluster(Kind::Organization, name)
}

pub(crate) async fn list_organizations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse<Organization>>, ApiError> {
    let caller = caller_identity(&headers);
    Ok(Json(tenants::list(&state, caller.as_ref(), None).await?))
}

pub(crate) async fn create_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Organization>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_identity(&headers);
    let created = tenants::create(&state, caller.as_ref(), None, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn get_organization(
    Path(name): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Organization>, ApiError> {
    let caller = caller_identity(&headers);
    Ok(Json(tenants::get(&state, caller.as_ref(), &key(name)).await?))
}

pub(crate) async fn update_organization(
    Path(name): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Organization>,
) -> Result<Json<Organization>, ApiError> {
    let caller = caller_identity(&headers);
    Ok(Json(
        tenants::update(&state, caller.as_ref(), &key(name), body).await?,
    ))
}

pub(crate) async fn delete_organization(
    Path(name): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = caller_identity(&headers);
    tenants::delete::<Organization>(&state, caller.as_ref(), &key(name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn watch_organizations(
    Query(params): Query<WatchParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    watch_visible::<Organization>(
        &state,
        caller_identity(&headers),
        WatchFilter::kind(Kind::Organization),
        params.resource_version,
    )
    .await
}
