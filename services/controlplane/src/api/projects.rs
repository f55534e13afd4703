//! Project API handlers.
//!
//! # Purpose
//! Project CRUD and watch within an organization namespace, gated on the
//! caller's membership of each project.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::identity::caller_identity;
use crate::api::tenants::{self, TenantResource};
use crate::api::types::{ListResponse, WatchParams};
use crate::api::watch::watch_visible;
use crate::app::AppState;
use crate::model::{Kind, ObjectKey, Project};
use crate::namespaces::{NamespaceNameError, project_namespace_name};
use crate::store::WatchFilter;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

impl TenantResource for Project {
    const RESOURCE: &'static str = "projects";

    fn backing_namespace(
        namespace: Option<&str>,
        name: &str,
    ) -> Result<String, NamespaceNameError> {
        project_namespace_name(namespace.unwrap_or_default(), name)
    }
}

fn key(namespace: String, name: String) -> ObjectKey {
    ObjectKey::namespaced(Kind::Project, namespace, name)
}

pub(crate) async fn list_projects(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse<Project>>, ApiError> {
    let caller = caller_identity(&headers);
    Ok(Json(
        tenants::list(&state, caller.as_ref(), Some(&namespace)).await?,
    ))
}

pub(crate) async fn create_project(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Project>,
) -> Result<impl IntoResponse, ApiError> {
    if namespace.is_empty() {
        return Err(api_validation_error("namespace is required"));
    }
    let caller = caller_identity(&headers);
    let created = tenants::create(&state, caller.as_ref(), Some(&namespace), body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn get_project(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Project>, ApiError> {
    let caller = caller_identity(&headers);
    Ok(Json(
        tenants::get(&state, caller.as_ref(), &key(namespace, name)).await?,
    ))
}

pub(crate) async fn update_project(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Project>,
) -> Result<Json<Project>, ApiError> {
    let caller = caller_identity(&headers);
    Ok(Json(
        tenants::update(&state, caller.as_ref(), &key(namespace, name), body).await?,
    ))
}

pub(crate) async fn delete_project(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = caller_identity(&headers);
    tenants::delete::<Project>(&state, caller.as_ref(), &key(namespace, name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn watch_projects(
    Path(namespace): Path<String>,
    Query(params): Query<WatchParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    watch_visible::<Project>(
        &state,
        caller_identity(&headers),
        WatchFilter::in_namespace(Kind::Project, namespace),
        params.resource_version,
    )
    .await
}
