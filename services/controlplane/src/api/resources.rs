//! Platform-admin endpoints for role templates, organization roles and role
//! bindings.
//!
//! # Purpose
//! Plain CRUD over the store. The handlers are generic over the stored kind
//! and are instantiated once per route in `app::build_router`.
//!
//! # Security considerations
//! - No membership gate is applied here. Access to these routes is restricted
//!   by the front proxy.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::ListResponse;
use crate::app::AppState;
use crate::model::{ObjectKey, ObjectMeta, Resource};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

async fn list<T: Resource>(
    state: &AppState,
    namespace: Option<&str>,
) -> Result<ListResponse<T>, ApiError> {
    let (items, resource_version) = state.client.list_versioned::<T>(namespace).await?;
    Ok(ListResponse {
        items,
        resource_version,
    })
}

async fn create<T: Resource>(
    state: &AppState,
    namespace: Option<String>,
    mut body: T,
) -> Result<T, ApiError> {
    let requested = body.meta();
    if requested.namespace.is_some() && requested.namespace != namespace {
        return Err(api_validation_error(
            "metadata.namespace does not match the request path",
        ));
    }
    let name = requested.name.clone();
    let labels = std::mem::take(&mut body.meta_mut().labels);
    *body.meta_mut() = ObjectMeta {
        name,
        namespace,
        labels,
        ..ObjectMeta::default()
    };
    let created = state.client.create(body).await?;
    tracing::info!(key = %created.key(), "resource created");
    Ok(created)
}

async fn replace<T: Resource>(state: &AppState, key: &ObjectKey, body: T) -> Result<T, ApiError> {
    if body.meta().name != key.name {
        return Err(api_validation_error(
            "metadata.name does not match the request path",
        ));
    }
    let mut next: T = state.client.fetch(key).await?;
    next.copy_spec_from(&body);
    next.meta_mut().labels = body.meta().labels.clone();
    if body.meta().resource_version != 0 {
        next.meta_mut().resource_version = body.meta().resource_version;
    }
    Ok(state.client.update(next).await?)
}

fn cluster_key<T: Resource>(name: String) -> ObjectKey {
    ObjectKey::cluster(T::KIND, name)
}

fn namespaced_key<T: Resource>(namespace: String, name: String) -> ObjectKey {
    ObjectKey::namespaced(T::KIND, namespace, name)
}

pub(crate) async fn list_cluster<T: Resource>(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<T>>, ApiError> {
    Ok(Json(list::<T>(&state, None).await?))
}

pub(crate) async fn create_cluster<T: Resource>(
    State(state): State<AppState>,
    Json(body): Json<T>,
) -> Result<impl IntoResponse, ApiError> {
    let created = create(&state, None, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn get_cluster<T: Resource>(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<T>, ApiError> {
    Ok(Json(state.client.fetch(&cluster_key::<T>(name)).await?))
}

pub(crate) async fn replace_cluster<T: Resource>(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<T>,
) -> Result<Json<T>, ApiError> {
    Ok(Json(replace(&state, &cluster_key::<T>(name), body).await?))
}

pub(crate) async fn delete_cluster<T: Resource>(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.client.delete(&cluster_key::<T>(name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_namespaced<T: Resource>(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<T>>, ApiError> {
    Ok(Json(list::<T>(&state, Some(&namespace)).await?))
}

pub(crate) async fn create_namespaced<T: Resource>(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<T>,
) -> Result<impl IntoResponse, ApiError> {
    let created = create(&state, Some(namespace), body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn get_namespaced<T: Resource>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<T>, ApiError> {
    Ok(Json(
        state
            .client
            .fetch(&namespaced_key::<T>(namespace, name))
            .await?,
    ))
}

pub(crate) async fn replace_namespaced<T: Resource>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<T>,
) -> Result<Json<T>, ApiError> {
    Ok(Json(
        replace(&state, &namespaced_key::<T>(namespace, name), body).await?,
    ))
}

pub(crate) async fn delete_namespaced<T: Resource>(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state
        .client
        .delete(&namespaced_key::<T>(namespace, name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
