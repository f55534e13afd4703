//! Control-plane HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and testable.
use crate::api;
use crate::model::{OrganizationRole, OrganizationRoleTemplate, ProjectRoleTemplate, RoleBinding};
use crate::observability;
use crate::store::Client;
use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const API_VERSION: &str = "v1";

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub api_version: String,
    /// Cancelled when the process stops; ends open watch streams.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_version: API_VERSION.to_string(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/v1/system/info", get(api::system::system_info))
        .route("/v1/system/health", get(api::system::system_health))
        .route(
            "/v1/organizations",
            get(api::list_organizations).post(api::create_organization),
        )
        .route(
            "/v1/organizations/:name",
            get(api::get_organization)
                .put(api::update_organization)
                .delete(api::delete_organization),
        )
        .route("/v1/watch/organizations", get(api::watch_organizations))
        .route(
            "/v1/namespaces/:namespace/projects",
            get(api::list_projects).post(api::create_project),
        )
        .route(
            "/v1/namespaces/:namespace/projects/:name",
            get(api::get_project)
                .put(api::update_project)
                .delete(api::delete_project),
        )
        .route(
            "/v1/namespaces/:namespace/watch/projects",
            get(api::watch_projects),
        )
        .route(
            "/v1/organizationroletemplates",
            get(api::list_cluster::<OrganizationRoleTemplate>)
                .post(api::create_cluster::<OrganizationRoleTemplate>),
        )
        .route(
            "/v1/organizationroletemplates/:name",
            get(api::get_cluster::<OrganizationRoleTemplate>)
                .put(api::replace_cluster::<OrganizationRoleTemplate>)
                .delete(api::delete_cluster::<OrganizationRoleTemplate>),
        )
        .route(
            "/v1/namespaces/:namespace/projectroletemplates",
            get(api::list_namespaced::<ProjectRoleTemplate>)
                .post(api::create_namespaced::<ProjectRoleTemplate>),
        )
        .route(
            "/v1/namespaces/:namespace/projectroletemplates/:name",
            get(api::get_namespaced::<ProjectRoleTemplate>)
                .put(api::replace_namespaced::<ProjectRoleTemplate>)
                .delete(api::delete_namespaced::<ProjectRoleTemplate>),
        )
        .route(
            "/v1/namespaces/:namespace/organizationroles",
            get(api::list_namespaced::<OrganizationRole>)
                .post(api::create_namespaced::<OrganizationRole>),
        )
        .route(
            "/v1/namespaces/:namespace/organizationroles/:name",
            get(api::get_namespaced::<OrganizationRole>)
                .put(api::replace_namespaced::<OrganizationRole>)
                .delete(api::delete_namespaced::<OrganizationRole>),
        )
        .route(
            "/v1/namespaces/:namespace/rolebindings",
            get(api::list_namespaced::<RoleBinding>).post(api::create_namespaced::<RoleBinding>),
        )
        .route(
            "/v1/namespaces/:namespace/rolebindings/:name",
            get(api::get_namespaced::<RoleBinding>)
                .put(api::replace_namespaced::<RoleBinding>)
                .delete(api::delete_namespaced::<RoleBinding>),
        )
        .layer(trace_layer)
        .with_state(state)
}
