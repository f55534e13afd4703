//! Control-plane HTTP API module.
//!
//! # Purpose
//! Route handlers for the tenant endpoints, which are gated on the caller's
//! membership, and for the platform-admin and system endpoints.
pub mod error;
pub mod identity;
mod organizations;
mod projects;
mod resources;
pub mod system;
mod tenants;
pub mod types;
mod watch;

pub(crate) use organizations::{
    create_organization, delete_organization, get_organization, list_organizations,
    update_organization, watch_organizations,
};
pub(crate) use projects::{
    create_project, delete_project, get_project, list_projects, update_project, watch_projects,
};
pub(crate) use resources::{
    create_cluster, create_namespaced, delete_cluster, delete_namespaced, get_cluster,
    get_namespaced, list_cluster, list_namespaced, replace_cluster, replace_namespaced,
};
