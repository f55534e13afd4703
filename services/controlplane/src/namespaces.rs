//! Tenant namespace naming and lifecycle.
//!
//! # Purpose
//! Every Organization and Project is backed by exactly one namespace that it
//! controls. This module derives those namespace names, validates tenant names
//! so the derivation stays reversible, and creates, adopts and tears down the
//! backing namespaces and anything else a tenant owns.
//!
//! # Naming
//! - An Organization `acme` lives in namespace `acme`.
//! - A Project `web` of `acme` lives in `acme-tenantry-web`.
//! - Tenant names may not contain the separator, nor begin with `tenantry-` or
//!   end with `-tenantry`, which would form it across the join. A project
//!   namespace therefore decodes back into exactly one (organization, project)
//!   pair.
use crate::controllers::{ControllerError, ControllerResult};
use crate::model::ownership::OwnershipForest;
use crate::model::{Kind, Namespace, Object, ObjectKey, OwnerReference, Resource};
use crate::store::{Client, StoreError};
use thiserror::Error;
use tracing::{debug, info};

pub const PROJECT_NAMESPACE_SEPARATOR: &str = "-tenantry-";
const SEPARATOR_PREFIX: &str = "tenantry-";
const SEPARATOR_SUFFIX: &str = "-tenantry";
const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceNameError {
    #[error("name must not be empty")]
    Empty,
    #[error("name {0:?} must be no more than 63 characters")]
    TooLong(String),
    #[error(
        "name {0:?} must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character"
    )]
    InvalidCharacters(String),
    #[error(
        "name {0:?} must not contain {PROJECT_NAMESPACE_SEPARATOR:?}, begin with {SEPARATOR_PREFIX:?} or end with {SEPARATOR_SUFFIX:?}"
    )]
    ReservedSeparator(String),
    #[error("{0:?} is not a project namespace")]
    NotProjectNamespace(String),
}

/// Checks that `name` is a DNS-1123 label that cannot form the project
/// separator, alone or joined to another tenant name.
pub fn validate_tenant_name(name: &str) -> Result<(), NamespaceNameError> {
    if name.is_empty() {
        return Err(NamespaceNameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NamespaceNameError::TooLong(name.to_string()));
    }
    let bytes = name.as_bytes();
    let allowed = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-';
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !bytes.iter().all(allowed) || !alnum(&bytes[0]) || !alnum(&bytes[bytes.len() - 1]) {
        return Err(NamespaceNameError::InvalidCharacters(name.to_string()));
    }
    if name.contains(PROJECT_NAMESPACE_SEPARATOR)
        || name.starts_with(SEPARATOR_PREFIX)
        || name.ends_with(SEPARATOR_SUFFIX)
    {
        return Err(NamespaceNameError::ReservedSeparator(name.to_string()));
    }
    Ok(())
}

pub fn organization_namespace_name(organization: &str) -> Result<String, NamespaceNameError> {
    validate_tenant_name(organization)?;
    Ok(organization.to_string())
}

pub fn project_namespace_name(
    organization_namespace: &str,
    project: &str,
) -> Result<String, NamespaceNameError> {
    validate_tenant_name(organization_namespace)?;
    validate_tenant_name(project)?;
    let name = format!("{organization_namespace}{PROJECT_NAMESPACE_SEPARATOR}{project}");
    if name.len() > MAX_NAME_LEN {
        return Err(NamespaceNameError::TooLong(name));
    }
    Ok(name)
}

/// Splits a project namespace into `(organization namespace, project name)`.
///
/// Only names [`project_namespace_name`] can produce decode; both parts must be
/// valid tenant names.
pub fn decode_project_namespace(namespace: &str) -> Result<(String, String), NamespaceNameError> {
    let mut parts = namespace.split(PROJECT_NAMESPACE_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(organization), Some(project), None)
            if validate_tenant_name(organization).is_ok()
                && validate_tenant_name(project).is_ok() =>
        {
            Ok((organization.to_string(), project.to_string()))
        }
        _ => Err(NamespaceNameError::NotProjectNamespace(namespace.to_string())),
    }
}

/// The tenant whose namespace `namespace` is: a Project when the name decodes
/// as a project namespace, otherwise an Organization.
pub fn tenant_for_namespace(namespace: &str) -> ObjectKey {
    match decode_project_namespace(namespace) {
        Ok((organization, project)) => ObjectKey::namespaced(Kind::Project, organization, project),
        Err(_) => ObjectKey::cluster(Kind::Organization, namespace),
    }
}

/// Ensures namespace `name` exists and is controlled by `owner`.
///
/// An uncontrolled namespace is adopted. A namespace already controlled by
/// `owner` is returned without any write.
pub async fn reconcile_namespace<T: Resource>(
    client: &Client,
    owner: &T,
    name: &str,
) -> ControllerResult<Namespace> {
    let key = ObjectKey::cluster(Kind::Namespace, name);
    let owner_ref = OwnerReference::controlled_by(owner);

    let existing = match client.find::<Namespace>(&key).await? {
        Some(namespace) => namespace,
        None => {
            let mut namespace = Namespace::new(name);
            namespace.metadata.owner_references.push(owner_ref.clone());
            match client.create(namespace).await {
                Ok(created) => {
                    info!(namespace = %name, owner = %owner.key(), "created tenant namespace");
                    return Ok(created);
                }
                Err(StoreError::AlreadyExists(_)) => client.fetch::<Namespace>(&key).await?,
                Err(err) => return Err(err.into()),
            }
        }
    };

    if existing.metadata.is_terminating() {
        return Err(ControllerError::NamespaceTerminating(name.to_string()));
    }
    match existing.metadata.controller_ref() {
        Some(controller) if controller.uid == owner_ref.uid => Ok(existing),
        Some(controller) => Err(ControllerError::ForeignOwner {
            object: key,
            owner: controller.key(),
        }),
        None => {
            let adopted = client
                .modify::<Namespace, _>(&key, |namespace| {
                    if namespace.metadata.controller_ref().is_none() {
                        namespace.metadata.owner_references.push(owner_ref.clone());
                    }
                })
                .await?;
            match adopted.metadata.controller_ref() {
                Some(controller) if controller.uid == owner_ref.uid => {
                    info!(namespace = %name, owner = %owner.key(), "adopted tenant namespace");
                    Ok(adopted)
                }
                Some(controller) => Err(ControllerError::ForeignOwner {
                    object: key,
                    owner: controller.key(),
                }),
                None => Err(ControllerError::NamespaceTerminating(name.to_string())),
            }
        }
    }
}

/// Deletes every object of `kinds` that is transitively owned by `owner_uid`,
/// dependents first. Returns `true` once none of them remain.
pub async fn teardown_owned_objects(
    client: &Client,
    owner_uid: &str,
    kinds: &[Kind],
) -> ControllerResult<bool> {
    let order = owned_teardown_order(client, owner_uid, kinds).await?;
    if order.is_empty() {
        return Ok(true);
    }
    for key in &order {
        match client.delete(key).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }
    let remaining = owned_teardown_order(client, owner_uid, kinds).await?;
    debug!(
        owner_uid,
        deleted = order.len(),
        remaining = remaining.len(),
        "tearing down owned objects"
    );
    Ok(remaining.is_empty())
}

async fn owned_teardown_order(
    client: &Client,
    owner_uid: &str,
    kinds: &[Kind],
) -> ControllerResult<Vec<ObjectKey>> {
    let mut objects: Vec<Object> = Vec::new();
    for kind in kinds {
        objects.extend(client.store().list(*kind, None).await?);
    }
    Ok(OwnershipForest::build(objects.iter()).teardown_order(owner_uid))
}
