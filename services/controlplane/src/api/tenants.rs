//! Membership-gated CRUD shared by the Organization and Project endpoints.
//!
//! # Purpose
//! Both tenant tiers follow the same admission rules; the tier-specific
//! handlers only supply the object key and call into these functions.
//!
//! # Key invariants and assumptions
//! - Reads succeed only for owners and members; everyone else gets the same
//!   `not_found` as for a missing object.
//! - Update and delete require ownership.
//! - A creator must list themselves among the owners.
//! - Clients author metadata name, labels and spec only. Status and every
//!   other metadata field are owned by the store and the reconcilers.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::ListResponse;
use crate::app::AppState;
use crate::model::{ObjectKey, ObjectMeta, Resource};
use crate::namespaces::NamespaceNameError;
use crate::store::StoreError;
use tenantry_authz::{
    AccessError, CallerIdentity, Ownable, check_creator_is_owner, check_membership,
    check_ownership, is_member,
};

/// A tenant tier served through the gated handlers.
pub(crate) trait TenantResource: Resource + Ownable {
    /// Plural resource name used in error messages.
    const RESOURCE: &'static str;

    /// Name of the namespace a tenant `name` in `namespace` is backed by.
    fn backing_namespace(namespace: Option<&str>, name: &str) -> Result<String, NamespaceNameError>;
}

async fn load<T: TenantResource>(state: &AppState, key: &ObjectKey) -> Result<T, ApiError> {
    match state.client.fetch::<T>(key).await {
        Ok(object) => Ok(object),
        Err(StoreError::NotFound(_)) => Err(AccessError::NotFound {
            resource: T::RESOURCE.to_string(),
            name: key.name.clone(),
        }
        .into()),
        Err(err) => Err(err.into()),
    }
}

fn require_owners<T: TenantResource>(object: &T) -> Result<(), ApiError> {
    if object.owners().is_empty() {
        return Err(api_validation_error("spec.owners must not be empty"));
    }
    Ok(())
}

pub(crate) async fn get<T: TenantResource>(
    state: &AppState,
    caller: Option<&CallerIdentity>,
    key: &ObjectKey,
) -> Result<T, ApiError> {
    let object = load::<T>(state, key).await?;
    check_membership(caller, &object)?;
    Ok(object)
}

pub(crate) async fn list<T: TenantResource>(
    state: &AppState,
    caller: Option<&CallerIdentity>,
    namespace: Option<&str>,
) -> Result<ListResponse<T>, ApiError> {
    let (items, resource_version) = state.client.list_versioned::<T>(namespace).await?;
    let items = items
        .into_iter()
        .filter(|object| is_member(caller, object))
        .collect();
    Ok(ListResponse {
        items,
        resource_version,
    })
}

pub(crate) async fn create<T: TenantResource>(
    state: &AppState,
    caller: Option<&CallerIdentity>,
    namespace: Option<&str>,
    mut body: T,
) -> Result<T, ApiError> {
    let requested = body.meta();
    if requested.namespace.is_some() && requested.namespace.as_deref() != namespace {
        return Err(api_validation_error(
            "metadata.namespace does not match the request path",
        ));
    }
    let name = requested.name.clone();
    T::backing_namespace(namespace, &name)?;
    require_owners(&body)?;
    check_creator_is_owner(caller, &body)?;

    let labels = std::mem::take(&mut body.meta_mut().labels);
    *body.meta_mut() = ObjectMeta {
        name,
        namespace: namespace.map(str::to_string),
        labels,
        ..ObjectMeta::default()
    };
    body.reset_status();
    let created = state.client.create(body).await?;
    tracing::info!(key = %created.key(), "tenant created");
    Ok(created)
}

/// Copies spec and labels from `body` onto the stored object.
///
/// The write is conditional on the body's `resourceVersion` when it carries
/// one, and on the version just read otherwise.
pub(crate) async fn update<T: TenantResource>(
    state: &AppState,
    caller: Option<&CallerIdentity>,
    key: &ObjectKey,
    body: T,
) -> Result<T, ApiError> {
    if body.meta().name != key.name {
        return Err(api_validation_error(
            "metadata.name does not match the request path",
        ));
    }
    let current = load::<T>(state, key).await?;
    check_ownership(caller, &current, "update")?;
    require_owners(&body)?;

    let mut next = current;
    next.copy_spec_from(&body);
    next.meta_mut().labels = body.meta().labels.clone();
    if body.meta().resource_version != 0 {
        next.meta_mut().resource_version = body.meta().resource_version;
    }
    Ok(state.client.update(next).await?)
}

pub(crate) async fn delete<T: TenantResource>(
    state: &AppState,
    caller: Option<&CallerIdentity>,
    key: &ObjectKey,
) -> Result<(), ApiError> {
    let current = load::<T>(state, key).await?;
    check_ownership(caller, &current, "delete")?;
    state.client.delete(key).await?;
    tracing::info!(%key, "tenant deletion requested");
    Ok(())
}
