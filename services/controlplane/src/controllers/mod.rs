//! Reconcile loops for the control-plane kinds.
//!
//! # Purpose
//! Each managed kind has a [`Reconciler`] that converges one object at a time:
//! it owns a finalizer, materializes dependents, and reports readiness through
//! the Ready condition. The shared lifecycle (finalizer, teardown, status
//! write) lives in `lifecycle`; the [`manager::Manager`] drives reconcilers
//! from the store's change feed through per-kind work queues.
//!
//! # Key invariants
//! - A reconcile pass against converged state performs zero writes.
//! - Status is written through the status path only, and only when it changed.
//! - Dependents are tied to their controller by a controlling owner reference.
use crate::model::{Conditioned, Kind, ObjectKey};
use crate::namespaces::NamespaceNameError;
use crate::store::{Client, StoreError, WatchEvent};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod defaults;
mod dependents;
pub mod index;
mod lifecycle;
pub mod manager;
mod organization;
mod organization_role;
mod organization_role_template;
mod project;
mod project_role_template;
pub mod queue;

pub use index::TargetIndex;
pub use manager::{Manager, ManagerConfig};
pub use organization::OrganizationReconciler;
pub use organization_role::OrganizationRoleReconciler;
pub use organization_role_template::OrganizationRoleTemplateReconciler;
pub use project::ProjectReconciler;
pub use project_role_template::ProjectRoleTemplateReconciler;

/// Finalizer held by the reconciler of `kind`.
pub fn finalizer_for(kind: Kind) -> String {
    format!("{}.tenantry.io/controller", kind.as_str().to_ascii_lowercase())
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Name(#[from] NamespaceNameError),
    #[error("{object} is controlled by {owner}")]
    ForeignOwner { object: ObjectKey, owner: ObjectKey },
    #[error("namespace {0} is being terminated")]
    NamespaceTerminating(String),
}

pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Done,
    RequeueAfter(Duration),
}

/// Typed reconcile logic for one kind.
///
/// Implementors only describe what the kind needs; `lifecycle` handles the
/// finalizer, deletion and the Ready condition around [`Reconciler::sync`].
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    type Object: Conditioned;

    /// Kinds whose objects owned by a terminating object are torn down before
    /// its finalizer is released.
    const OWNED_KINDS: &'static [Kind];
    /// Kinds whose events can affect objects of this kind.
    const WATCHES: &'static [Kind];
    const READY_MESSAGE: &'static str;

    fn client(&self) -> &Client;

    /// Converge dependents and fill in the status fields this kind computes.
    /// Only `object.status` may be changed.
    async fn sync(&self, object: &mut Self::Object) -> ControllerResult<()>;

    /// Keys of this kind affected by `event`. Events of this kind itself are
    /// routed by the manager and never reach here.
    async fn map(&self, event: &WatchEvent) -> ControllerResult<Vec<ObjectKey>>;
}

/// Object-safe view of a reconciler, as used by the manager.
#[async_trait]
pub trait Controller: Send + Sync {
    fn kind(&self) -> Kind;
    fn watches(&self) -> &'static [Kind];
    async fn reconcile(&self, key: &ObjectKey) -> ControllerResult<ReconcileOutcome>;
    async fn map(&self, event: &WatchEvent) -> ControllerResult<Vec<ObjectKey>>;
}

#[async_trait]
impl<R: Reconciler> Controller for R {
    fn kind(&self) -> Kind {
        <R::Object as crate::model::Resource>::KIND
    }

    fn watches(&self) -> &'static [Kind] {
        R::WATCHES
    }

    async fn reconcile(&self, key: &ObjectKey) -> ControllerResult<ReconcileOutcome> {
        lifecycle::reconcile(self, key).await
    }

    async fn map(&self, event: &WatchEvent) -> ControllerResult<Vec<ObjectKey>> {
        Reconciler::map(self, event).await
    }
}

/// The five reconcilers, sharing one client and target index.
pub fn controllers(client: &Client, index: &Arc<TargetIndex>) -> Vec<Arc<dyn Controller>> {
    vec![
        Arc::new(OrganizationReconciler::new(client.clone())),
        Arc::new(ProjectReconciler::new(client.clone())),
        Arc::new(OrganizationRoleTemplateReconciler::new(
            client.clone(),
            index.clone(),
        )),
        Arc::new(ProjectRoleTemplateReconciler::new(client.clone(), index.clone())),
        Arc::new(OrganizationRoleReconciler::new(client.clone(), index.clone())),
    ]
}

/// Keys of `kind` that `event`'s object names as owners.
pub(crate) fn owners_of_kind(event: &WatchEvent, kind: Kind) -> Vec<ObjectKey> {
    let Some(object) = event.object() else {
        return Vec::new();
    };
    object
        .meta()
        .owner_references
        .iter()
        .filter(|owner| owner.kind == kind)
        .map(|owner| owner.key())
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizer_names_follow_kind() {
        assert_eq!(
            finalizer_for(Kind::Organization),
            "organization.tenantry.io/controller"
        );
        assert_eq!(
            finalizer_for(Kind::ProjectRoleTemplate),
            "projectroletemplate.tenantry.io/controller"
        );
    }
}
