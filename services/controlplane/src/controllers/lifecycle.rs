//! Shared reconcile state machine.
//!
//! # Purpose
//! Runs the steps every managed kind goes through:
//! 1. A missing object is done; there is nothing to converge.
//! 2. A terminating object reports Ready=False/Deleting, tears down what it
//!    owns, and releases its finalizer once nothing owned remains.
//! 3. A live object gets its finalizer, is synced, and reports
//!    Ready=True/SetupComplete for the generation it observed.
//!
//! # Notes
//! The status computed by `sync` is compared with the stored one and written
//! only when it differs, so converged objects cost no writes.
use super::{ControllerResult, ReconcileOutcome, Reconciler, finalizer_for};
use crate::model::{
    ConditionStatus, Conditioned, ObjectKey, REASON_DELETING, REASON_SETUP_COMPLETE, Resource,
};
use crate::namespaces::teardown_owned_objects;
use crate::store::StoreError;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Poll interval while owned objects are still going away.
const TEARDOWN_POLL: Duration = Duration::from_millis(500);

#[instrument(
    name = "reconcile",
    skip_all,
    fields(kind = %key.kind, namespace = ?key.namespace, name = %key.name)
)]
pub(crate) async fn reconcile<R: Reconciler>(
    reconciler: &R,
    key: &ObjectKey,
) -> ControllerResult<ReconcileOutcome> {
    let client = reconciler.client();
    let Some(object) = client.find::<R::Object>(key).await? else {
        debug!("object is gone");
        return Ok(ReconcileOutcome::Done);
    };
    if object.meta().is_terminating() {
        return finalize(reconciler, object).await;
    }

    let finalizer = finalizer_for(<R::Object as Resource>::KIND);
    let object = if object.meta().has_finalizer(&finalizer) {
        object
    } else {
        client
            .modify::<R::Object, _>(key, |current| {
                current.meta_mut().add_finalizer(&finalizer);
            })
            .await?
    };
    if object.meta().is_terminating() {
        return finalize(reconciler, object).await;
    }

    let mut desired = object.clone();
    reconciler.sync(&mut desired).await?;
    let generation = desired.meta().generation;
    let readiness = desired.readiness_mut();
    readiness.observed_generation = generation;
    readiness.set_ready(
        ConditionStatus::True,
        REASON_SETUP_COMPLETE,
        R::READY_MESSAGE,
    );

    if desired != object {
        client
            .modify_status::<R::Object, _>(key, |current| current.copy_status_from(&desired))
            .await?;
        debug!(generation, "status updated");
    }
    Ok(ReconcileOutcome::Done)
}

async fn finalize<R: Reconciler>(
    reconciler: &R,
    object: R::Object,
) -> ControllerResult<ReconcileOutcome> {
    let client = reconciler.client();
    let finalizer = finalizer_for(<R::Object as Resource>::KIND);
    if !object.meta().has_finalizer(&finalizer) {
        return Ok(ReconcileOutcome::Done);
    }
    let key = object.key();

    if !object
        .readiness()
        .has_ready(ConditionStatus::False, REASON_DELETING)
    {
        let message = format!("{} is being terminated", <R::Object as Resource>::KIND);
        client
            .modify_status::<R::Object, _>(&key, |current| {
                current
                    .readiness_mut()
                    .set_ready(ConditionStatus::False, REASON_DELETING, &message);
            })
            .await?;
    }

    if !teardown_owned_objects(client, &object.meta().uid, R::OWNED_KINDS).await? {
        debug!("waiting for owned objects to go away");
        return Ok(ReconcileOutcome::RequeueAfter(TEARDOWN_POLL));
    }

    let released = client
        .modify::<R::Object, _>(&key, |current| {
            current.meta_mut().remove_finalizer(&finalizer);
        })
        .await;
    match released {
        Ok(_) | Err(StoreError::NotFound(_)) => {
            info!("finalizer released");
            Ok(ReconcileOutcome::Done)
        }
        Err(err) => Err(err.into()),
    }
}
