//! Owned dependents: create-or-update and stale cleanup.
use super::{ControllerError, ControllerResult};
use crate::model::{
    BindTo, Kind, Object, ObjectKey, OwnerReference, Resource, Role, RoleBinding, RoleRef,
};
use crate::store::{Client, StoreError};
use std::collections::BTreeSet;
use tenantry_authz::{PolicyRule, Subject, normalize_subjects};
use tracing::info;

/// Converges `desired` under `owner`'s control.
///
/// Creates it when missing, adopts it when uncontrolled, and rewrites its spec
/// only when it drifted. Nothing is written when it already matches.
pub(crate) async fn ensure_owned<O: Resource, D: Resource>(
    client: &Client,
    owner: &O,
    mut desired: D,
) -> ControllerResult<D> {
    let owner_ref = OwnerReference::controlled_by(owner);
    let key = desired.key();

    let Some(existing) = client.find::<D>(&key).await? else {
        desired.meta_mut().owner_references = vec![owner_ref];
        let created = client.create(desired).await?;
        info!(dependent = %key, owner = %owner.key(), "created dependent");
        return Ok(created);
    };

    match existing.meta().controller_ref() {
        Some(controller) if controller.uid == owner_ref.uid => {
            if existing.spec_eq(&desired) {
                return Ok(existing);
            }
        }
        Some(controller) => {
            return Err(ControllerError::ForeignOwner {
                object: key,
                owner: controller.key(),
            });
        }
        None => {}
    }

    let updated = client
        .modify::<D, _>(&key, |current| {
            current.copy_spec_from(&desired);
            if current.meta().controller_ref().is_none() {
                current.meta_mut().owner_references.push(owner_ref.clone());
            }
        })
        .await?;
    match updated.meta().controller_ref() {
        Some(controller) if controller.uid == owner_ref.uid => Ok(updated),
        Some(controller) => Err(ControllerError::ForeignOwner {
            object: key,
            owner: controller.key(),
        }),
        None => Ok(updated),
    }
}

/// Deletes objects of `kind` controlled by `owner_uid` whose key is not in
/// `keep`. Returns how many were deleted.
pub(crate) async fn delete_stale_owned(
    client: &Client,
    owner_uid: &str,
    kind: Kind,
    keep: &BTreeSet<ObjectKey>,
) -> ControllerResult<usize> {
    let stale: Vec<ObjectKey> = client
        .store()
        .list(kind, None)
        .await?
        .iter()
        .filter(|object| is_controlled_by(object, owner_uid))
        .map(Object::key)
        .filter(|key| !keep.contains(key))
        .collect();
    for key in &stale {
        match client.delete(key).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                info!(dependent = %key, "deleted stale dependent");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(stale.len())
}

fn is_controlled_by(object: &Object, owner_uid: &str) -> bool {
    object
        .meta()
        .controller_ref()
        .is_some_and(|controller| controller.uid == owner_uid)
}

/// Subjects a template binds in a tenant, or `None` when it binds nobody.
pub(crate) fn binding_subjects(
    bind_to: &[BindTo],
    owners: &[Subject],
    members: &[Subject],
) -> Option<Vec<Subject>> {
    if bind_to.contains(&BindTo::Everyone) {
        Some(normalize_subjects(
            owners.iter().chain(members).cloned(),
        ))
    } else if bind_to.contains(&BindTo::Owners) {
        Some(normalize_subjects(owners.iter().cloned()))
    } else {
        None
    }
}

/// Materializes a template into `namespace`: a Role named after the template
/// and, when `subjects` is set, a RoleBinding to it. Returns the keys written
/// so the caller can prune the rest.
pub(crate) async fn materialize_role<O: Resource>(
    client: &Client,
    owner: &O,
    namespace: &str,
    rules: &[PolicyRule],
    subjects: Option<Vec<Subject>>,
) -> ControllerResult<Vec<ObjectKey>> {
    let name = owner.meta().name.clone();
    let role = ensure_owned(client, owner, Role::new(namespace, &name, rules.to_vec())).await?;
    let mut written = vec![role.key()];
    if let Some(subjects) = subjects {
        let binding = RoleBinding::new(namespace, &name, RoleRef::role(&name), subjects);
        written.push(ensure_owned(client, owner, binding).await?.key());
    }
    Ok(written)
}

/// Removes Roles and RoleBindings controlled by `owner_uid` outside `keep`.
pub(crate) async fn prune_roles(
    client: &Client,
    owner_uid: &str,
    keep: &BTreeSet<ObjectKey>,
) -> ControllerResult<()> {
    delete_stale_owned(client, owner_uid, Kind::RoleBinding, keep).await?;
    delete_stale_owned(client, owner_uid, Kind::Role, keep).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::testing::client;
    use crate::model::{Namespace, Organization};

    async fn owner(client: &Client) -> Organization {
        client.create(Namespace::new("acme")).await.expect("namespace");
        client
            .create(Organization::new("acme", vec![Subject::user("alice")]))
            .await
            .expect("organization")
    }

    #[tokio::test]
    async fn ensure_owned_creates_updates_and_then_idles() {
        let client = client();
        let org = owner(&client).await;
        let rules = vec![PolicyRule::resource(&[""], &["pods"], &["get"])];

        let created = ensure_owned(&client, &org, Role::new("acme", "viewer", rules.clone()))
            .await
            .expect("create");
        assert!(created.metadata.is_owned_by(&org.metadata.uid));

        let same = ensure_owned(&client, &org, Role::new("acme", "viewer", rules))
            .await
            .expect("no-op");
        assert_eq!(same.metadata.resource_version, created.metadata.resource_version);

        let wider = vec![PolicyRule::resource(&[""], &["pods"], &["get", "list"])];
        let updated = ensure_owned(&client, &org, Role::new("acme", "viewer", wider.clone()))
            .await
            .expect("update");
        assert_eq!(updated.rules, wider);
    }

    #[tokio::test]
    async fn ensure_owned_refuses_foreign_controller() {
        let client = client();
        let org = owner(&client).await;
        let other = client
            .create(Organization::new("other", vec![Subject::user("bob")]))
            .await
            .expect("other");
        ensure_owned(&client, &other, Role::new("acme", "viewer", Vec::new()))
            .await
            .expect("claimed by other");

        let err = ensure_owned(&client, &org, Role::new("acme", "viewer", Vec::new()))
            .await
            .expect_err("collision");
        assert!(matches!(err, ControllerError::ForeignOwner { .. }));
    }

    #[tokio::test]
    async fn prune_keeps_only_listed_dependents() {
        let client = client();
        let org = owner(&client).await;
        let kept = materialize_role(&client, &org, "acme", &[], Some(vec![Subject::user("alice")]))
            .await
            .expect("materialize");
        client
            .create(Namespace::new("old"))
            .await
            .expect("old namespace");
        materialize_role(&client, &org, "old", &[], None)
            .await
            .expect("materialize old");

        let keep: BTreeSet<ObjectKey> = kept.into_iter().collect();
        prune_roles(&client, &org.metadata.uid, &keep)
            .await
            .expect("prune");
        let roles = client.list::<Role>(None).await.expect("roles");
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].metadata.namespace.as_deref(), Some("acme"));
        assert_eq!(client.list::<RoleBinding>(None).await.expect("bindings").len(), 1);
    }

    #[test]
    fn bind_to_selects_subjects() {
        let owners = [Subject::user("alice")];
        let members = [Subject::user("bob")];
        assert_eq!(binding_subjects(&[], &owners, &members), None);
        assert_eq!(
            binding_subjects(&[BindTo::Owners], &owners, &members),
            Some(vec![Subject::user("alice")])
        );
        assert_eq!(
            binding_subjects(&[BindTo::Everyone], &owners, &members)
                .map(|subjects| subjects.len()),
            Some(2)
        );
    }
}
