//! Membership resolution for tenant namespaces.
//!
//! # Purpose
//! A tenant's members are every subject bound by a RoleBinding in its
//! namespace. For organizations, the members of each ready project in the
//! organization namespace are included too. Owners are not added here; the
//! tenant reconciler unions them in with [`with_owners`].
use crate::model::{Conditioned, Project, RoleBinding};
use crate::store::{Client, StoreResult};
use tenantry_authz::{Subject, normalize_subjects};

/// Deduplicated, canonically ordered subjects bound in `namespace`.
pub async fn resolve_members(
    client: &Client,
    namespace: &str,
    include_ready_projects: bool,
) -> StoreResult<Vec<Subject>> {
    let mut subjects: Vec<Subject> = client
        .list::<RoleBinding>(Some(namespace))
        .await?
        .into_iter()
        .flat_map(|binding| binding.subjects)
        .collect();
    if include_ready_projects {
        for project in client.list::<Project>(Some(namespace)).await? {
            if project.is_ready() {
                subjects.extend(project.status.members);
            }
        }
    }
    Ok(normalize_subjects(subjects))
}

pub fn with_owners(owners: &[Subject], members: Vec<Subject>) -> Vec<Subject> {
    normalize_subjects(owners.iter().cloned().chain(members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConditionStatus, Namespace, REASON_SETUP_COMPLETE, RoleRef};
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    async fn setup() -> Client {
        let client = Client::new(Arc::new(InMemoryStore::default()));
        client.create(Namespace::new("acme")).await.expect("namespace");
        client
    }

    async fn bind(client: &Client, name: &str, subjects: Vec<Subject>) {
        client
            .create(RoleBinding::new("acme", name, RoleRef::role(name), subjects))
            .await
            .expect("binding");
    }

    async fn project(client: &Client, name: &str, members: Vec<Subject>, ready: bool) {
        let created = client
            .create(Project::new("acme", name, vec![Subject::user("owner")]))
            .await
            .expect("project");
        let mut status = created.clone();
        status.status.members = members;
        status.status.readiness.observed_generation = created.metadata.generation;
        if ready {
            status
                .status
                .readiness
                .set_ready(ConditionStatus::True, REASON_SETUP_COMPLETE, "ready");
        }
        client.update_status(status).await.expect("status");
    }

    #[tokio::test]
    async fn flattens_and_dedups_binding_subjects() {
        let client = setup().await;
        bind(&client, "a", vec![Subject::user("bob"), Subject::group("devs")]).await;
        bind(&client, "b", vec![Subject::user("bob"), Subject::user("alice")]).await;

        let members = resolve_members(&client, "acme", false).await.expect("resolve");
        assert_eq!(
            members,
            normalize_subjects(vec![
                Subject::user("alice"),
                Subject::user("bob"),
                Subject::group("devs"),
            ])
        );
    }

    #[tokio::test]
    async fn includes_only_ready_projects() {
        let client = setup().await;
        project(&client, "web", vec![Subject::user("carol")], true).await;
        project(&client, "api", vec![Subject::user("dave")], false).await;

        let without = resolve_members(&client, "acme", false).await.expect("resolve");
        assert!(without.is_empty());

        let with = resolve_members(&client, "acme", true).await.expect("resolve");
        assert_eq!(with, vec![Subject::user("carol")]);
    }

    #[test]
    fn owners_are_unioned_once() {
        let members = with_owners(
            &[Subject::user("alice")],
            vec![Subject::user("alice"), Subject::user("bob")],
        );
        assert_eq!(members.len(), 2);
        assert!(members.contains(&Subject::user("alice")));
    }
}
