//! OrganizationRole reconciler.
//!
//! The rules of every Ready OrganizationRoleTemplate form the ceiling. The role's
//! requested rules are clamped to that ceiling; the result is published as
//! `status.acceptedRules` and materialized as a Role of the same name.
use super::dependents::ensure_owned;
use super::index::TargetIndex;
use super::{ControllerResult, Reconciler, owners_of_kind};
use crate::model::{
    Conditioned, Kind, ObjectKey, OrganizationRole, OrganizationRoleTemplate, Role,
};
use crate::store::{Client, WatchEvent};
use async_trait::async_trait;
use std::sync::Arc;
use tenantry_authz::{PolicyRule, clamp};

pub struct OrganizationRoleReconciler {
    client: Client,
    index: Arc<TargetIndex>,
}

impl OrganizationRoleReconciler {
    pub fn new(client: Client, index: Arc<TargetIndex>) -> Self {
        Self { client, index }
    }

    async fn ceiling(&self) -> ControllerResult<Vec<PolicyRule>> {
        Ok(self
            .client
            .list::<OrganizationRoleTemplate>(None)
            .await?
            .into_iter()
            .filter(|template| template.is_ready())
            .flat_map(|template| template.spec.rules)
            .collect())
    }
}

#[async_trait]
impl Reconciler for OrganizationRoleReconciler {
    type Object = OrganizationRole;

    const OWNED_KINDS: &'static [Kind] = &[Kind::Role];
    const WATCHES: &'static [Kind] = &[Kind::OrganizationRoleTemplate, Kind::Role];
    const READY_MESSAGE: &'static str = "OrganizationRole setup is complete.";

    fn client(&self) -> &Client {
        &self.client
    }

    async fn sync(&self, role: &mut OrganizationRole) -> ControllerResult<()> {
        let accepted = clamp(&self.ceiling().await?, &role.spec.rules);
        let namespace = role.metadata.namespace.clone().unwrap_or_default();
        let desired = Role::new(namespace, role.metadata.name.clone(), accepted.clone());
        ensure_owned(&self.client, &*role, desired).await?;
        role.status.accepted_rules = accepted;
        Ok(())
    }

    async fn map(&self, event: &WatchEvent) -> ControllerResult<Vec<ObjectKey>> {
        match event.kind() {
            Some(Kind::OrganizationRoleTemplate) => {
                self.index.ensure_warm(&self.client).await?;
                Ok(self.index.organization_roles().await)
            }
            Some(Kind::Role) => Ok(owners_of_kind(event, Kind::OrganizationRole)),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::OrganizationRoleTemplateReconciler;
    use crate::controllers::testing::{client, settle};
    use crate::model::{Namespace, OrganizationRoleTemplateSpec, Resource};

    async fn setup(client: &Client, ceiling: Vec<PolicyRule>) {
        client.create(Namespace::new("acme")).await.expect("namespace");
        let template = client
            .create(OrganizationRoleTemplate::new(
                "ceiling",
                OrganizationRoleTemplateSpec {
                    rules: ceiling,
                    ..OrganizationRoleTemplateSpec::default()
                },
            ))
            .await
            .expect("template");
        let templates =
            OrganizationRoleTemplateReconciler::new(client.clone(), Arc::new(TargetIndex::new()));
        settle(&templates, &template.key()).await;
    }

    fn reconciler(client: &Client) -> OrganizationRoleReconciler {
        OrganizationRoleReconciler::new(client.clone(), Arc::new(TargetIndex::new()))
    }

    #[tokio::test]
    async fn requested_rules_are_clamped_to_templates() {
        let client = client();
        setup(&client, vec![PolicyRule::resource(&["*"], &["*"], &["get", "list"])]).await;
        let created = client
            .create(OrganizationRole::new(
                "acme",
                "deployer",
                vec![PolicyRule::resource(
                    &["apps.io"],
                    &["deployments"],
                    &["get", "list", "delete"],
                )],
            ))
            .await
            .expect("role");
        settle(&reconciler(&client), &created.key()).await;

        let expected = vec![PolicyRule::resource(&["apps.io"], &["deployments"], &["get", "list"])];
        let stored: OrganizationRole = client.fetch(&created.key()).await.expect("fetch");
        assert!(stored.is_ready());
        assert_eq!(stored.status.accepted_rules, expected);
        let role: Role = client.get(Some("acme"), "deployer").await.expect("role");
        assert_eq!(role.rules, expected);
        assert!(role.metadata.is_owned_by(&stored.metadata.uid));
    }

    #[tokio::test]
    async fn templates_that_are_not_ready_do_not_count() {
        let client = client();
        client.create(Namespace::new("acme")).await.expect("namespace");
        client
            .create(OrganizationRoleTemplate::new(
                "pending",
                OrganizationRoleTemplateSpec {
                    rules: vec![PolicyRule::resource(&["*"], &["*"], &["*"])],
                    ..OrganizationRoleTemplateSpec::default()
                },
            ))
            .await
            .expect("template");
        let created = client
            .create(OrganizationRole::new(
                "acme",
                "deployer",
                vec![PolicyRule::resource(&["apps.io"], &["deployments"], &["get"])],
            ))
            .await
            .expect("role");
        settle(&reconciler(&client), &created.key()).await;

        let stored: OrganizationRole = client.fetch(&created.key()).await.expect("fetch");
        assert!(stored.status.accepted_rules.is_empty());
    }

    #[tokio::test]
    async fn nothing_is_accepted_without_a_ceiling() {
        let client = client();
        client.create(Namespace::new("acme")).await.expect("namespace");
        let created = client
            .create(OrganizationRole::new(
                "acme",
                "deployer",
                vec![PolicyRule::resource(&["apps.io"], &["deployments"], &["get"])],
            ))
            .await
            .expect("role");
        settle(&reconciler(&client), &created.key()).await;

        let stored: OrganizationRole = client.fetch(&created.key()).await.expect("fetch");
        assert!(stored.is_ready());
        assert!(stored.status.accepted_rules.is_empty());
        let role: Role = client.get(Some("acme"), "deployer").await.expect("role");
        assert!(role.rules.is_empty());
    }

    #[tokio::test]
    async fn template_changes_reach_every_role() {
        let client = client();
        setup(&client, Vec::new()).await;
        let first = client
            .create(OrganizationRole::new("acme", "a", Vec::new()))
            .await
            .expect("a");
        let second = client
            .create(OrganizationRole::new("acme", "b", Vec::new()))
            .await
            .expect("b");
        let template: OrganizationRoleTemplate =
            client.get(None, "ceiling").await.expect("template");

        let keys = Reconciler::map(
            &reconciler(&client),
            &WatchEvent::Modified(template.into_object()),
        )
        .await
        .expect("map");
        assert_eq!(keys, vec![first.key(), second.key()]);
    }
}
