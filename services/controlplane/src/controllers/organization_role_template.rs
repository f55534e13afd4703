//! OrganizationRoleTemplate reconciler.
//!
//! Materializes the template as a Role (and, depending on `bindTo`, a
//! RoleBinding) in the namespace of every ready Organization and Project in
//! its scopes, prunes what it created in tenants that are no longer targeted,
//! and records the current targets in status.
use super::dependents::{binding_subjects, materialize_role, prune_roles};
use super::index::TargetIndex;
use super::{ControllerResult, Reconciler, owners_of_kind};
use crate::model::{
    API_GROUP, Conditioned, Kind, ObjectKey, Organization, OrganizationRoleTemplate, Project,
    RoleTemplateTarget, TenantKind, TenantStatus,
};
use crate::store::{Client, WatchEvent};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tenantry_authz::Subject;

pub struct OrganizationRoleTemplateReconciler {
    client: Client,
    index: Arc<TargetIndex>,
}

impl OrganizationRoleTemplateReconciler {
    pub fn new(client: Client, index: Arc<TargetIndex>) -> Self {
        Self { client, index }
    }
}

/// A ready tenant a template can be materialized into.
pub(crate) struct Tenant<'a> {
    pub kind: TenantKind,
    pub key: ObjectKey,
    pub generation: i64,
    pub namespace: &'a str,
    pub owners: &'a [Subject],
    pub members: &'a [Subject],
}

impl<'a> Tenant<'a> {
    pub fn ready<T: Conditioned>(
        kind: TenantKind,
        tenant: &'a T,
        owners: &'a [Subject],
        status: &'a TenantStatus,
    ) -> Option<Self> {
        if !tenant.is_ready() {
            return None;
        }
        Some(Self {
            kind,
            key: tenant.key(),
            generation: tenant.meta().generation,
            namespace: status.namespace.as_deref()?,
            owners,
            members: &status.members,
        })
    }

    pub fn target(&self) -> RoleTemplateTarget {
        RoleTemplateTarget {
            kind: self.kind,
            api_group: API_GROUP.to_string(),
            namespace: self.key.namespace.clone(),
            name: self.key.name.clone(),
            observed_generation: self.generation,
        }
    }
}

#[async_trait]
impl Reconciler for OrganizationRoleTemplateReconciler {
    type Object = OrganizationRoleTemplate;

    const OWNED_KINDS: &'static [Kind] = &[Kind::Role, Kind::RoleBinding];
    const WATCHES: &'static [Kind] = &[Kind::Organization, Kind::Project, Kind::Role, Kind::RoleBinding];
    const READY_MESSAGE: &'static str = "OrganizationRoleTemplate setup is complete.";

    fn client(&self) -> &Client {
        &self.client
    }

    async fn sync(&self, template: &mut OrganizationRoleTemplate) -> ControllerResult<()> {
        let organizations = if template.spec.scopes.contains(&TenantKind::Organization) {
            self.client.list::<Organization>(None).await?
        } else {
            Vec::new()
        };
        let projects = if template.spec.scopes.contains(&TenantKind::Project) {
            self.client.list::<Project>(None).await?
        } else {
            Vec::new()
        };
        let tenants = organizations
            .iter()
            .filter_map(|org| {
                Tenant::ready(TenantKind::Organization, org, &org.spec.owners, &org.status)
            })
            .chain(projects.iter().filter_map(|project| {
                Tenant::ready(TenantKind::Project, project, &project.spec.owners, &project.status)
            }));

        let mut keep = BTreeSet::new();
        let mut targets = Vec::new();
        for tenant in tenants {
            let subjects = binding_subjects(&template.spec.bind_to, tenant.owners, tenant.members);
            let written = materialize_role(
                &self.client,
                &*template,
                tenant.namespace,
                &template.spec.rules,
                subjects,
            )
            .await?;
            keep.extend(written);
            targets.push(tenant.target());
        }
        prune_roles(&self.client, &template.metadata.uid, &keep).await?;

        targets.sort();
        template.status.targets = targets;
        Ok(())
    }

    async fn map(&self, event: &WatchEvent) -> ControllerResult<Vec<ObjectKey>> {
        let Some(object) = event.object() else {
            return Ok(Vec::new());
        };
        match object.kind() {
            Kind::Organization | Kind::Project => {
                self.index.ensure_warm(&self.client).await?;
                Ok(self.index.organization_templates_for(&object.key()).await)
            }
            Kind::Role | Kind::RoleBinding => {
                Ok(owners_of_kind(event, Kind::OrganizationRoleTemplate))
            }
            _ => Ok(Vec::new()),
        }
    }
}
