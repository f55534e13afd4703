//! ProjectRoleTemplate reconciler.
//!
//! Like the organization-level template, scoped to the ready Projects in the
//! template's own namespace that its `projectSelector` selects. An absent
//! selector selects no project.
use super::dependents::{binding_subjects, materialize_role, prune_roles};
use super::index::TargetIndex;
use super::organization_role_template::Tenant;
use super::{ControllerResult, Reconciler, owners_of_kind};
use crate::model::{
    Kind, Object, ObjectKey, Project, ProjectRoleTemplate, TenantKind, selects,
};
use crate::store::{Client, WatchEvent};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct ProjectRoleTemplateReconciler {
    client: Client,
    index: Arc<TargetIndex>,
}

impl ProjectRoleTemplateReconciler {
    pub fn new(client: Client, index: Arc<TargetIndex>) -> Self {
        Self { client, index }
    }
}

#[async_trait]
impl Reconciler for ProjectRoleTemplateReconciler {
    type Object = ProjectRoleTemplate;

    const OWNED_KINDS: &'static [Kind] = &[Kind::Role, Kind::RoleBinding];
    const WATCHES: &'static [Kind] = &[Kind::Project, Kind::Role, Kind::RoleBinding];
    const READY_MESSAGE: &'static str = "ProjectRoleTemplate setup is complete.";

    fn client(&self) -> &Client {
        &self.client
    }

    async fn sync(&self, template: &mut ProjectRoleTemplate) -> ControllerResult<()> {
        let projects = self
            .client
            .list::<Project>(template.metadata.namespace.as_deref())
            .await?;
        let selector = template.spec.project_selector.as_ref();
        let tenants = projects
            .iter()
            .filter(|project| selects(selector, &project.metadata.labels))
            .filter_map(|project| {
                Tenant::ready(TenantKind::Project, project, &project.spec.owners, &project.status)
            });

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
        match object {
            Object::Project(project) => {
                self.index.ensure_warm(&self.client).await?;
                Ok(self
                    .index
                    .project_templates_for(&object.key(), &project.metadata.labels)
                    .await)
            }
            Object::Role(_) | Object::RoleBinding(_) => {
                Ok(owners_of_kind(event, Kind::ProjectRoleTemplate))
            }
            _ => Ok(Vec::new()),
        }
    }
}
