//! Project reconciler.
//!
//! Ensures the project namespace (`<organization>-tenantry-<project>`) exists
//! and publishes it together with the project's members.
use super::{ControllerResult, Reconciler, owners_of_kind};
use crate::membership::{resolve_members, with_owners};
use crate::model::{Kind, ObjectKey, Project};
use crate::namespaces::{decode_project_namespace, project_namespace_name, reconcile_namespace};
use crate::store::{Client, WatchEvent};
use async_trait::async_trait;

pub struct ProjectReconciler {
    client: Client,
}

impl ProjectReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reconciler for ProjectReconciler {
    type Object = Project;

    const OWNED_KINDS: &'static [Kind] = &[Kind::Namespace];
    const WATCHES: &'static [Kind] = &[Kind::Namespace, Kind::RoleBinding];
    const READY_MESSAGE: &'static str = "Project setup is complete.";

    fn client(&self) -> &Client {
        &self.client
    }

    async fn sync(&self, project: &mut Project) -> ControllerResult<()> {
        let namespace =
            project_namespace_name(project.organization_namespace(), &project.metadata.name)?;
        reconcile_namespace(&self.client, &*project, &namespace).await?;

        let members = resolve_members(&self.client, &namespace, false).await?;
        project.status.namespace = Some(namespace);
        project.status.members = with_owners(&project.spec.owners, members);
        Ok(())
    }

    async fn map(&self, event: &WatchEvent) -> ControllerResult<Vec<ObjectKey>> {
        let Some(object) = event.object() else {
            return Ok(Vec::new());
        };
        let keys = match object.kind() {
            Kind::Namespace => owners_of_kind(event, Kind::Project),
            Kind::RoleBinding => object
                .meta()
                .namespace
                .as_deref()
                .and_then(|namespace| decode_project_namespace(namespace).ok())
                .map(|(organization, project)| {
                    vec![ObjectKey::namespaced(Kind::Project, organization, project)]
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        Ok(keys)
    }
}
