//! Organization reconciler.
//!
//! Ensures the default role templates and the organization namespace exist,
//! then publishes the namespace and the member list (owners, subjects bound in
//! the namespace, and members of ready projects).
use super::defaults::ensure_default_templates;
use super::{ControllerResult, Reconciler, owners_of_kind};
use crate::membership::{resolve_members, with_owners};
use crate::model::{Kind, ObjectKey, Organization};
use crate::namespaces::{decode_project_namespace, organization_namespace_name, reconcile_namespace};
use crate::store::{Client, WatchEvent};
use async_trait::async_trait;

pub struct OrganizationReconciler {
    client: Client,
}

impl OrganizationReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reconciler for OrganizationReconciler {
    type Object = Organization;

    const OWNED_KINDS: &'static [Kind] = &[Kind::Namespace];
    const WATCHES: &'static [Kind] = &[Kind::Namespace, Kind::RoleBinding, Kind::Project];
    const READY_MESSAGE: &'static str = "Organization setup is complete.";

    fn client(&self) -> &Client {
        &self.client
    }

    async fn sync(&self, organization: &mut Organization) -> ControllerResult<()> {
        ensure_default_templates(&self.client).await?;

        let namespace = organization_namespace_name(&organization.metadata.name)?;
        reconcile_namespace(&self.client, &*organization, &namespace).await?;

        let members = resolve_members(&self.client, &namespace, true).await?;
        organization.status.namespace = Some(namespace);
        organization.status.members = with_owners(&organization.spec.owners, members);
        Ok(())
    }

    async fn map(&self, event: &WatchEvent) -> ControllerResult<Vec<ObjectKey>> {
        let Some(object) = event.object() else {
            return Ok(Vec::new());
        };
        let keys = match object.kind() {
            Kind::Namespace => owners_of_kind(event, Kind::Organization),
            Kind::RoleBinding | Kind::Project => match object.meta().namespace.as_deref() {
                // bindings in project namespaces reach the organization
                // through the project's own status
                Some(namespace) if decode_project_namespace(namespace).is_err() => {
                    vec![ObjectKey::cluster(Kind::Organization, namespace)]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(keys)
    }
}
