//! Reverse index from tenants to the templates that may target them.
//!
//! # Purpose
//! Tenant events fan out to role templates and template events fan out to
//! OrganizationRoles. Listing every template on every event would make each
//! change cost a full scan, so the manager feeds watch events into this index
//! and the mapping functions answer from it.
//!
//! # Notes
//! - The index warms from the store on first use and again after
//!   [`TargetIndex::invalidate`] (the manager calls it when its watch restarts).
//! - A tenant is reported for a template when the template's scope or selector
//!   matches it now, or when the template's last status listed it as a target.
//!   The second case is what lets a template notice a tenant that stopped
//!   matching or disappeared.
use crate::model::{
    Kind, LabelSelector, Object, ObjectKey, OrganizationRole, OrganizationRoleTemplate,
    ProjectRoleTemplate, Resource, RoleTemplateTarget, TenantKind, selects,
};
use crate::store::{Client, StoreResult, WatchEvent};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct IndexState {
    warm: bool,
    organization_templates: BTreeMap<ObjectKey, Vec<TenantKind>>,
    project_templates: BTreeMap<ObjectKey, Option<LabelSelector>>,
    organization_roles: BTreeSet<ObjectKey>,
    // template -> tenants listed in its status
    recorded: BTreeMap<ObjectKey, Vec<ObjectKey>>,
    // tenant -> templates whose status lists it
    targeted_by: BTreeMap<ObjectKey, BTreeSet<ObjectKey>>,
}

impl IndexState {
    fn apply(&mut self, object: &Object, deleted: bool) {
        let key = object.key();
        match object {
            Object::OrganizationRoleTemplate(template) => {
                if deleted {
                    self.organization_templates.remove(&key);
                    self.record_targets(&key, &[]);
                } else {
                    self.organization_templates
                        .insert(key.clone(), template.spec.scopes.clone());
                    self.record_targets(&key, &template.status.targets);
                }
            }
            Object::ProjectRoleTemplate(template) => {
                if deleted {
                    self.project_templates.remove(&key);
                    self.record_targets(&key, &[]);
                } else {
                    self.project_templates
                        .insert(key.clone(), template.spec.project_selector.clone());
                    self.record_targets(&key, &template.status.targets);
                }
            }
            Object::OrganizationRole(_) => {
                if deleted {
                    self.organization_roles.remove(&key);
                } else {
                    self.organization_roles.insert(key);
                }
            }
            _ => {}
        }
    }

    fn record_targets(&mut self, template: &ObjectKey, targets: &[RoleTemplateTarget]) {
        if let Some(previous) = self.recorded.remove(template) {
            for tenant in previous {
                if let Some(templates) = self.targeted_by.get_mut(&tenant) {
                    templates.remove(template);
                    if templates.is_empty() {
                        self.targeted_by.remove(&tenant);
                    }
                }
            }
        }
        if targets.is_empty() {
            return;
        }
        let tenants: Vec<ObjectKey> = targets.iter().map(target_key).collect();
        for tenant in &tenants {
            self.targeted_by
                .entry(tenant.clone())
                .or_default()
                .insert(template.clone());
        }
        self.recorded.insert(template.clone(), tenants);
    }

    fn recorded_for(&self, tenant: &ObjectKey) -> impl Iterator<Item = &ObjectKey> {
        self.targeted_by.get(tenant).into_iter().flatten()
    }
}

fn target_key(target: &RoleTemplateTarget) -> ObjectKey {
    ObjectKey::new(target.kind.kind(), target.namespace.clone(), target.name.clone())
}

#[derive(Debug, Default)]
pub struct TargetIndex {
    state: RwLock<IndexState>,
}

impl TargetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one watch event into the index. Ignored until warm, since warming
    /// reads state at least as new as any event seen so far.
    pub async fn observe(&self, event: &WatchEvent) {
        let Some(object) = event.object() else {
            return;
        };
        let mut state = self.state.write().await;
        if state.warm {
            state.apply(object, matches!(event, WatchEvent::Deleted(_)));
        }
    }

    /// Forces the next lookup to rebuild from the store.
    pub async fn invalidate(&self) {
        *self.state.write().await = IndexState::default();
    }

    pub async fn ensure_warm(&self, client: &Client) -> StoreResult<()> {
        if self.state.read().await.warm {
            return Ok(());
        }
        let organization_templates = client.list::<OrganizationRoleTemplate>(None).await?;
        let project_templates = client.list::<ProjectRoleTemplate>(None).await?;
        let organization_roles = client.list::<OrganizationRole>(None).await?;

        let mut state = self.state.write().await;
        if state.warm {
            return Ok(());
        }
        let mut fresh = IndexState::default();
        for template in organization_templates {
            fresh.apply(&template.into_object(), false);
        }
        for template in project_templates {
            fresh.apply(&template.into_object(), false);
        }
        for role in organization_roles {
            fresh.apply(&role.into_object(), false);
        }
        fresh.warm = true;
        debug!(
            organization_templates = fresh.organization_templates.len(),
            project_templates = fresh.project_templates.len(),
            organization_roles = fresh.organization_roles.len(),
            "target index warmed"
        );
        *state = fresh;
        Ok(())
    }

    /// OrganizationRoleTemplates that may target the Organization or Project
    /// `tenant`.
    pub async fn organization_templates_for(&self, tenant: &ObjectKey) -> Vec<ObjectKey> {
        let Some(scope) = TenantKind::from_kind(tenant.kind) else {
            return Vec::new();
        };
        let state = self.state.read().await;
        let mut templates: BTreeSet<ObjectKey> = state
            .organization_templates
            .iter()
            .filter(|(_, scopes)| scopes.contains(&scope))
            .map(|(key, _)| key.clone())
            .collect();
        templates.extend(
            state
                .recorded_for(tenant)
                .filter(|key| key.kind == Kind::OrganizationRoleTemplate)
                .cloned(),
        );
        templates.into_iter().collect()
    }

    /// ProjectRoleTemplates in the project's namespace whose selector matches
    /// `labels`, plus those that last recorded the project as a target.
    pub async fn project_templates_for(
        &self,
        project: &ObjectKey,
        labels: &BTreeMap<String, String>,
    ) -> Vec<ObjectKey> {
        let state = self.state.read().await;
        let mut templates: BTreeSet<ObjectKey> = state
            .project_templates
            .iter()
            .filter(|(key, selector)| {
                key.namespace == project.namespace && selects(selector.as_ref(), labels)
            })
            .map(|(key, _)| key.clone())
            .collect();
        templates.extend(
            state
                .recorded_for(project)
                .filter(|key| key.kind == Kind::ProjectRoleTemplate)
                .cloned(),
        );
        templates.into_iter().collect()
    }

    pub async fn organization_roles(&self) -> Vec<ObjectKey> {
        self.state
            .read()
            .await
            .organization_roles
            .iter()
            .cloned()
            .collect()
    }
}
