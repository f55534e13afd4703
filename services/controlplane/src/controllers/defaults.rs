//! Built-in organization role templates.
//!
//! `project-admin` and `rbac-admin` give organization owners control over
//! projects and RBAC inside their organization namespace. They are created on
//! first use and never overwritten afterwards, so administrators may edit them.
use crate::model::{
    API_GROUP, BindTo, OrganizationRoleTemplate, OrganizationRoleTemplateSpec, Resource,
    TemplateDescription, TenantKind,
};
use crate::store::{Client, StoreError, StoreResult};
use tenantry_authz::{PolicyRule, RBAC_API_GROUP};
use tracing::info;

pub const PROJECT_ADMIN_TEMPLATE: &str = "project-admin";
pub const RBAC_ADMIN_TEMPLATE: &str = "rbac-admin";

const ADMIN_VERBS: &[&str] = &["get", "list", "watch", "create", "update", "patch", "delete"];

fn owners_template(
    name: &str,
    display_name: &str,
    rules: Vec<PolicyRule>,
) -> OrganizationRoleTemplate {
    OrganizationRoleTemplate::new(
        name,
        OrganizationRoleTemplateSpec {
            scopes: vec![TenantKind::Organization],
            bind_to: vec![BindTo::Owners],
            rules,
            metadata: Some(TemplateDescription {
                display_name: display_name.to_string(),
                description: String::new(),
            }),
        },
    )
}

pub fn project_admin_template() -> OrganizationRoleTemplate {
    owners_template(
        PROJECT_ADMIN_TEMPLATE,
        "Project Admin",
        vec![PolicyRule::resource(&[API_GROUP], &["projects"], ADMIN_VERBS)],
    )
}

pub fn rbac_admin_template() -> OrganizationRoleTemplate {
    let mut role_verbs = ADMIN_VERBS.to_vec();
    role_verbs.push("bind");
    owners_template(
        RBAC_ADMIN_TEMPLATE,
        "RBAC Admin",
        vec![
            PolicyRule::resource(&[RBAC_API_GROUP], &["roles"], &role_verbs),
            PolicyRule::resource(&[RBAC_API_GROUP], &["rolebindings"], ADMIN_VERBS),
        ],
    )
}

pub fn default_templates() -> Vec<OrganizationRoleTemplate> {
    vec![project_admin_template(), rbac_admin_template()]
}

/// Creates any missing default template. A template that already exists,
/// including one created concurrently, counts as success.
pub async fn ensure_default_templates(client: &Client) -> StoreResult<()> {
    for template in default_templates() {
        let key = template.key();
        if client.find::<OrganizationRoleTemplate>(&key).await?.is_some() {
            continue;
        }
        match client.create(template).await {
            Ok(_) => info!(template = %key.name, "created default organization role template"),
            Err(StoreError::AlreadyExists(_)) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
