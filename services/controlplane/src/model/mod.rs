//! Control-plane data model.
//!
//! # Purpose
//! Defines the tenant, template and RBAC object kinds persisted by the store,
//! their shared metadata and conditions, and the typed `Resource` view used
//! by reconcilers and handlers.
mod condition;
mod meta;
mod namespace;
mod object;
mod organization_role;
pub mod ownership;
mod rbac;
mod selector;
mod templates;
mod tenant;

pub use condition::{
    Condition, ConditionStatus, ConditionType, Conditioned, Phase, REASON_DELETING,
    REASON_SETUP_COMPLETE, Readiness, derive_phase,
};
pub use meta::{ObjectMeta, OwnerReference};
pub use namespace::Namespace;
pub use object::{API_GROUP, Kind, Object, ObjectKey, Resource};
pub use organization_role::{OrganizationRole, OrganizationRoleSpec, OrganizationRoleStatus};
pub use rbac::{Role, RoleBinding, RoleRef};
pub use selector::{LabelSelector, LabelSelectorRequirement, SelectorOperator, selects};
pub use templates::{
    BindTo, OrganizationRoleTemplate, OrganizationRoleTemplateSpec, ProjectRoleTemplate,
    ProjectRoleTemplateSpec, RoleTemplateStatus, RoleTemplateTarget, TemplateDescription,
    TenantKind,
};
pub use tenant::{
    Organization, OrganizationSpec, Project, ProjectSpec, TenantSpec, TenantStatus,
};
