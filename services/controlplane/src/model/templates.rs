//! Role templates: administrator-defined permission ceilings that are
//! materialized as a Role and RoleBinding in every matching tenant namespace.
use crate::model::condition::{Conditioned, Readiness};
use crate::model::meta::ObjectMeta;
use crate::model::object::Kind;
use crate::model::selector::LabelSelector;
use serde::{Deserialize, Serialize};
use tenantry_authz::PolicyRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TenantKind {
    Organization,
    Project,
}

impl TenantKind {
    pub fn kind(&self) -> Kind {
        match self {
            TenantKind::Organization => Kind::Organization,
            TenantKind::Project => Kind::Project,
        }
    }

    pub fn from_kind(kind: Kind) -> Option<Self> {
        match kind {
            Kind::Organization => Some(TenantKind::Organization),
            Kind::Project => Some(TenantKind::Project),
            _ => None,
        }
    }
}

/// Which subjects the materialized RoleBinding grants the role to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindTo {
    Owners,
    Everyone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescription {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRoleTemplateSpec {
    #[serde(default)]
    pub scopes: Vec<TenantKind>,
    #[serde(default)]
    pub bind_to: Vec<BindTo>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRoleTemplateSpec {
    #[serde(default)]
    pub bind_to: Vec<BindTo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_selector: Option<LabelSelector>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateDescription>,
}

/// A tenant a template has been materialized into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateTarget {
    pub kind: TenantKind,
    pub api_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    pub observed_generation: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<RoleTemplateTarget>,
    #[serde(flatten)]
    pub readiness: Readiness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRoleTemplate {
    pub metadata: ObjectMeta,
    pub spec: OrganizationRoleTemplateSpec,
    #[serde(default)]
    pub status: RoleTemplateStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRoleTemplate {
    pub metadata: ObjectMeta,
    pub spec: ProjectRoleTemplateSpec,
    #[serde(default)]
    pub status: RoleTemplateStatus,
}

impl OrganizationRoleTemplate {
    pub fn new(name: impl Into<String>, spec: OrganizationRoleTemplateSpec) -> Self {
        Self {
            metadata: ObjectMeta::cluster(name),
            spec,
            status: RoleTemplateStatus::default(),
        }
    }
}

impl ProjectRoleTemplate {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: ProjectRoleTemplateSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::namespaced(namespace, name),
            spec,
            status: RoleTemplateStatus::default(),
        }
    }
}

impl Conditioned for OrganizationRoleTemplate {
    fn readiness(&self) -> &Readiness {
        &self.status.readiness
    }

    fn readiness_mut(&mut self) -> &mut Readiness {
        &mut self.status.readiness
    }
}

impl Conditioned for ProjectRoleTemplate {
    fn readiness(&self) -> &Readiness {
        &self.status.readiness
    }

    fn readiness_mut(&mut self) -> &mut Readiness {
        &mut self.status.readiness
    }
}
