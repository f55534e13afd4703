use crate::model::condition::{Conditioned, Readiness};
use crate::model::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use tenantry_authz::PolicyRule;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRoleSpec {
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRoleStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted_rules: Vec<PolicyRule>,
    #[serde(flatten)]
    pub readiness: Readiness,
}

/// Owner-requested permissions, accepted only within the template ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRole {
    pub metadata: ObjectMeta,
    pub spec: OrganizationRoleSpec,
    #[serde(default)]
    pub status: OrganizationRoleStatus,
}

impl OrganizationRole {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, rules: Vec<PolicyRule>) -> Self {
        Self {
            metadata: ObjectMeta::namespaced(namespace, name),
            spec: OrganizationRoleSpec { rules },
            status: OrganizationRoleStatus::default(),
        }
    }
}

impl Conditioned for OrganizationRole {
    fn readiness(&self) -> &Readiness {
        &self.status.readiness
    }

    fn readiness_mut(&mut self) -> &mut Readiness {
        &mut self.status.readiness
    }
}
