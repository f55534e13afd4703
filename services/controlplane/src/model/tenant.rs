//! Organization and Project, the two tenant tiers.
//!
//! # Purpose
//! Both tiers share the same spec and status shapes: owners are authored by
//! users, while the namespace reference and the member list are computed by
//! their reconcilers.
//!
//! # Key invariants
//! - `spec.owners` is non-empty.
//! - `status.members` always contains every owner once reconciled.
use crate::model::condition::{Conditioned, Readiness};
use crate::model::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use tenantry_authz::{Ownable, Subject};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    pub owners: Vec<Subject>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Subject>,
    #[serde(flatten)]
    pub readiness: Readiness,
}

pub type OrganizationSpec = TenantSpec;
pub type ProjectSpec = TenantSpec;

/// Cluster-scoped top-level tenant. Its namespace carries its own name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub metadata: ObjectMeta,
    pub spec: OrganizationSpec,
    #[serde(default)]
    pub status: TenantStatus,
}

/// Sub-tenant living in its organization's namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub metadata: ObjectMeta,
    pub spec: ProjectSpec,
    #[serde(default)]
    pub status: TenantStatus,
}

impl Organization {
    pub fn new(name: impl Into<String>, owners: Vec<Subject>) -> Self {
        Self {
            metadata: ObjectMeta::cluster(name),
            spec: TenantSpec {
                owners,
                ..TenantSpec::default()
            },
            status: TenantStatus::default(),
        }
    }
}

impl Project {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, owners: Vec<Subject>) -> Self {
        Self {
            metadata: ObjectMeta::namespaced(namespace, name),
            spec: TenantSpec {
                owners,
                ..TenantSpec::default()
            },
            status: TenantStatus::default(),
        }
    }

    /// Namespace of the owning organization.
    pub fn organization_namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }
}

macro_rules! tenant_impls {
    ($ty:ident, $resource:literal) => {
        impl Conditioned for $ty {
            fn readiness(&self) -> &Readiness {
                &self.status.readiness
            }

            fn readiness_mut(&mut self) -> &mut Readiness {
                &mut self.status.readiness
            }
        }

        impl Ownable for $ty {
            fn resource(&self) -> &'static str {
                $resource
            }

            fn name(&self) -> &str {
                &self.metadata.name
            }

            fn owners(&self) -> &[Subject] {
                &self.spec.owners
            }

            fn members(&self) -> &[Subject] {
                &self.status.members
            }
        }
    };
}

tenant_impls!(Organization, "organizations");
tenant_impls!(Project, "projects");
