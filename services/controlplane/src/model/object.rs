//! Kind registry, object keys and the closed set of stored objects.
//!
//! # Purpose
//! The store persists `Object` values; reconcilers and handlers work with the
//! concrete types through the `Resource` trait, which converts between the two
//! without any runtime type lookup.
use crate::model::{
    Namespace, ObjectMeta, Organization, OrganizationRole, OrganizationRoleTemplate, Project,
    ProjectRoleTemplate, Role, RoleBinding,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API group of the tenant kinds.
pub const API_GROUP: &str = "tenantry.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Namespace,
    Organization,
    Project,
    OrganizationRoleTemplate,
    ProjectRoleTemplate,
    OrganizationRole,
    Role,
    RoleBinding,
}

impl Kind {
    pub const ALL: [Kind; 8] = [
        Kind::Namespace,
        Kind::Organization,
        Kind::Project,
        Kind::OrganizationRoleTemplate,
        Kind::ProjectRoleTemplate,
        Kind::OrganizationRole,
        Kind::Role,
        Kind::RoleBinding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Namespace => "Namespace",
            Kind::Organization => "Organization",
            Kind::Project => "Project",
            Kind::OrganizationRoleTemplate => "OrganizationRoleTemplate",
            Kind::ProjectRoleTemplate => "ProjectRoleTemplate",
            Kind::OrganizationRole => "OrganizationRole",
            Kind::Role => "Role",
            Kind::RoleBinding => "RoleBinding",
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            Kind::Namespace | Kind::Organization | Kind::OrganizationRoleTemplate
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a stored object; doubles as a reconcile request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: Kind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: Kind, namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace,
            name: name.into(),
        }
    }

    pub fn cluster(kind: Kind, name: impl Into<String>) -> Self {
        Self::new(kind, None, name)
    }

    pub fn namespaced(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(kind, Some(namespace.into()), name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {}/{}", self.kind, namespace, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    Namespace(Namespace),
    Organization(Organization),
    Project(Project),
    OrganizationRoleTemplate(OrganizationRoleTemplate),
    ProjectRoleTemplate(ProjectRoleTemplate),
    OrganizationRole(OrganizationRole),
    Role(Role),
    RoleBinding(RoleBinding),
}

macro_rules! each_object {
    ($object:expr, $inner:ident => $body:expr) => {
        match $object {
            Object::Namespace($inner) => $body,
            Object::Organization($inner) => $body,
            Object::Project($inner) => $body,
            Object::OrganizationRoleTemplate($inner) => $body,
            Object::ProjectRoleTemplate($inner) => $body,
            Object::OrganizationRole($inner) => $body,
            Object::Role($inner) => $body,
            Object::RoleBinding($inner) => $body,
        }
    };
}

macro_rules! same_kind {
    ($left:expr, $right:expr, $a:ident, $b:ident => $body:expr, $otherwise:expr) => {
        match ($left, $right) {
            (Object::Namespace($a), Object::Namespace($b)) => $body,
            (Object::Organization($a), Object::Organization($b)) => $body,
            (Object::Project($a), Object::Project($b)) => $body,
            (Object::OrganizationRoleTemplate($a), Object::OrganizationRoleTemplate($b)) => $body,
            (Object::ProjectRoleTemplate($a), Object::ProjectRoleTemplate($b)) => $body,
            (Object::OrganizationRole($a), Object::OrganizationRole($b)) => $body,
            (Object::Role($a), Object::Role($b)) => $body,
            (Object::RoleBinding($a), Object::RoleBinding($b)) => $body,
            _ => $otherwise,
        }
    };
}

impl Object {
    pub fn kind(&self) -> Kind {
        each_object!(self, inner => inner.kind())
    }

    pub fn meta(&self) -> &ObjectMeta {
        each_object!(self, inner => inner.meta())
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        each_object!(self, inner => inner.meta_mut())
    }

    pub fn key(&self) -> ObjectKey {
        each_object!(self, inner => inner.key())
    }

    /// `false` when the kinds differ.
    pub fn spec_eq(&self, other: &Object) -> bool {
        same_kind!(self, other, a, b => a.spec_eq(b), false)
    }

    /// Replace this object's status with `other`'s; no-op across kinds.
    pub fn copy_status_from(&mut self, other: &Object) {
        same_kind!(self, other, a, b => a.copy_status_from(b), ())
    }

    pub fn reset_status(&mut self) {
        each_object!(self, inner => inner.reset_status())
    }

    pub fn downcast<T: Resource>(self) -> Option<T> {
        T::from_object(self)
    }
}

/// Typed view of one stored kind.
pub trait Resource:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: Kind;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
    fn into_object(self) -> Object;
    fn from_object(object: Object) -> Option<Self>;
    fn spec_eq(&self, other: &Self) -> bool;
    fn copy_spec_from(&mut self, other: &Self);

    fn copy_status_from(&mut self, _other: &Self) {}

    fn reset_status(&mut self) {}

    fn kind(&self) -> Kind {
        Self::KIND
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(
            Self::KIND,
            self.meta().namespace.clone(),
            self.meta().name.clone(),
        )
    }
}

macro_rules! resource_with_status {
    ($ty:ident) => {
        impl Resource for $ty {
            const KIND: Kind = Kind::$ty;

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }

            fn into_object(self) -> Object {
                Object::$ty(self)
            }

            fn from_object(object: Object) -> Option<Self> {
                match object {
                    Object::$ty(value) => Some(value),
                    _ => None,
                }
            }

            fn spec_eq(&self, other: &Self) -> bool {
                self.spec == other.spec
            }

            fn copy_spec_from(&mut self, other: &Self) {
                self.spec = other.spec.clone();
            }

            fn copy_status_from(&mut self, other: &Self) {
                self.status = other.status.clone();
            }

            fn reset_status(&mut self) {
                self.status = Default::default();
            }
        }
    };
}

macro_rules! plain_resource {
    ($ty:ident $(, $field:ident)*) => {
        impl Resource for $ty {
            const KIND: Kind = Kind::$ty;

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }

            fn into_object(self) -> Object {
                Object::$ty(self)
            }

            fn from_object(object: Object) -> Option<Self> {
                match object {
                    Object::$ty(value) => Some(value),
                    _ => None,
                }
            }

            #[allow(unused_variables)]
            fn spec_eq(&self, other: &Self) -> bool {
                true $(&& self.$field == other.$field)*
            }

            #[allow(unused_variables)]
            fn copy_spec_from(&mut self, other: &Self) {
                $(self.$field = other.$field.clone();)*
            }
        }
    };
}

resource_with_status!(Organization);
resource_with_status!(Project);
resource_with_status!(OrganizationRoleTemplate);
resource_with_status!(ProjectRoleTemplate);
resource_with_status!(OrganizationRole);
plain_resource!(Namespace);
plain_resource!(Role, rules);
plain_resource!(RoleBinding, role_ref, subjects);
