//! Object metadata shared by every stored kind.
use crate::model::object::{Kind, ObjectKey, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Points from a dependent to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: Kind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
}

impl OwnerReference {
    /// Controlling reference to `owner`.
    pub fn controlled_by<T: Resource>(owner: &T) -> Self {
        let meta = owner.meta();
        Self {
            kind: T::KIND,
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            uid: meta.uid.clone(),
            controller: true,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind, self.namespace.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|value| value == finalizer)
    }

    /// Returns `true` when the finalizer was not present before.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Returns `true` when the finalizer was present.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|value| value != finalizer);
        before != self.finalizers.len()
    }

    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|owner| owner.controller)
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_references.iter().any(|owner| owner.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizer_helpers_report_changes() {
        let mut meta = ObjectMeta::cluster("acme");
        assert!(meta.add_finalizer("a/b"));
        assert!(!meta.add_finalizer("a/b"));
        assert!(meta.has_finalizer("a/b"));
        assert!(meta.remove_finalizer("a/b"));
        assert!(!meta.remove_finalizer("a/b"));
        assert!(meta.finalizers.is_empty());
    }

    #[test]
    fn controller_ref_picks_controlling_owner() {
        let mut meta = ObjectMeta::namespaced("acme", "admin");
        meta.owner_references.push(OwnerReference {
            kind: Kind::OrganizationRoleTemplate,
            name: "viewer".to_string(),
            namespace: None,
            uid: "u-1".to_string(),
            controller: false,
        });
        meta.owner_references.push(OwnerReference {
            kind: Kind::Organization,
            name: "acme".to_string(),
            namespace: None,
            uid: "u-2".to_string(),
            controller: true,
        });
        assert_eq!(meta.controller_ref().map(|owner| owner.uid.as_str()), Some("u-2"));
        assert!(meta.is_owned_by("u-1"));
        assert!(!meta.is_owned_by("u-3"));
    }
}
