//! Ownership forest over owner references.
//!
//! # Purpose
//! Gives teardown a deterministic order: every dependent is visited before the
//! object that owns it, so nothing is deleted while something it owns remains.
//!
//! # Notes
//! Owner references are user-writable, so the walk tolerates cycles and
//! references to owners that no longer exist.
use crate::model::object::{Object, ObjectKey};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct OwnershipForest {
    // owner uid -> dependents, ordered by key for stable traversal
    dependents: HashMap<String, BTreeMap<ObjectKey, String>>,
}

impl OwnershipForest {
    pub fn build<'a>(objects: impl IntoIterator<Item = &'a Object>) -> Self {
        let mut forest = Self::default();
        for object in objects {
            let meta = object.meta();
            for owner in &meta.owner_references {
                forest
                    .dependents
                    .entry(owner.uid.clone())
                    .or_default()
                    .insert(object.key(), meta.uid.clone());
            }
        }
        forest
    }

    /// Every transitive dependent of `root_uid`, children before parents.
    /// The root itself is not included.
    pub fn teardown_order(&self, root_uid: &str) -> Vec<ObjectKey> {
        let mut order = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(root_uid);
        // (uid, key, children already pushed)
        let mut stack: Vec<(&str, &ObjectKey, bool)> = Vec::new();
        self.push_children(root_uid, &mut stack, &mut visited);
        while let Some((uid, key, expanded)) = stack.pop() {
            if expanded {
                order.push(key.clone());
                continue;
            }
            stack.push((uid, key, true));
            self.push_children(uid, &mut stack, &mut visited);
        }
        order
    }

    fn push_children<'a>(
        &'a self,
        uid: &str,
        stack: &mut Vec<(&'a str, &'a ObjectKey, bool)>,
        visited: &mut HashSet<&'a str>,
    ) {
        let Some(children) = self.dependents.get(uid) else {
            return;
        };
        for (key, child_uid) in children.iter().rev() {
            if visited.insert(child_uid.as_str()) {
                stack.push((child_uid.as_str(), key, false));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Kind, Namespace, OwnerReference, Resource, Role};

    fn owned_by(mut object: Object, owner: &Object) -> Object {
        object.meta_mut().owner_references.push(OwnerReference {
            kind: owner.kind(),
            name: owner.meta().name.clone(),
            namespace: owner.meta().namespace.clone(),
            uid: owner.meta().uid.clone(),
            controller: true,
        });
        object
    }

    fn with_uid(mut object: Object, uid: &str) -> Object {
        object.meta_mut().uid = uid.to_string();
        object
    }

    #[test]
    fn children_come_before_parents() {
        let root = with_uid(Namespace::new("root").into_object(), "root");
        let ns = owned_by(with_uid(Namespace::new("acme").into_object(), "ns"), &root);
        let role = owned_by(
            with_uid(Role::new("acme", "admin", Vec::new()).into_object(), "role"),
            &ns,
        );
        let stray = with_uid(Role::new("other", "admin", Vec::new()).into_object(), "stray");
        let forest = OwnershipForest::build([&root, &ns, &role, &stray]);

        let order = forest.teardown_order("root");
        assert_eq!(
            order,
            vec![
                ObjectKey::namespaced(Kind::Role, "acme", "admin"),
                ObjectKey::cluster(Kind::Namespace, "acme"),
            ]
        );
        assert!(forest.teardown_order("stray").is_empty());
    }

    #[test]
    fn cycles_terminate() {
        let a = with_uid(Namespace::new("a").into_object(), "a");
        let b = owned_by(with_uid(Namespace::new("b").into_object(), "b"), &a);
        let a = owned_by(a, &b);
        let forest = OwnershipForest::build([&a, &b]);
        assert_eq!(
            forest.teardown_order("a"),
            vec![ObjectKey::cluster(Kind::Namespace, "b")]
        );
    }
}
