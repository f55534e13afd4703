//! In-memory implementation of the resource store.
//!
//! # Purpose
//! Implements `ResourceStore` with a single `BTreeMap` of objects guarded by a
//! `tokio::sync::RwLock`. It backs local development, tests and single-replica
//! deployments where durability is not required.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - Every write takes the write lock, assigns the next resource version from
//!   the change log and broadcasts its events before releasing the lock, so
//!   watchers observe writes in version order.
//!
//! # Change stream
//! The change log keeps the most recent `StoreConfig::change_window` events.
//! `watch(since)` replays retained events newer than `since`; a `since` that
//! has already been evicted is rejected with `StoreError::Expired` and the
//! caller must list again.
//!
//! # Deletion
//! - Objects with finalizers are only marked with a deletion timestamp; the
//!   update that clears the last finalizer removes them.
//! - Removing an object deletes every object that lists it as an owner.
//! - Deleting a namespace deletes its contents; the namespace itself goes away
//!   once it is empty.
//! Cascades scan the whole map, which is fine at in-memory scale.
use super::{
    ResourceStore, StoreConfig, StoreError, StoreResult, WatchEvent, WatchFilter, WatchStream,
};
use crate::model::{Kind, Object, ObjectKey};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Bounded log of change events keyed by resource version.
///
/// Versions start at 1 so that 0 never names a stored state.
#[derive(Debug)]
struct ChangeLog<T> {
    next_seq: u64,
    capacity: usize,
    items: VecDeque<(u64, T)>,
}

impl<T: Clone> ChangeLog<T> {
    fn new(capacity: usize) -> Self {
        Self {
            next_seq: 1,
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    fn record(&mut self, item: impl FnOnce(u64) -> T) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.push_back((seq, item(seq)));
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
        seq
    }

    fn last(&self) -> Option<&T> {
        self.items.back().map(|(_, item)| item)
    }

    fn latest_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Events after `since`, or `None` if some of them were evicted.
    fn since(&self, since: u64) -> Option<Vec<T>> {
        if let Some((oldest, _)) = self.items.front() {
            if since.saturating_add(1) < *oldest {
                return None;
            }
        }
        Some(
            self.items
                .iter()
                .filter(|(seq, _)| *seq > since)
                .map(|(_, item)| item.clone())
                .collect(),
        )
    }
}

struct State {
    objects: BTreeMap<ObjectKey, Object>,
    log: ChangeLog<WatchEvent>,
}

impl State {
    fn record(
        &mut self,
        pending: &mut Vec<WatchEvent>,
        event: impl FnOnce(u64) -> WatchEvent,
    ) -> u64 {
        let seq = self.log.record(event);
        if let Some(event) = self.log.last() {
            pending.push(event.clone());
        }
        seq
    }

    fn put(&mut self, mut object: Object, added: bool, pending: &mut Vec<WatchEvent>) -> Object {
        self.record(pending, |seq| {
            object.meta_mut().resource_version = seq;
            if added {
                WatchEvent::Added(object.clone())
            } else {
                WatchEvent::Modified(object.clone())
            }
        });
        self.objects.insert(object.key(), object.clone());
        object
    }

    fn select(&self, kind: Kind, namespace: Option<&str>) -> Vec<Object> {
        self.objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.is_none() || key.namespace.as_deref() == namespace)
            .map(|(_, object)| object.clone())
            .collect()
    }

    fn existing(&self, key: &ObjectKey) -> StoreResult<&Object> {
        self.objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn check_version(existing: &Object, incoming: &Object) -> StoreResult<()> {
        let stored = existing.meta().resource_version;
        let given = incoming.meta().resource_version;
        if stored != given {
            return Err(StoreError::Conflict(format!(
                "{} was modified (resource version {given}, current {stored})",
                existing.key()
            )));
        }
        Ok(())
    }

    fn check_scope(object: &Object) -> StoreResult<()> {
        let meta = object.meta();
        if meta.name.is_empty() {
            return Err(StoreError::Invalid("metadata.name is required".to_string()));
        }
        match (object.kind().is_namespaced(), meta.namespace.as_deref()) {
            (true, None) | (true, Some("")) => Err(StoreError::Invalid(format!(
                "{} objects require metadata.namespace",
                object.kind()
            ))),
            (false, Some(_)) => Err(StoreError::Invalid(format!(
                "{} objects are cluster-scoped",
                object.kind()
            ))),
            _ => Ok(()),
        }
    }

    fn check_namespace_open(&self, namespace: &str) -> StoreResult<()> {
        let key = ObjectKey::cluster(Kind::Namespace, namespace);
        let Some(object) = self.objects.get(&key) else {
            return Err(StoreError::NotFound(key.to_string()));
        };
        if object.meta().is_terminating() {
            return Err(StoreError::Invalid(format!(
                "namespace {namespace} is being terminated"
            )));
        }
        Ok(())
    }

    fn create(&mut self, mut object: Object, pending: &mut Vec<WatchEvent>) -> StoreResult<Object> {
        Self::check_scope(&object)?;
        let key = object.key();
        if self.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        if let Some(namespace) = &key.namespace {
            self.check_namespace_open(namespace)?;
        }
        object.reset_status();
        let meta = object.meta_mut();
        meta.uid = uuid::Uuid::new_v4().to_string();
        meta.creation_timestamp = Some(Utc::now());
        meta.deletion_timestamp = None;
        meta.generation = 1;
        Ok(self.put(object, true, pending))
    }

    fn update(&mut self, object: Object, pending: &mut Vec<WatchEvent>) -> StoreResult<Object> {
        let key = object.key();
        let existing = self.existing(&key)?.clone();
        Self::check_version(&existing, &object)?;

        let mut next = object;
        next.copy_status_from(&existing);
        {
            let prior = existing.meta();
            let generation = if next.spec_eq(&existing) {
                prior.generation
            } else {
                prior.generation + 1
            };
            let meta = next.meta_mut();
            meta.uid = prior.uid.clone();
            meta.creation_timestamp = prior.creation_timestamp;
            meta.deletion_timestamp = prior.deletion_timestamp;
            meta.generation = generation;
        }
        if next == existing {
            return Ok(existing);
        }

        let finished = next.meta().is_terminating()
            && next.meta().finalizers.is_empty()
            && !(key.kind == Kind::Namespace && self.namespace_has_contents(&key.name));
        if finished {
            self.objects.insert(key.clone(), next);
            return Ok(self.remove_object(&key, pending).unwrap_or(existing));
        }
        Ok(self.put(next, false, pending))
    }

    fn update_status(
        &mut self,
        object: Object,
        pending: &mut Vec<WatchEvent>,
    ) -> StoreResult<Object> {
        let key = object.key();
        let existing = self.existing(&key)?.clone();
        Self::check_version(&existing, &object)?;
        let mut next = existing.clone();
        next.copy_status_from(&object);
        if next == existing {
            return Ok(existing);
        }
        Ok(self.put(next, false, pending))
    }

    fn delete_object(&mut self, key: &ObjectKey, pending: &mut Vec<WatchEvent>) -> StoreResult<()> {
        let existing = self.existing(key)?.clone();
        let is_namespace = key.kind == Kind::Namespace;
        let blocked = !existing.meta().finalizers.is_empty()
            || (is_namespace && self.namespace_has_contents(&key.name));
        if !blocked {
            self.remove_object(key, pending);
            return Ok(());
        }
        if !existing.meta().is_terminating() {
            let mut marked = existing;
            marked.meta_mut().deletion_timestamp = Some(Utc::now());
            self.put(marked, false, pending);
        }
        if is_namespace {
            let contents: Vec<ObjectKey> = self
                .objects
                .keys()
                .filter(|child| child.namespace.as_deref() == Some(key.name.as_str()))
                .cloned()
                .collect();
            for child in contents {
                if self.objects.contains_key(&child) {
                    self.delete_object(&child, pending)?;
                }
            }
            self.release_namespace(&key.name, pending);
        }
        Ok(())
    }

    fn remove_object(&mut self, key: &ObjectKey, pending: &mut Vec<WatchEvent>) -> Option<Object> {
        let mut removed = self.objects.remove(key)?;
        self.record(pending, |seq| {
            removed.meta_mut().resource_version = seq;
            WatchEvent::Deleted(removed.clone())
        });

        let uid = removed.meta().uid.clone();
        let dependents: Vec<ObjectKey> = self
            .objects
            .values()
            .filter(|object| object.meta().is_owned_by(&uid))
            .map(Object::key)
            .collect();
        for dependent in dependents {
            if self.objects.contains_key(&dependent) {
                // Only NotFound can come back here and the key was just checked.
                let _ = self.delete_object(&dependent, pending);
            }
        }
        if let Some(namespace) = &key.namespace {
            self.release_namespace(namespace, pending);
        }
        Some(removed)
    }

    fn release_namespace(&mut self, name: &str, pending: &mut Vec<WatchEvent>) {
        let key = ObjectKey::cluster(Kind::Namespace, name);
        let releasable = self.objects.get(&key).is_some_and(|namespace| {
            namespace.meta().is_terminating() && namespace.meta().finalizers.is_empty()
        }) && !self.namespace_has_contents(name);
        if releasable {
            self.remove_object(&key, pending);
        }
    }

    fn namespace_has_contents(&self, name: &str) -> bool {
        self.objects
            .keys()
            .any(|key| key.namespace.as_deref() == Some(name))
    }

    fn publish_counts(&self) {
        for kind in Kind::ALL {
            let count = self.objects.keys().filter(|key| key.kind == kind).count();
            metrics::gauge!("tenantry_store_objects", "kind" => kind.as_str()).set(count as f64);
        }
    }
}

/// In-memory resource store.
///
/// Cloning shares the same state and change feed.
#[derive(Clone)]
pub struct InMemoryStore {
    config: StoreConfig,
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<WatchEvent>,
}

impl InMemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(config.watch_buffer.max(1));
        let state = State {
            objects: BTreeMap::new(),
            log: ChangeLog::new(config.change_window()),
        };
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
            events,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn write<T>(
        &self,
        op: impl FnOnce(&mut State, &mut Vec<WatchEvent>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut state = self.state.write().await;
        let mut pending = Vec::new();
        let result = op(&mut *state, &mut pending);
        if !pending.is_empty() {
            for event in pending {
                // No receivers is fine; the change log still has the event.
                let _ = self.events.send(event);
            }
            state.publish_counts();
        }
        result
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Object> {
        let state = self.state.read().await;
        state.existing(key).cloned()
    }

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> StoreResult<Vec<Object>> {
        let state = self.state.read().await;
        Ok(state.select(kind, namespace))
    }

    async fn list_versioned(
        &self,
        kind: Kind,
        namespace: Option<&str>,
    ) -> StoreResult<(Vec<Object>, u64)> {
        let state = self.state.read().await;
        Ok((state.select(kind, namespace), state.log.latest_seq()))
    }

    async fn create(&self, object: Object) -> StoreResult<Object> {
        self.write(|state, pending| state.create(object, pending))
            .await
    }

    async fn update(&self, object: Object) -> StoreResult<Object> {
        self.write(|state, pending| state.update(object, pending))
            .await
    }

    async fn update_status(&self, object: Object) -> StoreResult<Object> {
        self.write(|state, pending| state.update_status(object, pending))
            .await
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        self.write(|state, pending| state.delete_object(key, pending))
            .await
    }

    async fn watch(&self, filter: WatchFilter, since: Option<u64>) -> StoreResult<WatchStream> {
        let state = self.state.read().await;
        let live = self.events.subscribe();
        let last_seen = state.log.latest_seq();
        let backlog = match since {
            None => Vec::new(),
            Some(since) => state.log.since(since).ok_or_else(|| {
                StoreError::Expired(format!("resource version {since} is no longer retained"))
            })?,
        };
        Ok(WatchStream::new(backlog, live, filter, last_seen))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
