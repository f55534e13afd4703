//! Typed access to a `ResourceStore`.
//!
//! # Purpose
//! Converts between concrete kinds and `Object`, and provides the
//! read-modify-write helpers that reconcilers use: the mutation is re-applied
//! to a fresh read whenever the write loses an optimistic-concurrency race,
//! and nothing is written when the mutation changes nothing.
use super::{ResourceStore, StoreError, StoreResult, WatchFilter, WatchStream};
use crate::model::{Object, ObjectKey, Resource};
use anyhow::anyhow;
use std::sync::Arc;

const CONFLICT_RETRIES: usize = 5;

#[derive(Clone)]
pub struct Client {
    store: Arc<dyn ResourceStore>,
}

fn downcast<T: Resource>(object: Object) -> StoreResult<T> {
    let kind = object.kind();
    T::from_object(object).ok_or_else(|| {
        StoreError::Unexpected(anyhow!("store returned {kind} where {} was expected", T::KIND))
    })
}

impl Client {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    pub async fn get<T: Resource>(&self, namespace: Option<&str>, name: &str) -> StoreResult<T> {
        let key = ObjectKey::new(T::KIND, namespace.map(str::to_string), name);
        self.fetch(&key).await
    }

    pub async fn fetch<T: Resource>(&self, key: &ObjectKey) -> StoreResult<T> {
        downcast(self.store.get(key).await?)
    }

    /// Like `fetch`, with `NotFound` mapped to `None`.
    pub async fn find<T: Resource>(&self, key: &ObjectKey) -> StoreResult<Option<T>> {
        match self.fetch(key).await {
            Ok(object) => Ok(Some(object)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn list<T: Resource>(&self, namespace: Option<&str>) -> StoreResult<Vec<T>> {
        self.store
            .list(T::KIND, namespace)
            .await?
            .into_iter()
            .map(downcast)
            .collect()
    }

    pub async fn list_versioned<T: Resource>(
        &self,
        namespace: Option<&str>,
    ) -> StoreResult<(Vec<T>, u64)> {
        let (objects, version) = self.store.list_versioned(T::KIND, namespace).await?;
        let items = objects.into_iter().map(downcast).collect::<StoreResult<_>>()?;
        Ok((items, version))
    }

    pub async fn create<T: Resource>(&self, object: T) -> StoreResult<T> {
        downcast(self.store.create(object.into_object()).await?)
    }

    pub async fn update<T: Resource>(&self, object: T) -> StoreResult<T> {
        downcast(self.store.update(object.into_object()).await?)
    }

    pub async fn update_status<T: Resource>(&self, object: T) -> StoreResult<T> {
        downcast(self.store.update_status(object.into_object()).await?)
    }

    pub async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        self.store.delete(key).await
    }

    pub async fn watch(&self, filter: WatchFilter, since: Option<u64>) -> StoreResult<WatchStream> {
        self.store.watch(filter, since).await
    }

    /// Apply `mutate` to metadata/spec and write it, retrying on conflict.
    pub async fn modify<T, F>(&self, key: &ObjectKey, mutate: F) -> StoreResult<T>
    where
        T: Resource,
        F: FnMut(&mut T) + Send,
    {
        self.read_modify_write(key, mutate, false).await
    }

    /// Apply `mutate` to status and write it, retrying on conflict.
    pub async fn modify_status<T, F>(&self, key: &ObjectKey, mutate: F) -> StoreResult<T>
    where
        T: Resource,
        F: FnMut(&mut T) + Send,
    {
        self.read_modify_write(key, mutate, true).await
    }

    async fn read_modify_write<T, F>(
        &self,
        key: &ObjectKey,
        mut mutate: F,
        status: bool,
    ) -> StoreResult<T>
    where
        T: Resource,
        F: FnMut(&mut T) + Send,
    {
        let mut attempt = 0;
        loop {
            let current: T = self.fetch(key).await?;
            let mut next = current.clone();
            mutate(&mut next);
            if next == current {
                return Ok(current);
            }
            let written = if status {
                self.update_status(next).await
            } else {
                self.update(next).await
            };
            match written {
                Err(StoreError::Conflict(message)) if attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(%key, attempt, %message, "write conflict; retrying on a fresh read");
                }
                other => return other,
            }
        }
    }
}
