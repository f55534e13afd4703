use crate::model::{Kind, Object};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "object")]
pub enum WatchEvent {
    Added(Object),
    Modified(Object),
    Deleted(Object),
    /// Terminal; the consumer must re-list.
    Error(String),
}

impl WatchEvent {
    pub fn object(&self) -> Option<&Object> {
        match self {
            WatchEvent::Added(object)
            | WatchEvent::Modified(object)
            | WatchEvent::Deleted(object) => Some(object),
            WatchEvent::Error(_) => None,
        }
    }

    pub fn kind(&self) -> Option<Kind> {
        self.object().map(Object::kind)
    }

    pub fn resource_version(&self) -> Option<u64> {
        self.object().map(|object| object.meta().resource_version)
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "ADDED",
            WatchEvent::Modified(_) => "MODIFIED",
            WatchEvent::Deleted(_) => "DELETED",
            WatchEvent::Error(_) => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchFilter {
    pub kind: Option<Kind>,
    pub namespace: Option<String>,
}

impl WatchFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kind(kind: Kind) -> Self {
        Self {
            kind: Some(kind),
            namespace: None,
        }
    }

    pub fn in_namespace(kind: Kind, namespace: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            namespace: Some(namespace.into()),
        }
    }

    pub fn matches(&self, event: &WatchEvent) -> bool {
        let Some(object) = event.object() else {
            return true;
        };
        if self.kind.is_some_and(|kind| kind != object.kind()) {
            return false;
        }
        match &self.namespace {
            Some(namespace) => object.meta().namespace.as_deref() == Some(namespace.as_str()),
            None => true,
        }
    }
}

/// Replayed backlog followed by live events.
///
/// A watcher that falls further behind than the live buffer receives one
/// `Error` event and then the stream ends.
pub struct WatchStream {
    backlog: VecDeque<WatchEvent>,
    live: broadcast::Receiver<WatchEvent>,
    filter: WatchFilter,
    last_seen: u64,
    done: bool,
}

impl WatchStream {
    pub(crate) fn new(
        backlog: Vec<WatchEvent>,
        live: broadcast::Receiver<WatchEvent>,
        filter: WatchFilter,
        last_seen: u64,
    ) -> Self {
        Self {
            backlog: backlog.into_iter().filter(|event| filter.matches(event)).collect(),
            live,
            filter,
            last_seen,
            done: false,
        }
    }

    pub async fn next(&mut self) -> Option<WatchEvent> {
        if self.done {
            return None;
        }
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        loop {
            match self.live.recv().await {
                Ok(event) => {
                    if let Some(version) = event.resource_version() {
                        if version <= self.last_seen {
                            continue;
                        }
                        self.last_seen = version;
                    }
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    self.done = true;
                    return Some(WatchEvent::Error(format!(
                        "watch fell behind by {skipped} events; list again and restart the watch"
                    )));
                }
                Err(RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
