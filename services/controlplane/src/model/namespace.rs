use crate::model::meta::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Isolation boundary backing a tenant. Deleting one removes its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub metadata: ObjectMeta,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::cluster(name),
        }
    }
}
