use serde::{Deserialize, Serialize};
use std::fmt;

pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "User",
            SubjectKind::Group => "Group",
            SubjectKind::ServiceAccount => "ServiceAccount",
        }
    }
}

/// Reference to an identity that can own or be a member of a tenant.
///
/// `namespace` is only meaningful for service accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_group: String,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
            namespace: None,
            api_group: RBAC_API_GROUP.to_string(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            name: name.into(),
            namespace: None,
            api_group: RBAC_API_GROUP.to_string(),
        }
    }

    pub fn service_account(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::ServiceAccount,
            name: name.into(),
            namespace: Some(namespace.into()),
            api_group: String::new(),
        }
    }

    /// Stable textual form used for ordering and deduplication.
    pub fn canonical(&self) -> String {
        format!(
            "{}:{}:{}/{}",
            self.kind.as_str(),
            self.api_group,
            self.namespace.as_deref().unwrap_or_default(),
            self.name
        )
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Sort subjects by canonical form and drop duplicates.
pub fn normalize_subjects(subjects: impl IntoIterator<Item = Subject>) -> Vec<Subject> {
    let mut subjects: Vec<Subject> = subjects.into_iter().collect();
    subjects.sort_by_cached_key(Subject::canonical);
    subjects.dedup_by(|a, b| a.canonical() == b.canonical());
    subjects
}
