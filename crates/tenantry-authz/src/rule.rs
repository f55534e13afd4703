use serde::{Deserialize, Serialize};

/// Matches every verb, API group, resource or non-resource URL.
pub const WILDCARD: &str = "*";

/// A single RBAC permission grant.
///
/// A rule is either a resource rule (`api_groups` and `resources` set, with
/// optional `resource_names`) or a non-resource rule (`non_resource_urls`
/// set). An empty `resource_names` means "every name".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
    #[serde(
        default,
        rename = "nonResourceURLs",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub non_resource_urls: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl PolicyRule {
    pub fn resource(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> Self {
        Self {
            verbs: owned(verbs),
            api_groups: owned(api_groups),
            resources: owned(resources),
            ..Self::default()
        }
    }

    pub fn non_resource(urls: &[&str], verbs: &[&str]) -> Self {
        Self {
            verbs: owned(verbs),
            non_resource_urls: owned(urls),
            ..Self::default()
        }
    }

    pub fn with_resource_names(mut self, names: &[&str]) -> Self {
        self.resource_names = owned(names);
        self
    }

    pub fn is_resource_rule(&self) -> bool {
        !self.api_groups.is_empty() && !self.resources.is_empty()
    }

    pub fn is_non_resource_rule(&self) -> bool {
        !self.non_resource_urls.is_empty()
    }
}
