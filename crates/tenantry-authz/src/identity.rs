use serde::{Deserialize, Serialize};

const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountRef {
    pub namespace: String,
    pub name: String,
}

/// Authenticated caller as forwarded by the front proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub service_account: Option<ServiceAccountRef>,
}

impl CallerIdentity {
    /// Build an identity, deriving service-account coordinates from a
    /// `system:serviceaccount:<namespace>:<name>` username.
    pub fn new(username: impl Into<String>, groups: Vec<String>) -> Self {
        let username = username.into();
        let service_account = parse_service_account(&username);
        Self {
            username,
            groups,
            service_account,
        }
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self::new(username, Vec::new())
    }

    /// Name compared against `ServiceAccount` subjects.
    pub fn principal(&self) -> String {
        match &self.service_account {
            Some(account) => service_account_principal(&account.namespace, &account.name),
            None => self.username.clone(),
        }
    }
}

pub(crate) fn service_account_principal(namespace: &str, name: &str) -> String {
    format!("{SERVICE_ACCOUNT_PREFIX}{namespace}:{name}")
}

fn parse_service_account(username: &str) -> Option<ServiceAccountRef> {
    let rest = username.strip_prefix(SERVICE_ACCOUNT_PREFIX)?;
    let (namespace, name) = rest.split_once(':')?;
    if namespace.is_empty() || name.is_empty() || name.contains(':') {
        return None;
    }
    Some(ServiceAccountRef {
        namespace: namespace.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_coordinates_are_parsed() {
        let caller = CallerIdentity::user("system:serviceaccount:ci:deployer");
        assert_eq!(
            caller.service_account,
            Some(ServiceAccountRef {
                namespace: "ci".to_string(),
                name: "deployer".to_string(),
            })
        );
        assert_eq!(caller.principal(), "system:serviceaccount:ci:deployer");
    }

    #[test]
    fn plain_users_have_no_service_account() {
        assert_eq!(CallerIdentity::user("alice").service_account, None);
        assert_eq!(CallerIdentity::user("system:serviceaccount:ci").service_account, None);
        assert_eq!(
            CallerIdentity::user("system:serviceaccount:ci:a:b").service_account,
            None
        );
    }
}
