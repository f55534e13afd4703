//! Ownership and membership checks for tenant objects.
//!
//! # Purpose
//! Decides whether a caller may see or mutate a tenant. Visibility requires the
//! caller to match a subject in `owners ∪ members`; mutation additionally
//! requires a match in `owners`.
//!
//! # Security considerations
//! - Non-members receive `NotFound` so a tenant's existence is not disclosed.
//! - Owners are always visible to themselves, even before the membership
//!   status has been computed.
//! - A request without identity is admitted and logged. Deployments must run
//!   behind an authenticating proxy.
use crate::errors::{AccessError, AccessResult};
use crate::identity::{CallerIdentity, service_account_principal};
use crate::subject::{Subject, SubjectKind};

/// A tenant object with owners and members.
pub trait Ownable {
    /// Plural resource name used in error messages, e.g. `organizations`.
    fn resource(&self) -> &'static str;
    fn name(&self) -> &str;
    fn owners(&self) -> &[Subject];
    fn members(&self) -> &[Subject];
}

pub fn is_member<T: Ownable + ?Sized>(caller: Option<&CallerIdentity>, object: &T) -> bool {
    contains_caller(caller, object.owners().iter().chain(object.members()))
}

pub fn is_owner<T: Ownable + ?Sized>(caller: Option<&CallerIdentity>, object: &T) -> bool {
    contains_caller(caller, object.owners())
}

/// `NotFound` unless the caller is an owner or member.
pub fn check_membership<T: Ownable + ?Sized>(
    caller: Option<&CallerIdentity>,
    object: &T,
) -> AccessResult<()> {
    if is_member(caller, object) {
        return Ok(());
    }
    Err(AccessError::NotFound {
        resource: object.resource().to_string(),
        name: object.name().to_string(),
    })
}

/// `NotFound` for non-members, `Forbidden` for members that are not owners.
pub fn check_ownership<T: Ownable + ?Sized>(
    caller: Option<&CallerIdentity>,
    object: &T,
    verb: &str,
) -> AccessResult<()> {
    check_membership(caller, object)?;
    if is_owner(caller, object) {
        return Ok(());
    }
    Err(AccessError::Forbidden {
        resource: object.resource().to_string(),
        name: object.name().to_string(),
        verb: verb.to_string(),
    })
}

/// Creators must list themselves among the owners of what they create.
pub fn check_creator_is_owner<T: Ownable + ?Sized>(
    caller: Option<&CallerIdentity>,
    object: &T,
) -> AccessResult<()> {
    if is_owner(caller, object) {
        return Ok(());
    }
    Err(AccessError::BadRequest(format!(
        "cannot create {} \"{}\" you're not the owner of",
        object.resource(),
        object.name()
    )))
}

fn contains_caller<'a>(
    caller: Option<&CallerIdentity>,
    subjects: impl IntoIterator<Item = &'a Subject>,
) -> bool {
    let Some(caller) = caller else {
        tracing::warn!("request has no caller identity; admitting it without a membership check");
        return true;
    };
    subjects
        .into_iter()
        .any(|subject| matches_subject(caller, subject))
}

fn matches_subject(caller: &CallerIdentity, subject: &Subject) -> bool {
    match subject.kind {
        SubjectKind::User => subject.name == caller.username,
        SubjectKind::Group => caller.groups.iter().any(|group| *group == subject.name),
        SubjectKind::ServiceAccount => {
            let namespace = subject.namespace.as_deref().unwrap_or_default();
            service_account_principal(namespace, &subject.name) == caller.principal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tenant {
        owners: Vec<Subject>,
        members: Vec<Subject>,
    }

    impl Ownable for Tenant {
        fn resource(&self) -> &'static str {
            "organizations"
        }

        fn name(&self) -> &str {
            "acme"
        }

        fn owners(&self) -> &[Subject] {
            &self.owners
        }

        fn members(&self) -> &[Subject] {
            &self.members
        }
    }

    fn tenant() -> Tenant {
        Tenant {
            owners: vec![Subject::user("alice")],
            members: vec![
                Subject::user("alice"),
                Subject::group("auditors"),
                Subject::service_account("ci", "deployer"),
            ],
        }
    }

    #[test]
    fn owners_members_and_strangers() {
        let tenant = tenant();
        let alice = CallerIdentity::user("alice");
        let bob = CallerIdentity::user("bob");
        assert!(is_member(Some(&alice), &tenant));
        assert!(is_owner(Some(&alice), &tenant));
        assert!(!is_member(Some(&bob), &tenant));
        assert!(!is_owner(Some(&bob), &tenant));
    }

    #[test]
    fn owners_are_visible_before_members_are_computed() {
        let tenant = Tenant {
            owners: vec![Subject::user("alice")],
            members: Vec::new(),
        };
        assert!(check_membership(Some(&CallerIdentity::user("alice")), &tenant).is_ok());
    }

    #[test]
    fn group_and_service_account_subjects_match() {
        let tenant = tenant();
        let auditor = CallerIdentity::new("carol", vec!["auditors".to_string()]);
        assert!(is_member(Some(&auditor), &tenant));

        let robot = CallerIdentity::user("system:serviceaccount:ci:deployer");
        assert!(is_member(Some(&robot), &tenant));

        let other_robot = CallerIdentity::user("system:serviceaccount:prod:deployer");
        assert!(!is_member(Some(&other_robot), &tenant));
    }

    #[test]
    fn user_subject_does_not_match_group_of_same_name() {
        let tenant = Tenant {
            owners: vec![Subject::group("alice")],
            members: Vec::new(),
        };
        assert!(!is_member(Some(&CallerIdentity::user("alice")), &tenant));
    }

    #[test]
    fn missing_identity_fails_open() {
        let tenant = tenant();
        assert!(is_member(None, &tenant));
        assert!(check_ownership(None, &tenant, "delete").is_ok());
        assert!(check_creator_is_owner(None, &tenant).is_ok());
    }

    #[test]
    fn ownership_errors_distinguish_members_from_strangers() {
        let tenant = tenant();
        let auditor = CallerIdentity::new("carol", vec!["auditors".to_string()]);
        let err = check_ownership(Some(&auditor), &tenant, "update").expect_err("member");
        assert!(matches!(err, AccessError::Forbidden { ref verb, .. } if verb == "update"));

        let err = check_ownership(Some(&CallerIdentity::user("bob")), &tenant, "update")
            .expect_err("stranger");
        assert!(matches!(err, AccessError::NotFound { .. }));

        assert!(check_ownership(Some(&CallerIdentity::user("alice")), &tenant, "update").is_ok());
    }

    #[test]
    fn creator_must_be_owner() {
        let tenant = tenant();
        let err = check_creator_is_owner(Some(&CallerIdentity::user("bob")), &tenant)
            .expect_err("not an owner");
        assert!(matches!(err, AccessError::BadRequest(_)));
    }
}
