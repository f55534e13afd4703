mod common;

use axum::http::StatusCode;
use common::{ControlPlane, eventually, read_json};
use controlplane::controllers::defaults::{PROJECT_ADMIN_TEMPLATE, RBAC_ADMIN_TEMPLATE};
use controlplane::model::{
    ConditionStatus, Conditioned, Kind, Namespace, ObjectKey, Organization, OrganizationRole,
    OrganizationRoleTemplate, OrganizationRoleTemplateSpec, Project, REASON_DELETING, Resource,
    Role, RoleBinding, RoleRef, TenantKind,
};
use controlplane::store::{Client, WatchEvent, WatchFilter};
use http_helpers::{get_as, json_request, user_request};
use std::time::Duration;
use tenantry_authz::{PolicyRule, Subject};
use tower::ServiceExt;

async fn create_organization(plane: &ControlPlane, name: &str, owner: &str) {
    let body = serde_json::to_value(Organization::new(name, vec![Subject::user(owner)]))
        .expect("json");
    let response = plane
        .app
        .clone()
        .oneshot(user_request(owner, "POST", "/v1/organizations", Some(body)))
        .await
        .expect("create organization");
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn wait_ready<T: Conditioned>(client: &Client, key: ObjectKey) {
    eventually(&format!("{key} to become ready"), || {
        let client = client.clone();
        let key = key.clone();
        async move {
            client
                .find::<T>(&key)
                .await
                .ok()
                .flatten()
                .is_some_and(|object| object.is_ready())
        }
    })
    .await;
}

async fn exists<T: Resource>(client: &Client, key: &ObjectKey) -> bool {
    client.find::<T>(key).await.ok().flatten().is_some()
}

#[tokio::test]
async fn organization_setup_creates_namespace_and_defaults_once() {
    let plane = ControlPlane::start();
    // Both organizations reconcile at once and race to create the default
    // templates.
    tokio::join!(
        create_organization(&plane, "acme", "alice"),
        create_organization(&plane, "globex", "bob"),
    );

    for name in ["acme", "globex"] {
        wait_ready::<Organization>(&plane.client, ObjectKey::cluster(Kind::Organization, name))
            .await;
    }

    let organization: Organization = plane.client.get(None, "acme").await.expect("org");
    assert_eq!(organization.status.namespace.as_deref(), Some("acme"));
    assert!(organization.status.members.contains(&Subject::user("alice")));
    assert_eq!(
        organization.metadata.finalizers,
        vec!["organization.tenantry.io/controller".to_string()]
    );
    let namespace: Namespace = plane.client.get(None, "acme").await.expect("namespace");
    assert_eq!(
        namespace.metadata.controller_ref().map(|owner| owner.uid.clone()),
        Some(organization.metadata.uid.clone())
    );

    let templates = plane
        .client
        .list::<OrganizationRoleTemplate>(None)
        .await
        .expect("templates");
    for default in [PROJECT_ADMIN_TEMPLATE, RBAC_ADMIN_TEMPLATE] {
        let count = templates
            .iter()
            .filter(|template| template.metadata.name == default)
            .count();
        assert_eq!(count, 1, "{default}");
    }

    // The default templates bind their roles to the organization owners.
    let binding_key = ObjectKey::namespaced(Kind::RoleBinding, "acme", RBAC_ADMIN_TEMPLATE);
    eventually("rbac-admin binding", || {
        let client = plane.client.clone();
        let key = binding_key.clone();
        async move {
            client
                .find::<RoleBinding>(&key)
                .await
                .ok()
                .flatten()
                .is_some_and(|binding| binding.subjects == vec![Subject::user("alice")])
        }
    })
    .await;

    plane.stop().await;
}

#[tokio::test]
async fn organization_role_is_clamped_to_the_template_ceiling() {
    let plane = ControlPlane::start();
    create_organization(&plane, "acme", "alice").await;
    wait_ready::<Organization>(&plane.client, ObjectKey::cluster(Kind::Organization, "acme")).await;

    let ceiling = OrganizationRoleTemplate::new(
        "readers",
        OrganizationRoleTemplateSpec {
            scopes: vec![TenantKind::Organization],
            rules: vec![PolicyRule::resource(&["*"], &["*"], &["get", "list"])],
            ..OrganizationRoleTemplateSpec::default()
        },
    );
    let response = plane
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/organizationroletemplates",
            serde_json::to_value(ceiling).expect("json"),
        ))
        .await
        .expect("create template");
    assert_eq!(response.status(), StatusCode::CREATED);

    let requested = OrganizationRole::new(
        "acme",
        "deployers",
        vec![PolicyRule::resource(
            &["apps.io"],
            &["deployments"],
            &["get", "list", "delete"],
        )],
    );
    let response = plane
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/namespaces/acme/organizationroles",
            serde_json::to_value(requested).expect("json"),
        ))
        .await
        .expect("create organization role");
    assert_eq!(response.status(), StatusCode::CREATED);

    let expected = vec![PolicyRule::resource(&["apps.io"], &["deployments"], &["get", "list"])];
    let role_key = ObjectKey::namespaced(Kind::OrganizationRole, "acme", "deployers");
    wait_ready::<OrganizationRole>(&plane.client, role_key.clone()).await;
    eventually("accepted rules", || {
        let client = plane.client.clone();
        let key = role_key.clone();
        let expected = expected.clone();
        async move {
            client
                .find::<OrganizationRole>(&key)
                .await
                .ok()
                .flatten()
                .is_some_and(|role| role.status.accepted_rules == expected)
        }
    })
    .await;
    let role: Role = plane
        .client
        .get(Some("acme"), "deployers")
        .await
        .expect("materialized role");
    assert_eq!(role.rules, expected);

    plane.stop().await;
}

#[tokio::test]
async fn role_bindings_grant_visibility_but_not_ownership() {
    let plane = ControlPlane::start();
    create_organization(&plane, "acme", "alice").await;
    wait_ready::<Organization>(&plane.client, ObjectKey::cluster(Kind::Organization, "acme")).await;

    let response = plane
        .app
        .clone()
        .oneshot(get_as("bob", "/v1/organizations/acme"))
        .await
        .expect("get");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let binding = RoleBinding::new(
        "acme",
        "bob-viewer",
        RoleRef::role(PROJECT_ADMIN_TEMPLATE),
        vec![Subject::user("bob")],
    );
    let response = plane
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/namespaces/acme/rolebindings",
            serde_json::to_value(binding).expect("json"),
        ))
        .await
        .expect("bind bob");
    assert_eq!(response.status(), StatusCode::CREATED);

    eventually("bob to see acme", || {
        let app = plane.app.clone();
        async move {
            app.oneshot(get_as("bob", "/v1/organizations/acme"))
                .await
                .is_ok_and(|response| response.status() == StatusCode::OK)
        }
    })
    .await;

    let response = plane
        .app
        .clone()
        .oneshot(get_as("bob", "/v1/organizations/acme"))
        .await
        .expect("get");
    let mut body = read_json(response).await;
    body["spec"]["displayName"] = "Bob's Corp".into();
    let response = plane
        .app
        .clone()
        .oneshot(user_request(
            "bob",
            "PUT",
            "/v1/organizations/acme",
            Some(body),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = plane
        .app
        .clone()
        .oneshot(user_request("bob", "DELETE", "/v1/organizations/acme", None))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    plane.stop().await;
}

#[tokio::test]
async fn project_members_roll_up_into_their_organization() {
    let plane = ControlPlane::start();
    create_organization(&plane, "acme", "alice").await;
    wait_ready::<Organization>(&plane.client, ObjectKey::cluster(Kind::Organization, "acme")).await;

    let project = Project::new("acme", "web", vec![Subject::user("dave")]);
    let response = plane
        .app
        .clone()
        .oneshot(user_request(
            "dave",
            "POST",
            "/v1/namespaces/acme/projects",
            Some(serde_json::to_value(project).expect("json")),
        ))
        .await
        .expect("create project");
    assert_eq!(response.status(), StatusCode::CREATED);

    let project_key = ObjectKey::namespaced(Kind::Project, "acme", "web");
    wait_ready::<Project>(&plane.client, project_key.clone()).await;
    let project: Project = plane.client.fetch(&project_key).await.expect("project");
    assert_eq!(project.status.namespace.as_deref(), Some("acme-tenantry-web"));
    assert!(
        exists::<Namespace>(
            &plane.client,
            &ObjectKey::cluster(Kind::Namespace, "acme-tenantry-web")
        )
        .await
    );

    eventually("dave to see acme", || {
        let app = plane.app.clone();
        async move {
            app.oneshot(get_as("dave", "/v1/organizations/acme"))
                .await
                .is_ok_and(|response| response.status() == StatusCode::OK)
        }
    })
    .await;

    let response = plane
        .app
        .clone()
        .oneshot(get_as("alice", "/v1/namespaces/acme/projects"))
        .await
        .expect("list projects");
    let body = read_json(response).await;
    assert!(body["items"].as_array().expect("items").is_empty());

    plane.stop().await;
}

#[tokio::test]
async fn deleting_an_organization_reports_progress_before_it_disappears() {
    let plane = ControlPlane::start();
    create_organization(&plane, "acme", "alice").await;
    let org_key = ObjectKey::cluster(Kind::Organization, "acme");
    wait_ready::<Organization>(&plane.client, org_key.clone()).await;

    let mut events = plane
        .client
        .watch(WatchFilter::all(), None)
        .await
        .expect("watch");
    let response = plane
        .app
        .clone()
        .oneshot(user_request("alice", "DELETE", "/v1/organizations/acme", None))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let mut deleting_at = None;
    let mut namespace_gone_at = None;
    let mut organization_gone_at = None;
    let mut position = 0usize;
    while organization_gone_at.is_none() {
        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("event in time")
            .expect("watch open");
        position += 1;
        match &event {
            WatchEvent::Modified(object) if object.kind() == Kind::Organization => {
                let organization = object.clone().downcast::<Organization>().expect("org");
                if organization
                    .status
                    .readiness
                    .has_ready(ConditionStatus::False, REASON_DELETING)
                {
                    deleting_at.get_or_insert(position);
                }
            }
            WatchEvent::Deleted(object)
                if object.kind() == Kind::Namespace && object.meta().name == "acme" =>
            {
                namespace_gone_at = Some(position);
            }
            WatchEvent::Deleted(object) if object.kind() == Kind::Organization => {
                organization_gone_at = Some(position);
            }
            WatchEvent::Error(message) => panic!("watch failed: {message}"),
            _ => {}
        }
    }

    let deleting_at = deleting_at.expect("Deleting condition observed");
    let namespace_gone_at = namespace_gone_at.expect("namespace removal observed");
    assert!(deleting_at < namespace_gone_at);
    assert!(namespace_gone_at < organization_gone_at.expect("organization removed"));
    assert!(!exists::<Organization>(&plane.client, &org_key).await);

    plane.stop().await;
}
