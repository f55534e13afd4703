mod common;

use axum::http::StatusCode;
use common::{ControlPlane, app, client, client_with, eventually, read_json};
use controlplane::model::{
    Kind, Namespace, ObjectKey, Organization, Project, ProjectRoleTemplate,
    ProjectRoleTemplateSpec, RoleBinding, RoleRef,
};
use controlplane::store::StoreConfig;
use futures::StreamExt;
use http_helpers::{get_as, json_request, user_request};
use std::time::Duration;
use tenantry_authz::Subject;
use tower::ServiceExt;

fn organization(name: &str, owner: &str) -> serde_json::Value {
    serde_json::to_value(Organization::new(name, vec![Subject::user(owner)])).expect("json")
}

#[tokio::test]
async fn health_reports_store_backend() {
    let app = app(&client());
    let response = app
        .oneshot(get_as("anyone", "/v1/system/health"))
        .await
        .expect("health");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn creator_must_be_an_owner() {
    let app = app(&client());
    let response = app
        .clone()
        .oneshot(user_request(
            "bob",
            "POST",
            "/v1/organizations",
            Some(organization("acme", "alice")),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "validation_error");

    let response = app
        .oneshot(user_request(
            "alice",
            "POST",
            "/v1/organizations",
            Some(organization("acme", "alice")),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["metadata"]["name"], "acme");
    assert!(body["metadata"]["uid"].as_str().is_some_and(|uid| !uid.is_empty()));
}

#[tokio::test]
async fn tenant_names_must_keep_namespaces_decodable() {
    let app = app(&client());
    let response = app
        .clone()
        .oneshot(user_request(
            "alice",
            "POST",
            "/v1/organizations",
            Some(organization("a-tenantry-b", "alice")),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let long_name = "p".repeat(60);
    let project = serde_json::to_value(Project::new("acme", long_name, vec![Subject::user("alice")]))
        .expect("json");
    let response = app
        .oneshot(user_request(
            "alice",
            "POST",
            "/v1/namespaces/acme/projects",
            Some(project),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strangers_cannot_tell_hidden_from_missing() {
    let app = app(&client());
    let response = app
        .clone()
        .oneshot(user_request(
            "alice",
            "POST",
            "/v1/organizations",
            Some(organization("acme", "alice")),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);

    let hidden = app
        .clone()
        .oneshot(get_as("bob", "/v1/organizations/acme"))
        .await
        .expect("get");
    let missing = app
        .clone()
        .oneshot(get_as("bob", "/v1/organizations/initech"))
        .await
        .expect("get");
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(hidden).await["code"], read_json(missing).await["code"]);

    let delete = app
        .oneshot(user_request("bob", "DELETE", "/v1/organizations/acme", None))
        .await
        .expect("delete");
    assert_eq!(delete.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lists_only_show_visible_tenants() {
    let app = app(&client());
    for (name, owner) in [("acme", "alice"), ("globex", "bob")] {
        let response = app
            .clone()
            .oneshot(user_request(
                owner,
                "POST",
                "/v1/organizations",
                Some(organization(name, owner)),
            ))
            .await
            .expect("create");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(get_as("alice", "/v1/organizations"))
        .await
        .expect("list");
    let body = read_json(response).await;
    let items = body["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["metadata"]["name"], "acme");
    assert!(body["resourceVersion"].as_u64().is_some_and(|version| version >= 2));

    let response = app
        .oneshot(get_as("mallory", "/v1/organizations"))
        .await
        .expect("list");
    let body = read_json(response).await;
    assert!(body["items"].as_array().expect("items").is_empty());
}

#[tokio::test]
async fn updates_copy_spec_and_labels_only() {
    let app = app(&client());
    let response = app
        .clone()
        .oneshot(user_request(
            "alice",
            "POST",
            "/v1/organizations",
            Some(organization("acme", "alice")),
        ))
        .await
        .expect("create");
    let mut body = read_json(response).await;
    body["spec"]["displayName"] = "Acme Corp".into();
    body["metadata"]["labels"] = serde_json::json!({"tier": "gold"});
    body["metadata"]["finalizers"] = serde_json::json!(["someone.else/finalizer"]);
    body["status"] = serde_json::json!({"namespace": "forged"});

    let response = app
        .clone()
        .oneshot(user_request(
            "alice",
            "PUT",
            "/v1/organizations/acme",
            Some(body.clone()),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["spec"]["displayName"], "Acme Corp");
    assert_eq!(updated["metadata"]["labels"]["tier"], "gold");
    assert!(updated["metadata"]["finalizers"].is_null());
    assert!(updated["status"]["namespace"].is_null());
    assert_eq!(updated["metadata"]["generation"], 2);

    // `body` still carries the version read before the update.
    let response = app
        .oneshot(user_request(
            "alice",
            "PUT",
            "/v1/organizations/acme",
            Some(body),
        ))
        .await
        .expect("stale update");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "conflict");
}

#[tokio::test]
async fn watch_with_evicted_version_is_gone() {
    let client = client_with(StoreConfig {
        change_retention: 2,
        ..StoreConfig::default()
    });
    let app = app(&client);
    for name in ["a", "b", "c", "d"] {
        let response = app
            .clone()
            .oneshot(user_request(
                "alice",
                "POST",
                "/v1/organizations",
                Some(organization(name, "alice")),
            ))
            .await
            .expect("create");
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let response = app
        .oneshot(get_as("alice", "/v1/watch/organizations?resourceVersion=0"))
        .await
        .expect("watch");
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(read_json(response).await["code"], "expired");
}

#[tokio::test]
async fn watch_streams_only_visible_events() {
    let client = client();
    let app = app(&client);
    let response = app
        .clone()
        .oneshot(get_as("alice", "/v1/organizations"))
        .await
        .expect("list");
    let version = read_json(response).await["resourceVersion"]
        .as_u64()
        .expect("version");

    for (name, owner) in [("globex", "bob"), ("acme", "alice")] {
        let response = app
            .clone()
            .oneshot(user_request(
                owner,
                "POST",
                "/v1/organizations",
                Some(organization(name, owner)),
            ))
            .await
            .expect("create");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(get_as(
            "alice",
            &format!("/v1/watch/organizations?resourceVersion={version}"),
        ))
        .await
        .expect("watch");
    assert_eq!(response.status(), StatusCode::OK);

    // globex was written first, so it would arrive before acme if it leaked.
    let mut body = response.into_body().into_data_stream();
    let mut seen = String::new();
    read_until(&mut body, &mut seen, |seen| seen.contains("\"acme\"")).await;
    assert!(seen.contains("ADDED"));
    assert!(!seen.contains("globex"));
}

async fn read_until(
    body: &mut (impl futures::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin),
    seen: &mut String,
    done: impl Fn(&str) -> bool,
) {
    while !done(seen) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("event in time")
            .expect("stream open")
            .expect("chunk");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
}

#[tokio::test]
async fn lagging_watch_reports_error_and_ends() {
    let client = client_with(StoreConfig {
        watch_buffer: 2,
        ..StoreConfig::default()
    });
    let app = app(&client);
    let response = app
        .oneshot(get_as("alice", "/v1/watch/organizations"))
        .await
        .expect("watch");
    assert_eq!(response.status(), StatusCode::OK);

    for index in 0..20 {
        client
            .create(Organization::new(
                format!("org-{index}"),
                vec![Subject::user("alice")],
            ))
            .await
            .expect("create");
    }

    let mut body = response.into_body().into_data_stream();
    let mut seen = String::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("stream progresses");
        match next {
            Some(chunk) => seen.push_str(&String::from_utf8_lossy(&chunk.expect("chunk"))),
            None => break,
        }
    }
    assert!(seen.contains("ERROR"), "{seen}");
    let after_error = &seen[seen.find("ERROR").expect("error frame")..];
    assert!(!after_error.contains("ADDED"));
}

#[tokio::test]
async fn watch_shows_tenants_once_the_caller_becomes_a_member() {
    let plane = ControlPlane::start();
    let response = plane
        .app
        .clone()
        .oneshot(user_request(
            "alice",
            "POST",
            "/v1/organizations",
            Some(organization("acme", "alice")),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);
    eventually("acme namespace", || {
        let client = plane.client.clone();
        async move {
            client
                .find::<Namespace>(&ObjectKey::cluster(Kind::Namespace, "acme"))
                .await
                .is_ok_and(|namespace| namespace.is_some())
        }
    })
    .await;

    let response = plane
        .app
        .clone()
        .oneshot(get_as("bob", "/v1/watch/organizations"))
        .await
        .expect("watch");
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body().into_data_stream();

    let binding = RoleBinding::new(
        "acme",
        "bob-viewer",
        RoleRef::role("viewer"),
        vec![Subject::user("bob")],
    );
    let response = plane
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/namespaces/acme/rolebindings",
            serde_json::to_value(&binding).expect("json"),
        ))
        .await
        .expect("bind bob");
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut seen = String::new();
    read_until(&mut body, &mut seen, |seen| {
        seen.contains("MODIFIED") && seen.contains("bob")
    })
    .await;
    assert!(seen.contains("\"acme\""));
    drop(body);
    plane.stop().await;
}

#[tokio::test]
async fn admin_routes_manage_templates_and_bindings() {
    let client = client();
    let app = app(&client);
    client
        .create(Namespace::new("acme"))
        .await
        .expect("namespace");

    let template = ProjectRoleTemplate::new("acme", "viewer", ProjectRoleTemplateSpec::default());
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/namespaces/acme/projectroletemplates",
            serde_json::to_value(template).expect("json"),
        ))
        .await
        .expect("create template");
    assert_eq!(response.status(), StatusCode::CREATED);

    let binding = RoleBinding::new(
        "acme",
        "bob-viewer",
        RoleRef::role("viewer"),
        vec![Subject::user("bob")],
    );
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/namespaces/other/rolebindings",
            serde_json::to_value(&binding).expect("json"),
        ))
        .await
        .expect("mismatched namespace");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/namespaces/acme/rolebindings",
            serde_json::to_value(&binding).expect("json"),
        ))
        .await
        .expect("create binding");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get_as("admin", "/v1/namespaces/acme/rolebindings"))
        .await
        .expect("list bindings");
    let body = read_json(response).await;
    assert_eq!(body["items"][0]["subjects"][0]["name"], "bob");

    let response = app
        .clone()
        .oneshot(user_request(
            "admin",
            "DELETE",
            "/v1/namespaces/acme/projectroletemplates/viewer",
            None,
        ))
        .await
        .expect("delete template");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get_as("admin", "/v1/namespaces/acme/projectroletemplates/viewer"))
        .await
        .expect("get deleted");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
