mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

/// Registers `name` as a service and a resource of the same name; returns
/// the service's bearer.
async fn service_with_resource(app: &TestApp, admin: &str, name: &str) -> String {
    let (status, created) = app.post("/api/v1/services", admin, json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post("/api/v1/resources", admin, json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CREATED);

    app.token(
        created["access"].as_str().unwrap(),
        created["secret"].as_str().unwrap(),
    )
    .await
}

#[tokio::test]
async fn service_secret_is_shown_once() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, created) = app.post("/api/v1/services", &admin, json!({ "name": "slurm" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let secret = created["secret"].as_str().unwrap().to_string();
    let access = created["access"].as_str().unwrap().to_string();

    let (status, listed) = app.get("/api/v1/services", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["name"], "slurm");
    assert_eq!(listed[0]["access"], access.as_str());
    let text = listed.to_string();
    assert!(!text.contains(&secret));
    assert!(!text.contains("digest"));

    let (status, _) = app.login_as(&access, "wrong-secret", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login_as(&access, &secret, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post("/api/v1/services", &admin, json!({ "name": "slurm" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deleting_a_service_ends_its_session() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let slurm = service_with_resource(&app, &admin, "slurm").await;

    let (status, _) = app.get("/api/v1/ids/group/admins", &slurm).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.delete("/api/v1/services/slurm", &admin).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/v1/ids/group/admins", &slurm).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.delete("/api/v1/services/slurm", &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn services_are_confined_to_their_operations() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let slurm = service_with_resource(&app, &admin, "slurm").await;

    for uri in ["/api/v1/users", "/api/v1/groups", "/api/v1/services", "/api/v1/resources"] {
        let (status, _) = app.get(uri, &slurm).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
    let (status, _) = app.get("/api/v1/users/me", &slurm).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn numeric_ids_carry_the_configured_offsets() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let slurm = service_with_resource(&app, &admin, "slurm").await;
    app.user_token(JANE).await;

    let (status, body) = app.get("/api/v1/ids/group/admins", &slurm).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "admins");
    assert!(body["id"].as_i64().unwrap() > GID_INIT);

    let (status, body) = app.get("/api/v1/ids/user/jadoe.example", &slurm).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].as_i64().unwrap() > UID_INIT);

    let (status, _) = app.get("/api/v1/ids/user/nobody", &slurm).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let jane = app.user_token(JANE).await;
    let (status, _) = app.get("/api/v1/ids/user/jadoe.example", &jane).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn services_record_usage_for_their_own_resource() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let slurm = service_with_resource(&app, &admin, "slurm").await;
    service_with_resource(&app, &admin, "lsf").await;
    app.user_token(JANE).await;

    let record = |resource: &str| {
        json!({
            "resource": resource,
            "user": JANE,
            "start": "2026-01-01T00:00:00Z",
            "end": "2026-01-01T01:00:00Z",
            "metrics": { "cpu_hours": 4.0 }
        })
    };

    let (status, body) = app
        .post("/api/v1/usage", &slurm, json!({ "records": [record("slurm"), record("slurm")] }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["inserted"], 2);

    let (status, _) = app
        .post("/api/v1/usage", &slurm, json!({ "records": [record("slurm"), record("lsf")] }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/v1/usage",
            &slurm,
            json!({ "records": [{ "resource": "slurm", "user": JANE }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // services never read usage back
    let (status, _) = app.get("/api/v1/usage?resource=slurm", &slurm).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = app.get("/api/v1/usage?resource=slurm", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(2));
}
