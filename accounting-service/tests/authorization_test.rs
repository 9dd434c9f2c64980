mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn tiers_apply_in_order() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let jane = app.user_token(JANE).await;
    let bob = app.user_token(BOB).await;
    app.user_token(CARL).await;

    app.group(&admin, "physics").await;
    app.group(&admin, "chemistry").await;
    app.add_member(&admin, "physics", JANE, true).await;

    // members may not create users or groups
    let (status, _) = app
        .post("/api/v1/users", &jane, json!({ "dom_name": "eve@example.org", "full_name": "Eve" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/api/v1/groups", &jane, json!({ "name": "rogue" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // group-admin of physics, nothing more
    let (status, _) = app
        .put(&format!("/api/v1/groups/physics/members/{}", BOB), &jane)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .put(&format!("/api/v1/groups/chemistry/members/{}", CARL), &jane)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // plain members read the member list, but do not manage it
    let (status, members) = app.get("/api/v1/groups/physics/members", &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().map(Vec::len), Some(2));
    let (status, _) = app
        .delete(&format!("/api/v1/groups/physics/members/{}", JANE), &bob)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // already a member
    let (status, _) = app
        .put(&format!("/api/v1/groups/physics/members/{}?admin=true", BOB), &admin)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn group_listing_is_filtered_per_caller() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let jane = app.user_token(JANE).await;

    app.group(&admin, "physics").await;
    app.group(&admin, "chemistry").await;
    app.add_member(&admin, "physics", JANE, false).await;

    let (status, all) = app.get("/api/v1/groups", &admin).await;
    assert_eq!(status, StatusCode::OK);
    // physics, chemistry and admins
    assert_eq!(all.as_array().map(Vec::len), Some(3));

    let (status, mine) = app.get("/api/v1/groups", &jane).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = mine
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|g| g["name"].as_str())
        .collect();
    assert_eq!(names, vec!["physics"]);

    let (status, body) = app
        .request(
            "PATCH",
            "/api/v1/groups/chemistry",
            Some(&admin),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (_, active) = app.get("/api/v1/groups?active=true", &admin).await;
    assert_eq!(active.as_array().map(Vec::len), Some(2));

    let (status, page) = app.get("/api/v1/groups?limit=1", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page[0]["name"], "admins");
    assert_eq!(page.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn lookups_deny_before_revealing_absence() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let jane = app.user_token(JANE).await;
    app.user_token(BOB).await;

    let (status, _) = app.get("/api/v1/users/find/ghost@example.org", &jane).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users/find/ghost@example.org", &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/api/v1/users/find/{}", BOB), &jane).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.group(&admin, "physics").await;
    app.add_member(&admin, "physics", JANE, true).await;
    app.add_member(&admin, "physics", BOB, false).await;

    let (status, found) = app.get(&format!("/api/v1/users/find/{}", BOB), &jane).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["dom_name"], BOB);
    assert!(found.get("seed").is_none());

    let (status, _) = app.get("/api/v1/groups/nowhere/members", &jane).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_group_membership_grants_super_admin() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let jane = app.user_token(JANE).await;

    let (status, _) = app.get("/api/v1/users", &jane).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post(&format!("/api/v1/admins/{}", JANE), &admin, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&format!("/api/v1/admins/{}", JANE), &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, users) = app.get("/api/v1/users", &jane).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().map(Vec::len), Some(1));

    let (_, admins) = app.get("/api/v1/admins", &admin).await;
    assert_eq!(admins[0]["dom_name"], JANE);

    let (status, _) = app.delete(&format!("/api/v1/admins/{}", JANE), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/v1/users", &jane).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn directory_administrators_are_super_admins() {
    let app = TestApp::new().await;
    let ops = app.user_token(OPS).await;

    let (status, _) = app
        .post("/api/v1/users", &ops, json!({ "dom_name": "eve@example.org", "full_name": "Eve" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn user_records_are_super_admin_business() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let jane = app.user_token(JANE).await;

    let (status, created) = app
        .post("/api/v1/users", &admin, json!({ "dom_name": "eve@example.org", "full_name": "Eve" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    // the seed belongs to the new user alone
    assert!(created.get("seed").is_none(), "creation response carries a seed");
    assert_eq!(created["logon_name"], "eve.example");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post("/api/v1/users", &admin, json!({ "dom_name": "eve@example.org", "full_name": "Eve" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .post("/api/v1/users", &admin, json!({ "dom_name": "admin", "full_name": "Root" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get(&format!("/api/v1/users/{}", id), &jane).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, patched) = app
        .request(
            "PATCH",
            &format!("/api/v1/users/{}", id),
            Some(&admin),
            Some(json!({ "full_name": "Eve Online" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["full_name"], "Eve Online");

    // only the whitelisted field may be patched
    let (status, _) = app
        .request(
            "PATCH",
            &format!("/api/v1/users/{}", id),
            Some(&admin),
            Some(json!({ "logon_name": "root" })),
        )
        .await;
    assert!(status.is_client_error());

    let (status, _) = app.delete("/api/v1/users/eve@example.org", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/v1/users/{}", id), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
