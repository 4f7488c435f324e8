use serde_json::{Value, json};

use crate::fixtures::seed::{PASSWORD, push_token};
use crate::fixtures::test_app::TestApp;

/// Unauthenticated POST; returns the status and the decoded body (or `Null`).
async fn post_json(app: &TestApp, path: &str, body: Value) -> (u16, Value) {
    let resp = app
        .client
        .post(app.url(path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn citizen_signs_up_with_device_token() {
    let app = TestApp::spawn().await;

    let (status, body) = post_json(
        &app,
        "/api/auth/register",
        json!({
            "email": "juan@test.com",
            "username": "juan",
            "password": PASSWORD,
            "push_token": push_token("juan"),
        }),
    )
    .await;

    assert_eq!(status, 201);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    let user = &body["user"];
    assert_eq!(user["username"], "juan");
    assert_eq!(user["role"], "Ciudadano");
    assert_eq!(user["push_token"], "ExponentPushToken[juan]");
}

#[tokio::test]
async fn team_accounts_take_their_category_role() {
    let app = TestApp::spawn().await;

    for team in ["Bomberos", "Policia", "DefensaCivil"] {
        let seeded = app.register_user(team, None).await;
        assert_eq!(seeded.role, team);
    }
}

#[tokio::test]
async fn sign_up_conflicts_and_validation() {
    let app = TestApp::spawn().await;
    app.register_user("maria", None).await;

    let (status, _) = post_json(
        &app,
        "/api/auth/register",
        json!({ "email": "maria@test.com", "username": "maria2", "password": PASSWORD }),
    )
    .await;
    assert_eq!(status, 409);

    let (status, body) = post_json(
        &app,
        "/api/auth/register",
        json!({ "email": "short@test.com", "username": "short", "password": "123" }),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn login_by_username_or_email() {
    let app = TestApp::spawn().await;
    app.register_user("ana", None).await;

    let (status, body) = post_json(
        &app,
        "/api/auth/login",
        json!({ "username": "ana", "password": PASSWORD }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["user"]["username"], "ana");

    let (status, _) = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "ana@test.com", "password": "not-the-password" }),
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn profile_needs_a_bearer_token() {
    let app = TestApp::spawn().await;

    let resp = reqwest::Client::new()
        .get(app.url("/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn device_token_is_replaced_then_cleared() {
    let app = TestApp::spawn().await;
    let user = app.register_user("device", None).await;

    for (token, expected) in [
        (json!(push_token("device")), json!("ExponentPushToken[device]")),
        (json!("   "), Value::Null),
        (Value::Null, Value::Null),
    ] {
        let body: Value = app
            .auth_put("/api/auth/me/push-token", &user.access_token)
            .json(&json!({ "push_token": token }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["push_token"], expected);
    }

    let me: Value = app
        .auth_get("/api/auth/me", &user.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(me["push_token"].is_null());
}

#[tokio::test]
async fn refresh_only_accepts_refresh_tokens() {
    let app = TestApp::spawn().await;
    let user = app.register_user("refresher", None).await;

    let (status, body) = post_json(
        &app,
        "/api/auth/refresh",
        json!({ "refresh_token": user.refresh_token }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["user"]["id"], user.id.as_str());
    assert_eq!(body["user"]["role"], "Ciudadano");

    let (status, _) = post_json(
        &app,
        "/api/auth/refresh",
        json!({ "refresh_token": user.access_token }),
    )
    .await;
    assert_eq!(status, 401);
}
