use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn citizen_creates_pending_notification() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;

    let created = app
        .create_notification(&juan, "Bomberos", "  Incendio en Palermo ")
        .await;
    assert_eq!(created["category"], "Bomberos");
    assert_eq!(created["title"], "Incendio en Palermo");
    assert_eq!(created["status"], "Pendiente");
    assert_eq!(created["user_name"], "juan");
    assert_eq!(created["email"], "juan@test.com");
    assert!(created["status_updated_at"].is_null());
}

#[tokio::test]
async fn notification_rejects_unknown_category_and_blank_fields() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;

    let resp = app
        .auth_post("/api/notification", &juan.access_token)
        .json(&serde_json::json!({
            "category": "Bomberitos",
            "title": "Algo",
            "description": "Algo paso",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_post("/api/notification", &juan.access_token)
        .json(&serde_json::json!({
            "category": "Policia",
            "title": "   ",
            "description": "Algo paso",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn responders_cannot_create_notifications() {
    let app = TestApp::spawn().await;
    let policia = app.register_user("Policia", None).await;

    let resp = app
        .auth_post("/api/notification", &policia.access_token)
        .json(&serde_json::json!({
            "category": "Policia",
            "title": "Prueba",
            "description": "Prueba",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn feeds_are_scoped_by_role() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let ana = app.register_user("ana", None).await;
    let bomberos = app.register_user("Bomberos", None).await;

    app.create_notification(&juan, "Bomberos", "Humo").await;
    app.create_notification(&juan, "Policia", "Robo").await;
    app.create_notification(&ana, "Bomberos", "Gato en arbol").await;

    // Responders see their category, newest first
    let items: Vec<Value> = app
        .auth_get("/api/notification", &bomberos.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = items.iter().map(|n| n["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Gato en arbol", "Humo"]);

    // Citizens see only their own
    let items: Vec<Value> = app
        .auth_get("/api/notification", &juan.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|n| n["user_id"] == juan.id.as_str()));

    // ... optionally narrowed by category, capped by limit
    let items: Vec<Value> = app
        .auth_get("/api/notification?category=Policia&limit=1", &juan.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Robo");

    // Responders cannot list another category
    let resp = app
        .auth_get("/api/notification?category=Policia", &bomberos.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn responder_moves_notification_forward_only() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let bomberos = app.register_user("Bomberos", None).await;
    let policia = app.register_user("Policia", None).await;

    let created = app.create_notification(&juan, "Bomberos", "Humo").await;
    let id = created["id"].as_str().unwrap();
    let path = format!("/api/notification/{id}/status");

    // Wrong category
    let resp = app
        .auth_put(&path, &policia.access_token)
        .json(&serde_json::json!({ "status": "Resuelto" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Citizens cannot change status
    let resp = app
        .auth_put(&path, &juan.access_token)
        .json(&serde_json::json!({ "status": "Resuelto" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_put(&path, &bomberos.access_token)
        .json(&serde_json::json!({ "status": "En Proceso" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "En Proceso");
    assert!(json["status_updated_at"].is_string());

    let resp = app
        .auth_put(&path, &bomberos.access_token)
        .json(&serde_json::json!({ "status": "Resuelto" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // Terminal
    let resp = app
        .auth_put(&path, &bomberos.access_token)
        .json(&serde_json::json!({ "status": "Pendiente" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid_transition");

    let stored: Value = app
        .auth_get(&format!("/api/notification/{id}"), &juan.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["status"], "Resuelto");
}

#[tokio::test]
async fn response_thread_is_ordered_and_normalized() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let ana = app.register_user("ana", None).await;
    let bomberos = app.register_user("Bomberos", None).await;

    let created = app.create_notification(&juan, "Bomberos", "Humo").await;
    let path = format!("/api/notification/{}/response", created["id"].as_str().unwrap());

    let resp = app
        .auth_post(&path, &bomberos.access_token)
        .json(&serde_json::json!({ "text": "  Vamos   en camino  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["text"], "Vamos en camino");
    assert_eq!(json["role"], "Bomberos");

    let resp = app
        .auth_post(&path, &juan.access_token)
        .json(&serde_json::json!({ "text": "Gracias" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    // Empty text
    let resp = app
        .auth_post(&path, &juan.access_token)
        .json(&serde_json::json!({ "text": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    // Another citizen may not reply or read
    let resp = app
        .auth_post(&path, &ana.access_token)
        .json(&serde_json::json!({ "text": "Hola" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let resp = app.auth_get(&path, &ana.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let thread: Vec<Value> = app
        .auth_get(&path, &juan.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let texts: Vec<&str> = thread.iter().map(|r| r["text"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["Vamos en camino", "Gracias"]);
}

#[tokio::test]
async fn unknown_or_malformed_ids() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;

    let resp = app
        .auth_get("/api/notification/not-an-id", &juan.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_get(
            &format!("/api/notification/{}", bson::oid::ObjectId::new().to_hex()),
            &juan.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn empty_window_is_rejected_on_every_feed() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    app.create_notification(&juan, "Policia", "Robo").await;

    for path in ["/api/notification?limit=0", "/api/panic-alert?limit=0"] {
        let resp = app.auth_get(path, &juan.access_token).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 422, "{path}");
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["error"], "validation");
    }

    let items: Value = app
        .auth_get("/api/notification?limit=1", &juan.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(items.as_array().unwrap().len(), 1);
}
