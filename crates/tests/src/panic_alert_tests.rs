use std::time::Duration;

use alerta_services::alerts::UNKNOWN_ADDRESS;

use crate::fixtures::seed::push_token;
use crate::fixtures::test_app::TestApp;
use serde_json::Value;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn bomberos_scenario_end_to_end() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("Juan", Some(&push_token("juan"))).await;
    let bomberos = app.register_user("Bomberos", Some(&push_token("bomberos"))).await;
    app.register_user("Policia", Some(&push_token("policia"))).await;

    let alert = app.raise_panic(&juan, "Bomberos").await;
    assert_eq!(alert["status"], "Recibida");
    assert_eq!(alert["user_name_panic"], "Juan");
    assert_eq!(alert["location"]["latitude"], -34.6);
    assert!(alert["status_updated_at"].is_null());
    assert!(alert["responder_username"].is_null());
    let id = alert["id"].as_str().unwrap().to_string();

    // Creation fan-out reaches only the Bomberos device
    assert!(app.push.wait_for_messages(1, WAIT).await);
    let fan_out = app.push.messages();
    assert_eq!(fan_out.len(), 1);
    assert_eq!(fan_out[0].to, "ExponentPushToken[bomberos]");
    assert_eq!(fan_out[0].title, "🚨 Alerta de Pánico: Bomberos 🚨");
    assert_eq!(fan_out[0].data["alertId"], id.as_str());

    let path = format!("/api/panic-alert/{id}/status");
    let resp = app
        .auth_put(&path, &bomberos.access_token)
        .json(&serde_json::json!({
            "status": "En Camino",
            "responder_username": "BomberosTeam1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["notification"], "sent");
    assert_eq!(json["alert"]["status"], "En Camino");
    assert_eq!(json["alert"]["responder_username"], "BomberosTeam1");
    assert!(json["alert"]["status_updated_at"].is_string());

    let to_juan: Vec<_> = app
        .push
        .messages()
        .into_iter()
        .filter(|m| m.to == "ExponentPushToken[juan]")
        .collect();
    assert_eq!(to_juan.len(), 1);
    assert!(to_juan[0].body.contains("BomberosTeam1"));

    // Backwards is rejected and leaves the record untouched
    let resp = app
        .auth_put(&path, &bomberos.access_token)
        .json(&serde_json::json!({ "status": "Recibida" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let stored: Value = app
        .auth_get(&format!("/api/panic-alert/{id}"), &juan.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["status"], "En Camino");
    assert_eq!(stored["responder_username"], "BomberosTeam1");
}

#[tokio::test]
async fn fan_out_is_audited_through_receipts() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    app.register_user("DefensaCivil", Some(&push_token("civil"))).await;

    app.raise_panic(&juan, "DefensaCivil").await;

    assert!(app.push.wait_for_receipt_queries(1, WAIT).await);
    let queries = app.push.receipt_queries();
    assert_eq!(queries[0], vec!["ticket-1".to_string()]);
}

#[tokio::test]
async fn responders_without_valid_tokens_are_skipped() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    app.register_user("Policia", Some("not-a-push-token")).await;

    app.raise_panic(&juan, "Policia").await;

    assert!(!app.push.wait_for_messages(1, Duration::from_millis(300)).await);
    assert!(app.push.batches().is_empty());
}

#[tokio::test]
async fn panic_alert_without_location_or_address() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;

    let resp = app
        .auth_post("/api/panic-alert", &juan.access_token)
        .json(&serde_json::json!({ "category": "Policia" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert!(json["location"].is_null());
    assert_eq!(json["address"], UNKNOWN_ADDRESS);

    let resp = app
        .auth_post("/api/panic-alert", &juan.access_token)
        .json(&serde_json::json!({
            "category": "Policia",
            "location": { "latitude": 120.0, "longitude": 0.0 },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn only_matching_responders_can_transition() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let policia = app.register_user("Policia", None).await;
    let bomberos = app.register_user("Bomberos", None).await;

    let alert = app.raise_panic(&juan, "Bomberos").await;
    let path = format!("/api/panic-alert/{}/status", alert["id"].as_str().unwrap());

    for token in [&policia.access_token, &juan.access_token] {
        let resp = app
            .auth_put(&path, token)
            .json(&serde_json::json!({ "status": "En Camino" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 403);
    }

    // Skipping a step is not allowed
    let resp = app
        .auth_put(&path, &bomberos.access_token)
        .json(&serde_json::json!({ "status": "Finalizado" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    // Without a responder name the caller's username is recorded
    let resp = app
        .auth_put(&path, &bomberos.access_token)
        .json(&serde_json::json!({ "status": "En Camino" }))
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["alert"]["responder_username"], "Bomberos");
    // The reporter has no token: the status still changes
    assert_eq!(json["notification"], "degraded");
}

#[tokio::test]
async fn callable_status_endpoint() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", Some(&push_token("juan"))).await;
    let bomberos = app.register_user("Bomberos", None).await;

    let alert = app.raise_panic(&juan, "Bomberos").await;
    let id = alert["id"].as_str().unwrap();

    // Missing fields
    let resp = app
        .auth_post("/api/panic-alert/status", &bomberos.access_token)
        .json(&serde_json::json!({ "alertId": id, "newStatus": "En Camino" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid-argument");

    // Target must be the reporter
    let resp = app
        .auth_post("/api/panic-alert/status", &bomberos.access_token)
        .json(&serde_json::json!({
            "alertId": id,
            "newStatus": "En Camino",
            "targetUserId": bomberos.id,
            "responderUsername": "Unidad 7",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_post("/api/panic-alert/status", &bomberos.access_token)
        .json(&serde_json::json!({
            "alertId": id,
            "newStatus": "En Camino",
            "targetUserId": juan.id,
            "responderUsername": "Unidad 7",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(
        json["message"],
        "Estado actualizado y notificación (si aplica) enviada."
    );
    assert_eq!(json["alert"]["responder_username"], "Unidad 7");

    let resp = app
        .auth_post("/api/panic-alert/status", &bomberos.access_token)
        .json(&serde_json::json!({
            "alertId": id,
            "newStatus": "Finalizado",
            "targetUserId": juan.id,
            "responderUsername": "Unidad 7",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let final_push = app
        .push
        .messages()
        .into_iter()
        .filter(|m| m.to == "ExponentPushToken[juan]")
        .last()
        .unwrap();
    assert_eq!(final_push.title, "Alerta Finalizada ✅");
    assert!(final_push.body.contains("Unidad 7"));
}

#[tokio::test]
async fn panic_feeds_are_scoped_and_newest_first() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let ana = app.register_user("ana", None).await;
    let policia = app.register_user("Policia", None).await;

    let first = app.raise_panic(&juan, "Policia").await;
    let second = app.raise_panic(&ana, "Policia").await;
    app.raise_panic(&juan, "Bomberos").await;

    let items: Vec<Value> = app
        .auth_get("/api/panic-alert", &policia.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = items.iter().map(|a| a["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![second["id"].as_str().unwrap(), first["id"].as_str().unwrap()]);

    let items: Vec<Value> = app
        .auth_get("/api/panic-alert", &juan.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    // Another citizen's alert is invisible
    let resp = app
        .auth_get(
            &format!("/api/panic-alert/{}", first["id"].as_str().unwrap()),
            &ana.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn refused_reporter_push_is_reported_as_failed() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", Some(&push_token("juan"))).await;
    let bomberos = app.register_user("Bomberos", None).await;
    app.push.reject_token(&push_token("juan"), "DeviceNotRegistered");

    let alert = app.raise_panic(&juan, "Bomberos").await;
    let resp = app
        .auth_post("/api/panic-alert/status", &bomberos.access_token)
        .json(&serde_json::json!({
            "alertId": alert["id"],
            "newStatus": "En Camino",
            "targetUserId": juan.id,
            "responderUsername": "BomberosTeam1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["notification"], "degraded");
    assert_eq!(
        json["message"],
        "Estado actualizado, pero falló el envío de notificación."
    );
    assert_eq!(json["alert"]["status"], "En Camino");
}
