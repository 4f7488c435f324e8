use std::time::Duration;

use crate::fixtures::seed::SeededUser;
use crate::fixtures::test_app::TestApp;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn connect(app: &TestApp, user: &SeededUser) -> Ws {
    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url(&user.access_token))
        .await
        .expect("WS connect failed");
    let connected = next_message(&mut ws).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["data"]["user_id"], user.id.as_str());
    let buttons = next_message(&mut ws).await;
    assert_eq!(buttons["type"], "panic:buttons");
    ws
}

async fn send(ws: &mut Ws, kind: &str, data: Value) {
    let text = serde_json::json!({ "type": kind, "data": data }).to_string();
    ws.send(Message::text(text)).await.expect("WS send failed");
}

async fn next_message(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("Timeout waiting for WS message")
            .expect("WS closed")
            .expect("WS error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Next message of `kind`, for the given subscription id when one is given.
async fn next_of(ws: &mut Ws, kind: &str, id: Option<&str>) -> Value {
    loop {
        let msg = next_message(ws).await;
        if msg["type"] == kind && id.is_none_or(|id| msg["data"]["id"] == id) {
            return msg["data"].clone();
        }
    }
}

#[tokio::test]
async fn rejects_invalid_token() {
    let app = TestApp::spawn().await;
    let result = tokio_tungstenite::connect_async(app.ws_url("not-a-token")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ping_pong() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let mut ws = connect(&app, &juan).await;

    send(&mut ws, "ping", Value::Null).await;
    let msg = next_message(&mut ws).await;
    assert_eq!(msg["type"], "pong");
}

#[tokio::test]
async fn responder_feed_follows_creation_and_status() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let bomberos = app.register_user("Bomberos", None).await;
    let mut ws = connect(&app, &bomberos).await;

    send(
        &mut ws,
        "subscribe",
        serde_json::json!({ "id": "panic", "feed": "panic_alerts" }),
    )
    .await;
    let initial = next_of(&mut ws, "snapshot", Some("panic")).await;
    assert_eq!(initial["items"].as_array().unwrap().len(), 0);

    // Other categories never show up
    app.raise_panic(&juan, "Policia").await;
    let alert = app.raise_panic(&juan, "Bomberos").await;
    let id = alert["id"].as_str().unwrap();

    let snapshot = next_of(&mut ws, "snapshot", Some("panic")).await;
    let items = snapshot["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], id);
    assert_eq!(items[0]["status"], "Recibida");

    app.auth_put(&format!("/api/panic-alert/{id}/status"), &bomberos.access_token)
        .json(&serde_json::json!({ "status": "En Camino" }))
        .send()
        .await
        .unwrap();

    let snapshot = next_of(&mut ws, "snapshot", Some("panic")).await;
    assert_eq!(snapshot["items"][0]["status"], "En Camino");

    ws.close(None).await.ok();
}

#[tokio::test]
async fn unsubscribe_stops_updates() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let mut ws = connect(&app, &juan).await;

    for id in ["mine", "witness"] {
        send(
            &mut ws,
            "subscribe",
            serde_json::json!({ "id": id, "feed": "notifications" }),
        )
        .await;
        next_of(&mut ws, "snapshot", Some(id)).await;
    }

    send(&mut ws, "unsubscribe", serde_json::json!({ "id": "mine" })).await;
    // Anything queued for "mine" before the ack is allowed; nothing after it.
    next_of(&mut ws, "unsubscribed", Some("mine")).await;

    app.create_notification(&juan, "Policia", "Robo").await;

    // The witness feed sees the write, so "mine" would have too.
    loop {
        let msg = next_message(&mut ws).await;
        assert_ne!(msg["data"]["id"], "mine", "snapshot after unsubscribe: {msg}");
        if msg["type"] == "snapshot" && msg["data"]["id"] == "witness" {
            assert_eq!(msg["data"]["items"][0]["title"], "Robo");
            break;
        }
    }

    let late = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(late.is_err(), "no snapshot after unsubscribe");
}

#[tokio::test]
async fn response_thread_is_live_and_ascending() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let policia = app.register_user("Policia", None).await;
    let created = app.create_notification(&juan, "Policia", "Robo").await;
    let notification_id = created["id"].as_str().unwrap();

    let mut ws = connect(&app, &juan).await;
    send(
        &mut ws,
        "subscribe",
        serde_json::json!({
            "id": "thread",
            "feed": "responses",
            "notification_id": notification_id,
        }),
    )
    .await;
    next_of(&mut ws, "snapshot", Some("thread")).await;

    let path = format!("/api/notification/{notification_id}/response");
    for text in ["Recibido", "Patrulla enviada"] {
        app.auth_post(&path, &policia.access_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .unwrap();
    }

    let mut latest = next_of(&mut ws, "snapshot", Some("thread")).await;
    if latest["items"].as_array().unwrap().len() < 2 {
        latest = next_of(&mut ws, "snapshot", Some("thread")).await;
    }
    let texts: Vec<&str> = latest["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["Recibido", "Patrulla enviada"]);
}

#[tokio::test]
async fn subscription_outside_scope_reports_error() {
    let app = TestApp::spawn().await;
    let bomberos = app.register_user("Bomberos", None).await;
    let mut ws = connect(&app, &bomberos).await;

    send(
        &mut ws,
        "subscribe",
        serde_json::json!({ "id": "police", "feed": "notifications", "category": "Policia" }),
    )
    .await;
    let err = next_of(&mut ws, "error", Some("police")).await;
    assert_eq!(err["error"], "forbidden");
}

#[tokio::test]
async fn dashboard_feeds_are_capped() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    for i in 0..6 {
        app.create_notification(&juan, "Bomberos", &format!("Reporte {i}"))
            .await;
    }

    let mut ws = connect(&app, &juan).await;
    send(&mut ws, "dashboard", Value::Null).await;

    let notifications = next_of(&mut ws, "snapshot", Some("dashboard:notifications")).await;
    let items = notifications["items"].as_array().unwrap();
    assert_eq!(items.len(), app.settings.alerts.dashboard_notification_limit);
    assert_eq!(items[0]["title"], "Reporte 5");
}

#[tokio::test]
async fn panic_button_cools_down_after_raise() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let mut ws = connect(&app, &juan).await;

    send(&mut ws, "panic:create", serde_json::json!({ "category": "Policia" })).await;
    let created = next_of(&mut ws, "panic:created", None).await;
    assert_eq!(created["category"], "Policia");
    assert_eq!(created["status"], "Recibida");

    let buttons = next_of(&mut ws, "panic:buttons", None).await;
    let policia = buttons
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["category"] == "Policia")
        .unwrap();
    assert_eq!(policia["enabled"], false);
    assert!(policia["remaining_secs"].as_u64().unwrap() > 0);

    send(&mut ws, "panic:create", serde_json::json!({ "category": "Policia" })).await;
    let err = next_of(&mut ws, "error", Some("panic:create")).await;
    assert_eq!(err["error"], "conflict");

    // Other categories stay available
    send(&mut ws, "panic:create", serde_json::json!({ "category": "Bomberos" })).await;
    let created = next_of(&mut ws, "panic:created", None).await;
    assert_eq!(created["category"], "Bomberos");
}

#[tokio::test]
async fn panic_status_requires_confirmation() {
    let app = TestApp::spawn().await;
    let juan = app.register_user("juan", None).await;
    let policia = app.register_user("Policia", None).await;
    let alert = app.raise_panic(&juan, "Policia").await;
    let id = alert["id"].as_str().unwrap();

    let mut ws = connect(&app, &policia).await;

    send(
        &mut ws,
        "panic:status",
        serde_json::json!({ "alert_id": id, "status": "En Camino" }),
    )
    .await;
    let err = next_of(&mut ws, "error", Some(id)).await;
    assert_eq!(err["error"], "bad_request");

    send(
        &mut ws,
        "panic:status",
        serde_json::json!({
            "alert_id": id,
            "status": "En Camino",
            "responder_username": "Movil 12",
            "confirmed": true,
        }),
    )
    .await;
    let done = next_of(&mut ws, "panic:transition", None).await;
    assert_eq!(done["ok"], true);
    assert_eq!(done["alert"]["status"], "En Camino");
    assert_eq!(done["alert"]["responder_username"], "Movil 12");

    send(
        &mut ws,
        "panic:status",
        serde_json::json!({ "alert_id": id, "status": "Recibida", "confirmed": true }),
    )
    .await;
    let done = next_of(&mut ws, "panic:transition", None).await;
    assert_eq!(done["ok"], false);
    assert_eq!(done["error"], "invalid_transition");
}
