use std::collections::HashMap;
use std::time::Instant;

use alerta_db::models::{Category, GeoPoint, PanicAlert, PanicStatus};
use alerta_services::{
    LiveViewProjector, TransitionError,
    lifecycle::PanicTransition,
    projector::{ConfirmedTransition, DashboardUpdate, TransitionRequest},
    store::{LiveQuery, LiveRecord},
};
use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bson::oid::ObjectId;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    routes::{notification, panic_alert},
    state::AppState,
};

const DASHBOARD: &str = "dashboard";
const DASHBOARD_NOTIFICATIONS: &str = "dashboard:notifications";
const DASHBOARD_PANIC_ALERTS: &str = "dashboard:panic_alerts";

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct SubscribeParams {
    id: String,
    feed: String,
    notification_id: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct UnsubscribeParams {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PanicCreateParams {
    category: String,
    location: Option<GeoPoint>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PanicStatusParams {
    alert_id: String,
    status: String,
    responder_username: Option<String>,
    #[serde(default)]
    confirmed: bool,
}

#[derive(Serialize)]
struct Snapshot<'a, V> {
    id: &'a str,
    items: Vec<V>,
}

/// Work finished off the socket loop. Feed output is tagged with the
/// generation of the subscription that produced it and is dropped once that
/// subscription is gone.
enum Internal {
    Snapshot {
        id: String,
        generation: u64,
        message: Message,
    },
    Dashboard(u64, DashboardUpdate),
    TransitionDone(
        ConfirmedTransition,
        Result<PanicTransition, TransitionError>,
    ),
}

type Outbound = mpsc::UnboundedSender<Message>;
type InternalTx = mpsc::UnboundedSender<Internal>;

struct Subscription {
    generation: u64,
    task: JoinHandle<()>,
}

fn encode(kind: &str, data: impl Serialize) -> Message {
    let data = serde_json::to_value(data).unwrap_or(Value::Null);
    Message::text(json!({ "type": kind, "data": data }).to_string())
}

fn params<T: DeserializeOwned>(data: Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_category(raw: Option<&str>) -> Result<Option<Category>, ApiError> {
    raw.map(|c| c.parse::<Category>())
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // Verify JWT before accepting the WebSocket
    let claims = match state.auth.verify_access_token(&params.token) {
        Ok(c) => c,
        Err(_) => return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    };
    let auth = match AuthUser::from_claims(claims) {
        Ok(a) => a,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid user ID").into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

async fn handle_socket(socket: WebSocket, state: AppState, auth: AuthUser) {
    let connection_id = Uuid::new_v4().to_string();
    let user_id = auth.user_id;
    info!(%user_id, %connection_id, role = %auth.role, "WebSocket connected");

    let (mut sink, mut receiver) = socket.split();
    let (out, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let (internal, mut internal_rx) = mpsc::unbounded_channel::<Internal>();
    let projector = LiveViewProjector::new(
        state.alerts.clone(),
        state.lifecycle.clone(),
        auth.session(),
        &state.settings.alerts,
    );
    let mut conn = Connection {
        connection_id: connection_id.clone(),
        projector,
        out,
        internal,
        subscriptions: HashMap::new(),
        generation: 0,
    };

    conn.send(
        "connected",
        json!({
            "user_id": user_id.to_hex(),
            "username": auth.username,
            "role": auth.role,
        }),
    );
    conn.send_buttons();

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => conn.handle_client_message(text.as_str()).await,
                Some(Ok(Message::Ping(data))) => {
                    let _ = conn.out.send(Message::Pong(data));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(%user_id, %connection_id, %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            Some(event) = internal_rx.recv() => conn.handle_internal(event),
        }
    }

    conn.close();
    writer.abort();
    info!(%user_id, %connection_id, "WebSocket disconnected");
}

struct Connection {
    connection_id: String,
    projector: LiveViewProjector,
    out: Outbound,
    internal: InternalTx,
    subscriptions: HashMap<String, Subscription>,
    generation: u64,
}

impl Connection {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn is_live(&self, id: &str, generation: u64) -> bool {
        self.subscriptions
            .get(id)
            .is_some_and(|s| s.generation == generation)
    }

    fn replace_subscription(&mut self, id: String, generation: u64, task: JoinHandle<()>) {
        if let Some(previous) = self
            .subscriptions
            .insert(id, Subscription { generation, task })
        {
            previous.task.abort();
        }
    }

    fn send(&self, kind: &str, data: impl Serialize) {
        let _ = self.out.send(encode(kind, data));
    }

    fn send_error(&self, id: Option<&str>, err: &ApiError) {
        let (_, error, message) = err.parts();
        self.send(
            "error",
            json!({ "id": id, "error": error, "message": message }),
        );
    }

    fn send_buttons(&self) {
        self.send(
            "panic:buttons",
            self.projector.button_states(Instant::now()),
        );
    }

    fn send_panic_snapshot(&self, id: &str, items: Vec<PanicAlert>) {
        let items: Vec<panic_alert::PanicAlertView> =
            items.into_iter().map(panic_alert::to_view).collect();
        self.send("snapshot", Snapshot { id, items });
    }

    async fn handle_client_message(&mut self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(_) => {
                self.send_error(None, &ApiError::BadRequest("Malformed message".to_string()));
                return;
            }
        };
        debug!(connection_id = %self.connection_id, kind = %envelope.kind, "WS message received");

        let kind = envelope.kind.clone();
        let result = match kind.as_str() {
            "ping" => {
                self.send("pong", Value::Null);
                Ok(())
            }
            "subscribe" => self.subscribe(envelope.data).await,
            "unsubscribe" => self.unsubscribe(envelope.data),
            "dashboard" => self.open_dashboard().await,
            "panic:buttons" => {
                self.send_buttons();
                Ok(())
            }
            "panic:create" => self.panic_create(envelope.data).await,
            "panic:status" => self.panic_status(envelope.data),
            other => {
                debug!(kind = other, "Unknown WS message type");
                Err((None, ApiError::BadRequest(format!("Unknown message type: {other}"))))
            }
        };

        if let Err((id, err)) = result {
            self.send_error(id.as_deref(), &err);
        }
    }

    async fn subscribe(&mut self, data: Value) -> Result<(), (Option<String>, ApiError)> {
        let p: SubscribeParams = params(data).map_err(|e| (None, e))?;
        let id = p.id.clone();
        let generation = self.next_generation();
        let task = self
            .open_feed(p, generation)
            .await
            .map_err(|e| (Some(id.clone()), e))?;
        self.replace_subscription(id, generation, task);
        Ok(())
    }

    async fn open_feed(
        &self,
        p: SubscribeParams,
        generation: u64,
    ) -> Result<JoinHandle<()>, ApiError> {
        let category = parse_category(p.category.as_deref())?;
        let internal = self.internal.clone();
        match p.feed.as_str() {
            "notifications" => {
                let query = self
                    .projector
                    .notifications_feed(category, p.limit)
                    .await?;
                Ok(spawn_feed(query, p.id, generation, internal, notification::to_view))
            }
            "panic_alerts" => {
                let query = self.projector.panic_feed(category, p.limit).await?;
                Ok(spawn_feed(query, p.id, generation, internal, panic_alert::to_view))
            }
            "responses" => {
                let raw = p.notification_id.as_deref().ok_or_else(|| {
                    ApiError::BadRequest("notification_id is required".to_string())
                })?;
                let notification_id = ObjectId::parse_str(raw)
                    .map_err(|_| ApiError::BadRequest("Invalid notification_id".to_string()))?;
                let query = self.projector.response_thread(notification_id).await?;
                Ok(spawn_feed(
                    query,
                    p.id,
                    generation,
                    internal,
                    notification::to_response_view,
                ))
            }
            other => Err(ApiError::BadRequest(format!("Unknown feed: {other}"))),
        }
    }

    fn unsubscribe(&mut self, data: Value) -> Result<(), (Option<String>, ApiError)> {
        let p: UnsubscribeParams = params(data).map_err(|e| (None, e))?;
        // Aborting drops the live query, which unregisters it from the feed.
        // Anything the task already queued is dropped by `is_live`.
        if let Some(subscription) = self.subscriptions.remove(&p.id) {
            subscription.task.abort();
        }
        self.send("unsubscribed", json!({ "id": p.id }));
        Ok(())
    }

    async fn open_dashboard(&mut self) -> Result<(), (Option<String>, ApiError)> {
        let mut dashboard = self
            .projector
            .dashboard()
            .await
            .map_err(|e| (Some(DASHBOARD.to_string()), ApiError::from(e)))?;
        let internal = self.internal.clone();
        let generation = self.next_generation();
        let task = tokio::spawn(async move {
            while let Some(update) = dashboard.next().await {
                if internal.send(Internal::Dashboard(generation, update)).is_err() {
                    break;
                }
            }
        });
        self.replace_subscription(DASHBOARD.to_string(), generation, task);
        Ok(())
    }

    async fn panic_create(&mut self, data: Value) -> Result<(), (Option<String>, ApiError)> {
        let fail = |e: ApiError| (Some("panic:create".to_string()), e);
        let p: PanicCreateParams = params(data).map_err(fail)?;
        let category = p
            .category
            .parse::<Category>()
            .map_err(|e| fail(ApiError::Validation(e.to_string())))?;

        let alert = self
            .projector
            .raise_panic(category, p.location, p.address, Instant::now())
            .await
            .map_err(|e| fail(ApiError::from(e)))?;
        self.send("panic:created", panic_alert::to_view(alert));
        self.send_buttons();
        Ok(())
    }

    fn panic_status(&mut self, data: Value) -> Result<(), (Option<String>, ApiError)> {
        let p: PanicStatusParams = params(data).map_err(|e| (None, e))?;
        let fail = |e: ApiError| (Some(p.alert_id.clone()), e);
        if !p.confirmed {
            return Err(fail(ApiError::BadRequest(
                "Status change must be confirmed".to_string(),
            )));
        }
        let alert_id = ObjectId::parse_str(&p.alert_id)
            .map_err(|_| fail(ApiError::BadRequest("Invalid alert_id".to_string())))?;
        let status = p
            .status
            .parse::<PanicStatus>()
            .map_err(|e| fail(ApiError::Validation(e)))?;

        let request = TransitionRequest::new(alert_id, status).confirm();
        self.projector
            .begin_transition(request)
            .map_err(|e| fail(ApiError::from(e)))?;

        let session = self.projector.session().clone();
        let lifecycle = self.projector.lifecycle().clone();
        let responder = p
            .responder_username
            .unwrap_or_else(|| session.username.clone());
        let internal = self.internal.clone();
        // Never aborted: a closing socket only loses the reply.
        tokio::spawn(async move {
            let result = lifecycle
                .apply_panic_transition(alert_id, status, &session, &responder)
                .await;
            let _ = internal.send(Internal::TransitionDone(request, result));
        });
        Ok(())
    }

    fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::Snapshot {
                id,
                generation,
                message,
            } => {
                if self.is_live(&id, generation) {
                    let _ = self.out.send(message);
                }
            }
            Internal::Dashboard(generation, _) if !self.is_live(DASHBOARD, generation) => {}
            Internal::Dashboard(_, DashboardUpdate::Notifications(items)) => {
                let items: Vec<notification::NotificationView> =
                    items.into_iter().map(notification::to_view).collect();
                self.send(
                    "snapshot",
                    Snapshot {
                        id: DASHBOARD_NOTIFICATIONS,
                        items,
                    },
                );
            }
            Internal::Dashboard(_, DashboardUpdate::PanicAlerts(items)) => {
                self.projector.observe_panic_snapshot(&items);
                self.send_panic_snapshot(DASHBOARD_PANIC_ALERTS, items);
            }
            Internal::TransitionDone(request, result) => {
                let alert_id = request.alert_id();
                if let Some(view) = self.projector.finish_transition(alert_id, &result) {
                    if self.subscriptions.contains_key(DASHBOARD) {
                        self.send_panic_snapshot(DASHBOARD_PANIC_ALERTS, view);
                    }
                }
                match result {
                    Ok(transition) => {
                        let (outcome, message) = panic_alert::describe_outcome(&transition.notification);
                        self.send(
                            "panic:transition",
                            json!({
                                "alert_id": alert_id.to_hex(),
                                "ok": true,
                                "notification": outcome,
                                "message": message,
                                "alert": panic_alert::to_view(transition.alert),
                            }),
                        );
                    }
                    Err(e) => {
                        let err = ApiError::from(e);
                        let (_, error, message) = err.parts();
                        self.send(
                            "panic:transition",
                            json!({
                                "alert_id": alert_id.to_hex(),
                                "ok": false,
                                "error": error,
                                "message": message,
                            }),
                        );
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        for (_, subscription) in self.subscriptions.drain() {
            subscription.task.abort();
        }
    }
}

/// Forwards every snapshot of a live query to the socket loop until it ends
/// or the socket goes away.
fn spawn_feed<T, V, F>(
    mut query: LiveQuery<T>,
    id: String,
    generation: u64,
    internal: InternalTx,
    view: F,
) -> JoinHandle<()>
where
    T: LiveRecord,
    V: Serialize + Send + 'static,
    F: Fn(T) -> V + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(items) = query.next().await {
            let items: Vec<V> = items.into_iter().map(&view).collect();
            let message = encode("snapshot", Snapshot { id: &id, items });
            let snapshot = Internal::Snapshot {
                id: id.clone(),
                generation,
                message,
            };
            if internal.send(snapshot).is_err() {
                break;
            }
        }
    })
}
