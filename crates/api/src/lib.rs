pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if allowed.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(allowed)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/refresh", post(routes::auth::refresh))
        .route("/me", get(routes::auth::me))
        .route("/me/push-token", put(routes::auth::update_push_token));

    let notification_routes = Router::new()
        .route(
            "/",
            get(routes::notification::list).post(routes::notification::create),
        )
        .route("/{notification_id}", get(routes::notification::get))
        .route(
            "/{notification_id}/status",
            put(routes::notification::update_status),
        )
        .route(
            "/{notification_id}/response",
            get(routes::notification::list_responses).post(routes::notification::add_response),
        );

    // `/status` is the callable form; it must not be shadowed by `/{alert_id}`.
    let panic_routes = Router::new()
        .route(
            "/",
            get(routes::panic_alert::list).post(routes::panic_alert::create),
        )
        .route("/status", post(routes::panic_alert::status_call))
        .route("/{alert_id}", get(routes::panic_alert::get))
        .route("/{alert_id}/status", put(routes::panic_alert::update_status));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/notification", notification_routes)
        .nest("/panic-alert", panic_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
