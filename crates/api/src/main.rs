use std::sync::Arc;

use alerta_api::{build_router, state::AppState};
use alerta_config::{Settings, StoreBackend};
use alerta_db::{connect, indexes::ensure_indexes};
use alerta_services::{
    ExpoGateway, MemoryStore, PushGateway,
    dao::{alert::AlertDao, user::UserDao},
    store::{AlertRepository, UserRepository},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "alerta_api=debug,alerta_services=debug,alerta_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting Alerta API on {}:{}", settings.app.host, settings.app.port);

    let gateway: Arc<dyn PushGateway> = Arc::new(ExpoGateway::new(&settings.push)?);
    if settings.push.access_token.is_none() {
        warn!("Push access token not configured; sending unauthenticated requests");
    }

    let (users, alerts): (Arc<dyn UserRepository>, Arc<dyn AlertRepository>) =
        match settings.database.backend {
            StoreBackend::Mongodb => {
                let db = connect(&settings.database).await?;
                ensure_indexes(&db).await?;
                (Arc::new(UserDao::new(&db)), Arc::new(AlertDao::new(&db)))
            }
            StoreBackend::Memory => {
                warn!("Using the in-memory store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let app_state = AppState::new(settings.clone(), users, alerts, gateway);
    let _trigger = app_state.start_triggers();

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
