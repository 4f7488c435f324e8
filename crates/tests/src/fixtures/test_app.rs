use std::net::SocketAddr;
use std::sync::Arc;

use alerta_api::{build_router, state::AppState};
use alerta_config::{Settings, StoreBackend};
use alerta_services::{MemoryStore, RecordingGateway};
use tokio::net::TcpListener;

/// A running test application over the in-memory store, with a recording
/// push gateway in place of the push provider.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub client: reqwest::Client,
    pub push: Arc<RecordingGateway>,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after the test
    /// defaults are applied.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = Settings::load().unwrap_or_else(|_| test_settings());
        settings.database.backend = StoreBackend::Memory;
        settings.push.receipt_delay_secs = 0;
        mutator(&mut settings);

        let store = Arc::new(MemoryStore::new());
        let push = Arc::new(RecordingGateway::new());
        let app_state = AppState::new(settings.clone(), store.clone(), store, push.clone());
        app_state.start_triggers();
        let app = build_router(app_state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            settings,
            client,
            push,
            state: app_state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }
}

fn test_settings() -> Settings {
    Settings {
        app: alerta_config::AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: alerta_config::DatabaseSettings {
            backend: StoreBackend::Memory,
            url: "mongodb://localhost:27017".to_string(),
            name: "alerta_test".to_string(),
            max_pool_size: Some(5),
            min_pool_size: Some(1),
        },
        jwt: alerta_config::JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 604800,
            issuer: "alerta".to_string(),
        },
        push: alerta_config::PushSettings {
            base_url: "http://127.0.0.1:9/push".to_string(),
            access_token: None,
            send_batch_size: 100,
            receipt_batch_size: 300,
            request_timeout_secs: 5,
            receipt_delay_secs: 0,
            sound: "default".to_string(),
            android_channel_id: "default".to_string(),
            priority: "high".to_string(),
        },
        alerts: alerta_config::AlertSettings {
            panic_cooldown_secs: 180,
            dashboard_notification_limit: 5,
            dashboard_panic_limit: 4,
        },
    }
}
