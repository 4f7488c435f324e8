use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub push: PushSettings,
    pub alerts: AlertSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongodb,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub issuer: String,
}

/// Push gateway (Expo push service compatible) settings.
#[derive(Debug, Deserialize, Clone)]
pub struct PushSettings {
    pub base_url: String,
    pub access_token: Option<String>,
    /// Max messages per send request, as declared by the provider.
    pub send_batch_size: usize,
    /// Max ticket ids per receipt lookup, as declared by the provider.
    pub receipt_batch_size: usize,
    pub request_timeout_secs: u64,
    /// Delay between a fan-out and its receipt poll. 0 polls right away.
    pub receipt_delay_secs: u64,
    pub sound: String,
    pub android_channel_id: String,
    pub priority: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertSettings {
    pub panic_cooldown_secs: u64,
    pub dashboard_notification_limit: usize,
    pub dashboard_panic_limit: usize,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("ALERTA"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.backend", "mongodb")?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "alerta")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.refresh_token_ttl_secs", 604800)?
            .set_default("jwt.issuer", "alerta")?
            .set_default("push.base_url", "https://exp.host/--/api/v2/push")?
            .set_default("push.access_token", None::<String>)?
            .set_default("push.send_batch_size", 100)?
            .set_default("push.receipt_batch_size", 300)?
            .set_default("push.request_timeout_secs", 10)?
            .set_default("push.receipt_delay_secs", 0)?
            .set_default("push.sound", "default")?
            .set_default("push.android_channel_id", "default")?
            .set_default("push.priority", "high")?
            .set_default("alerts.panic_cooldown_secs", 180)?
            .set_default("alerts.dashboard_notification_limit", 5)?
            .set_default("alerts.dashboard_panic_limit", 4)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
